//! FollowSpot - headless follow-spot controller
//!
//! Wires the pieces together: config store + persistence, the control
//! loop on its worker thread, and the web API on the tokio runtime.

mod logging_setup;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use followspot_control::{
    serve, ApiContext, ControlLoop, DeviceProvider, HidProvider, LoopCommand, NoopIndicators,
    NullProvider, VirtualPad, WebServerConfig,
};
use followspot_core::{ConfigStore, LogRing, RuntimeHandle};
use followspot_io::{spawn_persister, Persister};

#[tokio::main]
async fn main() -> Result<()> {
    let persister = Persister::in_dir(".");
    let mut snapshot = persister.load().context("config load failed")?;

    // the CID is minted exactly once, then pinned for the life of the rig
    if snapshot.settings.ensure_cid() {
        persister
            .save(&snapshot)
            .context("initial config save failed")?;
    }

    let log_ring = Arc::new(LogRing::new());
    let _log_guard = logging_setup::init(&snapshot.settings.log, log_ring.clone())?;

    info!("==========================================");
    info!("===     FollowSpot Session Started     ===");
    info!("==========================================");
    info!(cid = %snapshot.settings.cid, "sACN source identity");

    let store = Arc::new(ConfigStore::new(snapshot).context("config rejected")?);
    spawn_persister(store.clone(), persister);

    let runtime = RuntimeHandle::new();
    let pad = Arc::new(VirtualPad::new());
    let provider: Arc<dyn DeviceProvider> = match HidProvider::new() {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!(error = %e, "HID backend unavailable, hardware input disabled");
            Arc::new(NullProvider)
        }
    };

    let (control_loop, commands) = ControlLoop::new(
        store.clone(),
        runtime.clone(),
        pad.clone(),
        provider.clone(),
        Box::new(NoopIndicators),
        Box::new(NoopIndicators),
    )?;
    let loop_handle = control_loop.spawn();

    let ctx = Arc::new(ApiContext {
        store,
        runtime,
        pad,
        log_ring,
        commands: commands.clone(),
        provider,
        restart_pending: Mutex::new(None),
    });

    let server = tokio::spawn(serve(WebServerConfig::default(), ctx));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => info!("web server exited"),
                Ok(Err(e)) => error!(error = %e, "web server failed"),
                Err(e) => error!(error = %e, "web server task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // let the loop finish its tick and flush zero frames on every universe
    let _ = commands.send(LoopCommand::Shutdown);
    let _ = tokio::task::spawn_blocking(move || loop_handle.join()).await;
    info!("goodbye");
    Ok(())
}
