use std::fs::File;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use followspot_core::{LogConfig, LogRing};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    Layer,
};

/// Handle to keep the logging worker thread alive
pub struct LogGuard {
    // Kept alive until dropped
    _guard: WorkerGuard,
}

/// Initialize the logging system: console + file layers per the config,
/// plus the ring layer feeding /api/logs.
pub fn init(config: &LogConfig, ring: Arc<LogRing>) -> Result<Option<LogGuard>> {
    let config_filter = EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy(); // RUST_LOG env var takes precedence

    let console_layer = if config.console_output {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false)
                .with_filter(config_filter.clone()),
        )
    } else {
        None
    };

    let (file_layer, guard) = if config.file_output {
        config
            .ensure_log_directory()
            .context("Failed to create log directory")?;
        let log_path = config.current_log_path();
        let file = File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {log_path:?}"))?;
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(config_filter);
        (
            Some(layer),
            Some(LogGuard {
                _guard: worker_guard,
            }),
        )
    } else {
        (None, None)
    };

    // the UI log view stays at info and above
    let ring_layer = RingLayer { ring }.with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(ring_layer)
        .init();

    tracing::info!("logging initialized at level {}", config.level);
    Ok(guard)
}

/// Layer that renders events into the shared log ring.
struct RingLayer {
    ring: Arc<LogRing>,
}

impl<S: tracing::Subscriber> Layer<S> for RingLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.ring.push(format!(
            "[{}] {} {}",
            wall_clock(),
            event.metadata().level(),
            visitor.line
        ));
    }
}

#[derive(Default)]
struct LineVisitor {
    line: String,
}

impl tracing::field::Visit for LineVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            if self.line.is_empty() {
                self.line = format!("{value:?}");
            } else {
                self.line = format!("{value:?} {}", self.line);
            }
        } else {
            if !self.line.is_empty() {
                self.line.push(' ');
            }
            self.line
                .push_str(&format!("{}={:?}", field.name(), value));
        }
    }
}

fn wall_clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}
