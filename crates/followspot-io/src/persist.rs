//! Persistence subscriber
//!
//! A small worker thread that listens for config-store change events and
//! writes the JSON document plus the CSV fixture backup on every commit.
//! A failed save is logged and retried on the next change; in-memory
//! state is never rolled back.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use followspot_core::{ConfigSnapshot, ConfigStore};

use crate::error::Result;
use crate::{config_file, fixtures_csv};

/// File locations for the persisted config.
#[derive(Debug, Clone)]
pub struct Persister {
    /// JSON config document
    pub config_path: PathBuf,
    /// CSV fixture backup
    pub csv_path: PathBuf,
}

impl Persister {
    /// Conventional file names inside a data directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config_path: dir.join("settings.json"),
            csv_path: dir.join("fixtures.csv"),
        }
    }

    /// Write both the JSON document and the CSV backup.
    pub fn save(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config_file::save(snapshot, &self.config_path)?;
        let csv = fixtures_csv::export(&snapshot.fixtures)?;
        std::fs::write(&self.csv_path, csv)?;
        Ok(())
    }

    /// Load the startup snapshot (JSON, falling back to the CSV backup).
    pub fn load(&self) -> Result<ConfigSnapshot> {
        config_file::load_or_default(&self.config_path, &self.csv_path)
    }
}

/// Spawn the subscriber thread. It runs for the life of the process.
pub fn spawn_persister(store: Arc<ConfigStore>, persister: Persister) -> JoinHandle<()> {
    let events = store.subscribe();
    std::thread::Builder::new()
        .name("persister".into())
        .spawn(move || {
            while let Ok(event) = events.recv() {
                // coalesce a burst of changes into one write
                while events.try_recv().is_ok() {}
                let snapshot = store.snapshot();
                match persister.save(&snapshot) {
                    Ok(()) => tracing::debug!(?event, "config persisted"),
                    Err(e) => tracing::error!(error = %e, "config save failed, will retry on next change"),
                }
            }
        })
        .expect("persister thread spawn failed")
}
