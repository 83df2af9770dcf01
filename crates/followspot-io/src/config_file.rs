//! Config file I/O
//!
//! The whole config snapshot persists as one pretty-printed JSON document.
//! Saves go through a temp file in the same directory followed by a rename
//! so a crash mid-write never leaves a torn config. On startup a missing
//! or empty JSON file falls back to the CSV fixture backup when present.

use std::fs;
use std::path::Path;

use followspot_core::ConfigSnapshot;

use crate::error::Result;
use crate::fixtures_csv;

/// Save the snapshot as JSON via temp-file + atomic rename.
pub fn save(snapshot: &ConfigSnapshot, path: &Path) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(snapshot)?;
    json.push(b'\n');

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Load a snapshot; `Ok(None)` when the file does not exist or is empty.
pub fn load(path: &Path) -> Result<Option<ConfigSnapshot>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    let snapshot: ConfigSnapshot = serde_json::from_slice(&data)?;
    Ok(Some(snapshot))
}

/// Startup load: JSON first; if that yields no fixtures and a CSV backup
/// exists, recover the fixture list from it. The result is validated.
pub fn load_or_default(config_path: &Path, csv_path: &Path) -> Result<ConfigSnapshot> {
    let mut snapshot = match load(config_path)? {
        Some(snapshot) => snapshot,
        None => {
            tracing::info!(path = %config_path.display(), "no config file, starting from defaults");
            ConfigSnapshot::default()
        }
    };

    if snapshot.fixtures.is_empty() {
        match fs::read_to_string(csv_path) {
            Ok(text) => {
                let fixtures = fixtures_csv::import(&text)?;
                if !fixtures.is_empty() {
                    tracing::info!(
                        count = fixtures.len(),
                        path = %csv_path.display(),
                        "fixtures recovered from CSV backup"
                    );
                    snapshot.replace_fixtures(fixtures)?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    snapshot.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use followspot_core::Fixture;
    use tempfile::TempDir;

    fn fixture(id: &str) -> Fixture {
        Fixture {
            id: id.into(),
            universe: 1,
            start_addr: 1,
            pan_coarse: 1,
            dimmer: 5,
            ..Default::default()
        }
    }

    #[test]
    fn config_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut snapshot = ConfigSnapshot::default();
        snapshot.settings.ensure_cid();
        snapshot.add_fixture(fixture("F1")).unwrap();

        save(&snapshot, &path).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(snapshot, loaded);
    }

    #[test]
    fn save_replaces_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut snapshot = ConfigSnapshot::default();
        save(&snapshot, &path).unwrap();
        snapshot.add_fixture(fixture("F1")).unwrap();
        save(&snapshot, &path).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.fixtures.len(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn empty_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "\n").unwrap();
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn csv_backup_recovers_fixtures() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let csv_path = dir.path().join("fixtures.csv");

        let csv = fixtures_csv::export(&[fixture("Left"), fixture("Right")]).unwrap();
        std::fs::write(&csv_path, csv).unwrap();

        let snapshot = load_or_default(&config_path, &csv_path).unwrap();
        assert_eq!(snapshot.fixtures.len(), 2);
        assert_eq!(snapshot.fixtures[0].id, "Left");
    }

    #[test]
    fn json_fixtures_win_over_csv() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let csv_path = dir.path().join("fixtures.csv");

        let mut snapshot = ConfigSnapshot::default();
        snapshot.add_fixture(fixture("FromJson")).unwrap();
        save(&snapshot, &config_path).unwrap();

        let csv = fixtures_csv::export(&[fixture("FromCsv")]).unwrap();
        std::fs::write(&csv_path, csv).unwrap();

        let loaded = load_or_default(&config_path, &csv_path).unwrap();
        assert_eq!(loaded.fixtures.len(), 1);
        assert_eq!(loaded.fixtures[0].id, "FromJson");
    }
}
