//! Config store
//!
//! The authoritative in-memory record of settings, fixtures, presets and
//! button bindings. Writers (the HTTP surface) take an exclusive lock only
//! long enough to validate and swap in a new immutable snapshot; the
//! control loop clones the snapshot `Arc` at the start of each tick and
//! works from that for the whole tick. Every successful mutation emits a
//! change event to subscribers (persistence, indicator refresh).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conditioner::Conditioned;
use crate::fixture::{Fixture, FIXTURE_LIMIT};
use crate::preset::{self, Preset};
use crate::settings::Settings;
use crate::{CoreError, Result};

/// What changed in a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Settings record replaced
    Settings,
    /// Fixture list changed
    Fixtures,
    /// Preset list changed
    Presets,
    /// Button bindings changed
    Bindings,
}

/// One immutable, internally consistent configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    /// Controller settings
    pub settings: Settings,
    /// Fixture patch, at most [`FIXTURE_LIMIT`] entries
    pub fixtures: Vec<Fixture>,
    /// Captured presets
    pub presets: Vec<Preset>,
    /// Button index → preset id
    pub bindings: BTreeMap<u8, String>,
}

impl ConfigSnapshot {
    /// Validate the whole snapshot: settings ranges, fixture invariants,
    /// the fixture limit, and binding consistency.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        if self.fixtures.len() > FIXTURE_LIMIT {
            return Err(CoreError::Validation(format!(
                "fixture limit of {FIXTURE_LIMIT} exceeded"
            )));
        }
        for (i, fixture) in self.fixtures.iter().enumerate() {
            fixture.validate()?;
            if self.fixtures[i + 1..].iter().any(|f| f.id == fixture.id) {
                return Err(CoreError::Validation(format!(
                    "duplicate fixture id {}",
                    fixture.id
                )));
            }
        }

        for (button, preset_id) in &self.bindings {
            if self.settings.is_semantic_button(*button) {
                return Err(CoreError::Validation(format!(
                    "button {button} is already assigned to a semantic action"
                )));
            }
            if !self.presets.iter().any(|p| &p.id == preset_id) {
                return Err(CoreError::Validation(format!(
                    "binding on button {button} references unknown preset {preset_id}"
                )));
            }
        }
        Ok(())
    }

    /// Merge a partial settings object (JSON) over the current settings.
    /// String booleans and stringy numbers are normalized by the field
    /// deserializers; the CID cannot be overwritten once set.
    pub fn merge_settings(&mut self, patch: Value) -> Result<()> {
        let Value::Object(patch) = patch else {
            return Err(CoreError::Validation("settings patch must be an object".into()));
        };
        let mut merged = serde_json::to_value(&self.settings)
            .map_err(|e| CoreError::Validation(format!("settings serialize failed: {e}")))?;
        let Value::Object(target) = &mut merged else {
            unreachable!("settings always serialize to an object");
        };
        let previous_cid = self.settings.cid;
        for (key, value) in patch {
            target.insert(key, value);
        }
        let mut updated: Settings = serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("invalid settings: {e}")))?;
        if !previous_cid.is_nil() {
            updated.cid = previous_cid;
        }
        self.settings = updated;
        Ok(())
    }

    /// Admit a new fixture.
    pub fn add_fixture(&mut self, fixture: Fixture) -> Result<()> {
        fixture.validate()?;
        if self.fixtures.len() >= FIXTURE_LIMIT {
            return Err(CoreError::Validation(format!(
                "fixture limit of {FIXTURE_LIMIT} reached"
            )));
        }
        if self.fixtures.iter().any(|f| f.id == fixture.id) {
            return Err(CoreError::Validation(format!(
                "duplicate fixture id {}",
                fixture.id
            )));
        }
        self.fixtures.push(fixture);
        Ok(())
    }

    /// Partially update a fixture from a JSON object; the id is fixed.
    pub fn patch_fixture(&mut self, id: &str, patch: Value) -> Result<()> {
        let Value::Object(patch) = patch else {
            return Err(CoreError::Validation("fixture patch must be an object".into()));
        };
        let fixture = self
            .fixtures
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("fixture {id}")))?;

        let mut merged = serde_json::to_value(&*fixture)
            .map_err(|e| CoreError::Validation(format!("fixture serialize failed: {e}")))?;
        let Value::Object(target) = &mut merged else {
            unreachable!("fixtures always serialize to an object");
        };
        for (key, value) in patch {
            target.insert(key, value);
        }
        let mut updated: Fixture = serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("invalid fixture: {e}")))?;
        updated.id = id.to_string();
        updated.validate()?;
        *fixture = updated;
        Ok(())
    }

    /// Remove a fixture by id.
    pub fn remove_fixture(&mut self, id: &str) -> Result<()> {
        let before = self.fixtures.len();
        self.fixtures.retain(|f| f.id != id);
        if self.fixtures.len() == before {
            return Err(CoreError::NotFound(format!("fixture {id}")));
        }
        Ok(())
    }

    /// Replace the whole fixture list (CSV import).
    pub fn replace_fixtures(&mut self, fixtures: Vec<Fixture>) -> Result<()> {
        if fixtures.len() > FIXTURE_LIMIT {
            return Err(CoreError::Validation(format!(
                "fixture limit is {FIXTURE_LIMIT}; received {}",
                fixtures.len()
            )));
        }
        for fixture in &fixtures {
            fixture.validate()?;
        }
        self.fixtures = fixtures;
        Ok(())
    }

    /// Capture a preset from the current conditioner output.
    pub fn capture_preset(&mut self, name: Option<String>, values: Conditioned) -> Result<Preset> {
        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => preset::default_name(&self.presets),
        };
        let preset = Preset::capture(name, values);
        self.presets.push(preset.clone());
        Ok(preset)
    }

    /// Look up a preset by id.
    pub fn preset(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Rename a preset and/or overwrite its values.
    pub fn update_preset(
        &mut self,
        id: &str,
        name: Option<String>,
        values: Option<Conditioned>,
    ) -> Result<()> {
        let preset = self
            .presets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("preset {id}")))?;
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation("preset name must not be empty".into()));
            }
            preset.name = name;
        }
        if let Some(values) = values {
            preset.set_values(values);
        }
        Ok(())
    }

    /// Delete a preset; any button binding referencing it is removed too.
    pub fn remove_preset(&mut self, id: &str) -> Result<()> {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        if self.presets.len() == before {
            return Err(CoreError::NotFound(format!("preset {id}")));
        }
        self.bindings.retain(|_, preset_id| preset_id != id);
        Ok(())
    }

    /// Bind a button to a preset, or unbind with `None`.
    pub fn bind_button(&mut self, button: u8, preset_id: Option<&str>) -> Result<()> {
        match preset_id {
            Some(id) if !id.is_empty() => {
                if self.settings.is_semantic_button(button) {
                    return Err(CoreError::Validation(format!(
                        "button {button} is already assigned to a semantic action"
                    )));
                }
                if self.preset(id).is_none() {
                    return Err(CoreError::NotFound(format!("preset {id}")));
                }
                self.bindings.insert(button, id.to_string());
            }
            _ => {
                self.bindings.remove(&button);
            }
        }
        Ok(())
    }
}

/// Shared config store. Readers clone the snapshot pointer; writers swap
/// it atomically after validation.
pub struct ConfigStore {
    current: RwLock<Arc<ConfigSnapshot>>,
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl ConfigStore {
    /// Build a store around an initial (validated) snapshot.
    pub fn new(initial: ConfigSnapshot) -> Result<Self> {
        initial.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(initial)),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// The current snapshot. Cheap; hold it for the whole tick.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.read().expect("config store poisoned").clone()
    }

    /// Apply a mutation: clone the snapshot, run the closure, validate,
    /// swap, notify. On any error the previous snapshot stays in place.
    pub fn apply<R>(
        &self,
        event: ChangeEvent,
        mutate: impl FnOnce(&mut ConfigSnapshot) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.current.write().expect("config store poisoned");
        let mut next = ConfigSnapshot::clone(&guard);
        let output = mutate(&mut next)?;
        next.validate()?;
        *guard = Arc::new(next);
        drop(guard);
        self.notify(event);
        Ok(output)
    }

    /// Subscribe to change events. Dead receivers are pruned on notify.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(tx);
        rx
    }

    fn notify(&self, event: ChangeEvent) {
        self.subscribers
            .lock()
            .expect("subscriber list poisoned")
            .retain(|tx| tx.send(event).is_ok());
    }
}
