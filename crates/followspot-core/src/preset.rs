//! Position presets
//!
//! A preset is a snapshot of the conditioner output that a bound joystick
//! button can recall while held. Capture/recall/update/delete and the
//! button bindings live on [`crate::store::ConfigSnapshot`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conditioner::Conditioned;

/// A captured position snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Opaque stable identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Captured 16-bit pan
    pub pan16: u16,
    /// Captured 16-bit tilt
    pub tilt16: u16,
    /// Captured 8-bit dimmer
    pub dim8: u8,
    /// Captured 16-bit zoom
    pub zoom16: u16,
}

impl Preset {
    /// Snapshot the current conditioner output under a fresh id.
    pub fn capture(name: String, values: Conditioned) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            pan16: values.pan16,
            tilt16: values.tilt16,
            dim8: values.dim8,
            zoom16: values.zoom16,
        }
    }

    /// The stored values as a conditioner output.
    pub fn values(&self) -> Conditioned {
        Conditioned {
            pan16: self.pan16,
            tilt16: self.tilt16,
            dim8: self.dim8,
            zoom16: self.zoom16,
        }
    }

    /// Overwrite the stored values from the current conditioner output.
    pub fn set_values(&mut self, values: Conditioned) {
        self.pan16 = values.pan16;
        self.tilt16 = values.tilt16;
        self.dim8 = values.dim8;
        self.zoom16 = values.zoom16;
    }
}

/// Default name "Preset N" with N the smallest positive integer not already
/// taken by an existing preset name.
pub fn default_name(existing: &[Preset]) -> String {
    let mut n = 1usize;
    loop {
        let candidate = format!("Preset {n}");
        if !existing.iter().any(|p| p.name == candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_roundtrips_values() {
        let values = Conditioned {
            pan16: 0x4000,
            tilt16: 0xC000,
            dim8: 200,
            zoom16: 0x2222,
        };
        let preset = Preset::capture("Spot left".into(), values);
        assert_eq!(preset.values(), values);
        assert!(!preset.id.is_empty());
    }

    #[test]
    fn default_name_fills_gaps() {
        let mut presets = vec![
            Preset::capture("Preset 1".into(), Conditioned::default()),
            Preset::capture("Preset 3".into(), Conditioned::default()),
        ];
        assert_eq!(default_name(&presets), "Preset 2");
        presets.push(Preset::capture("Preset 2".into(), Conditioned::default()));
        assert_eq!(default_name(&presets), "Preset 4");
    }
}
