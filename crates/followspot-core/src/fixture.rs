//! DMX fixture patch records
//!
//! A fixture maps the conditioned pan/tilt/dimmer/zoom values onto absolute
//! DMX slots: `start_addr` anchors the fixture in its universe and each
//! channel field is a 1-based offset relative to it (0 = channel unused).
//! Field order matches the CSV backup schema.

use serde::{Deserialize, Serialize};

use crate::settings::{de_boolish, de_lenient_num};
use crate::{CoreError, Result, DMX_SLOTS, UNIVERSE_MAX};

/// Maximum number of fixtures accepted by admission.
pub const FIXTURE_LIMIT: usize = 6;

/// A patched fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Unique opaque identifier
    pub id: String,
    /// Disabled fixtures are skipped by the frame assembler
    #[serde(deserialize_with = "de_boolish")]
    pub enabled: bool,
    /// sACN universe, 1..=63999
    #[serde(deserialize_with = "de_lenient_num")]
    pub universe: u16,
    /// First DMX slot of the fixture, 1..=512
    #[serde(deserialize_with = "de_lenient_num")]
    pub start_addr: u16,
    /// Pan coarse (MSB) channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub pan_coarse: u16,
    /// Pan fine (LSB) channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub pan_fine: u16,
    /// Tilt coarse channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub tilt_coarse: u16,
    /// Tilt fine channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub tilt_fine: u16,
    /// Dimmer channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub dimmer: u16,
    /// Zoom coarse channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub zoom: u16,
    /// Zoom fine channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub zoom_fine: u16,
    /// Static color temperature channel offset
    #[serde(deserialize_with = "de_lenient_num")]
    pub color_temp_channel: u16,
    /// Value written to the color temperature channel
    #[serde(deserialize_with = "de_lenient_num")]
    pub color_temp_value: u8,
    /// Mirror pan for this fixture
    #[serde(deserialize_with = "de_boolish")]
    pub invert_pan: bool,
    /// Mirror tilt for this fixture
    #[serde(deserialize_with = "de_boolish")]
    pub invert_tilt: bool,
    /// Added to pan in the 16-bit domain after scaling
    #[serde(deserialize_with = "de_lenient_num")]
    pub pan_bias: i16,
    /// Added to tilt in the 16-bit domain after scaling
    #[serde(deserialize_with = "de_lenient_num")]
    pub tilt_bias: i16,
    /// Status LED slot, 0 = none, else 1..=6
    #[serde(deserialize_with = "de_lenient_num")]
    pub status_led: u8,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            id: String::new(),
            enabled: true,
            universe: 1,
            start_addr: 1,
            pan_coarse: 0,
            pan_fine: 0,
            tilt_coarse: 0,
            tilt_fine: 0,
            dimmer: 0,
            zoom: 0,
            zoom_fine: 0,
            color_temp_channel: 0,
            color_temp_value: 0,
            invert_pan: false,
            invert_tilt: false,
            pan_bias: 0,
            tilt_bias: 0,
            status_led: 0,
        }
    }
}

impl Fixture {
    /// All channel offsets with their names, for validation and reporting.
    pub fn offsets(&self) -> [(&'static str, u16); 8] {
        [
            ("pan_coarse", self.pan_coarse),
            ("pan_fine", self.pan_fine),
            ("tilt_coarse", self.tilt_coarse),
            ("tilt_fine", self.tilt_fine),
            ("dimmer", self.dimmer),
            ("zoom", self.zoom),
            ("zoom_fine", self.zoom_fine),
            ("color_temp_channel", self.color_temp_channel),
        ]
    }

    /// Absolute 0-based slot index for a channel offset, or None when the
    /// offset is 0 (unused).
    pub fn slot(&self, offset: u16) -> Option<usize> {
        if offset == 0 {
            return None;
        }
        let slot = usize::from(self.start_addr) + usize::from(offset) - 1;
        (slot <= DMX_SLOTS).then(|| slot - 1)
    }

    /// Validate the admission invariants for a single fixture.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Validation(
                "fixture must have a non-empty id".into(),
            ));
        }
        if self.universe == 0 || self.universe > UNIVERSE_MAX {
            return Err(CoreError::Validation(format!(
                "fixture {}: universe {} out of range (1-{UNIVERSE_MAX})",
                self.id, self.universe
            )));
        }
        if self.start_addr == 0 || self.start_addr > DMX_SLOTS as u16 {
            return Err(CoreError::Validation(format!(
                "fixture {}: start_addr {} out of range (1-512)",
                self.id, self.start_addr
            )));
        }
        for (name, offset) in self.offsets() {
            if offset == 0 {
                continue;
            }
            let end = u32::from(self.start_addr) + u32::from(offset) - 1;
            if end > DMX_SLOTS as u32 {
                return Err(CoreError::Validation(format!(
                    "fixture {}: {name} offset {offset} lands on slot {end}, past 512",
                    self.id
                )));
            }
        }
        if self.status_led as usize > FIXTURE_LIMIT {
            return Err(CoreError::Validation(format!(
                "fixture {}: status_led {} out of range (0-{FIXTURE_LIMIT})",
                self.id, self.status_led
            )));
        }
        Ok(())
    }
}
