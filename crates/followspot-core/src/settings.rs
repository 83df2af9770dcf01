//! Controller settings
//!
//! The settings record is the singleton half of the config store. It is
//! persisted as JSON and edited through `POST /api/settings` (merge
//! semantics), so every field carries a serde default and the boolean
//! fields tolerate the web form's "True"/"False" strings.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::logging::LogConfig;
use crate::{CoreError, Result, UNIVERSE_MAX};

/// How sACN packets are addressed per universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DestinationMode {
    /// 239.255.(U>>8).(U&0xFF):5568 per universe (the sACN default)
    Multicast,
    /// Explicit IPv4 target per universe
    Unicast {
        /// universe → destination host
        targets: BTreeMap<u16, Ipv4Addr>,
    },
}

impl Default for DestinationMode {
    fn default() -> Self {
        Self::Multicast
    }
}

/// Which axis feeds zoom while the zoom-mod button is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZoomSource {
    /// Dedicated z-axis / rocker (axis 3)
    #[default]
    ZAxis,
    /// Re-use the tilt axis (axis 1)
    YAxis,
}

/// Controller settings singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Control loop rate in Hz
    pub frame_rate: u32,
    /// Stick deadzone, 0..0.5
    pub deadzone: f32,
    /// Exponential response curve strength, 0..1
    pub expo: f32,
    /// Axis gain while the fine-mode button is held, 0..1
    pub fine_gain: f32,
    /// Invert the throttle axis before the dimmer mapping
    #[serde(deserialize_with = "de_boolish")]
    pub throttle_invert: bool,

    /// sACN priority, 0..=200
    pub priority: u8,
    /// Local addresses to bind sender sockets to; empty = INADDR_ANY
    pub bind_addresses: Vec<Ipv4Addr>,
    /// Multicast (default) or per-universe unicast
    pub destination: DestinationMode,
    /// When false, every fixture emits on `default_universe`
    #[serde(deserialize_with = "de_boolish")]
    pub multi_universe_enabled: bool,
    /// Universe used when multi-universe mode is off
    pub default_universe: u16,

    /// Drive GPIO indicator outputs
    #[serde(deserialize_with = "de_boolish")]
    pub gpio_enabled: bool,
    /// BCM pin for the power LED
    pub power_pin: u8,
    /// BCM pin for the error LED
    pub error_pin: u8,
    /// LEDs wired active-low
    #[serde(deserialize_with = "de_boolish")]
    pub active_low: bool,
    /// BCM pins for the per-fixture status LEDs (at most 6, deduped)
    pub fixture_led_pins: Vec<u8>,

    /// Button index: take control / resume output
    pub btn_activate: u8,
    /// Button index: release control (zero frame, then keepalives)
    pub btn_release: u8,
    /// Button index: hold for ~10% intensity
    pub btn_flash10: u8,
    /// Button index: hold for blackout
    pub btn_dim_off: u8,
    /// Button index: hold for fine pan/tilt
    pub btn_fine: u8,
    /// Button index: hold to route an axis into zoom
    pub btn_zoom_mod: u8,

    /// Dimmer level forced while flash-10 is held
    pub flash10_level: u8,
    /// Axis that feeds zoom while zoom-mod is held
    pub zoom_source: ZoomSource,

    /// Read the virtual joystick instead of hardware
    #[serde(deserialize_with = "de_boolish")]
    pub virtual_enabled: bool,
    /// UI hint: flip the virtual throttle slider mapping
    #[serde(deserialize_with = "de_boolish")]
    pub virtual_throttle_invert: bool,

    /// Soft pan travel limit, low end
    pub pan_min: u16,
    /// Soft pan travel limit, high end
    pub pan_max: u16,
    /// Soft tilt travel limit, low end
    pub tilt_min: u16,
    /// Soft tilt travel limit, high end
    pub tilt_max: u16,

    /// Stable sACN component identifier; generated once on first start
    pub cid: Uuid,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_rate: 40,
            deadzone: 0.08,
            expo: 0.35,
            fine_gain: 0.20,
            throttle_invert: false,
            priority: 150,
            bind_addresses: Vec::new(),
            destination: DestinationMode::default(),
            multi_universe_enabled: false,
            default_universe: 1,
            gpio_enabled: true,
            power_pin: 17,
            error_pin: 27,
            active_low: false,
            fixture_led_pins: Vec::new(),
            btn_activate: 5,
            btn_release: 1,
            btn_flash10: 0,
            btn_dim_off: 3,
            btn_fine: 4,
            btn_zoom_mod: 6,
            flash10_level: 26,
            zoom_source: ZoomSource::default(),
            virtual_enabled: true,
            virtual_throttle_invert: true,
            pan_min: 0,
            pan_max: 65535,
            tilt_min: 0,
            tilt_max: 65535,
            cid: Uuid::nil(),
            log: LogConfig::default(),
        }
    }
}

impl Settings {
    /// The six semantic-action button indices, labelled for error messages.
    pub fn semantic_buttons(&self) -> [(&'static str, u8); 6] {
        [
            ("activate", self.btn_activate),
            ("release", self.btn_release),
            ("flash10", self.btn_flash10),
            ("dim_off", self.btn_dim_off),
            ("fine", self.btn_fine),
            ("zoom_mod", self.btn_zoom_mod),
        ]
    }

    /// True if `button` is claimed by a semantic action.
    pub fn is_semantic_button(&self, button: u8) -> bool {
        self.semantic_buttons().iter().any(|(_, b)| *b == button)
    }

    /// Generate the CID if this settings record has never had one.
    /// Returns true when a fresh CID was assigned.
    pub fn ensure_cid(&mut self) -> bool {
        if self.cid.is_nil() {
            self.cid = Uuid::new_v4();
            true
        } else {
            false
        }
    }

    /// Validate all value ranges and cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(CoreError::Validation(format!(
                "frame_rate {} out of range (1-240)",
                self.frame_rate
            )));
        }
        if !(0.0..0.5).contains(&self.deadzone) {
            return Err(CoreError::Validation(format!(
                "deadzone {} out of range (0-0.5)",
                self.deadzone
            )));
        }
        if !(0.0..=1.0).contains(&self.expo) {
            return Err(CoreError::Validation(format!(
                "expo {} out of range (0-1)",
                self.expo
            )));
        }
        if !(0.0..=1.0).contains(&self.fine_gain) {
            return Err(CoreError::Validation(format!(
                "fine_gain {} out of range (0-1)",
                self.fine_gain
            )));
        }
        if self.priority > 200 {
            return Err(CoreError::Validation(format!(
                "priority {} out of range (0-200)",
                self.priority
            )));
        }
        if self.default_universe == 0 || self.default_universe > UNIVERSE_MAX {
            return Err(CoreError::Validation(format!(
                "default_universe {} out of range (1-{UNIVERSE_MAX})",
                self.default_universe
            )));
        }
        if let DestinationMode::Unicast { targets } = &self.destination {
            for universe in targets.keys() {
                if *universe == 0 || *universe > UNIVERSE_MAX {
                    return Err(CoreError::Validation(format!(
                        "unicast target universe {universe} out of range (1-{UNIVERSE_MAX})"
                    )));
                }
            }
        }
        if self.pan_min > self.pan_max {
            return Err(CoreError::Validation("pan_min exceeds pan_max".into()));
        }
        if self.tilt_min > self.tilt_max {
            return Err(CoreError::Validation("tilt_min exceeds tilt_max".into()));
        }
        if self.fixture_led_pins.len() > crate::FIXTURE_LIMIT {
            return Err(CoreError::Validation(format!(
                "at most {} fixture LED pins",
                crate::FIXTURE_LIMIT
            )));
        }
        let buttons = self.semantic_buttons();
        for (i, (name_a, a)) in buttons.iter().enumerate() {
            for (name_b, b) in &buttons[i + 1..] {
                if a == b {
                    return Err(CoreError::Validation(format!(
                        "button {a} assigned to both {name_a} and {name_b}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Accept `true`/`false`, the web form's "True"/"False"/"yes"/"on"/"1"
/// strings, or 0/1 integers. Admission stores a strict bool.
pub(crate) fn de_boolish<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolishVisitor;

    impl serde::de::Visitor<'_> for BoolishVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or a True/False string")
        }

        fn visit_bool<E>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<bool, E> {
            Ok(matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ))
        }
    }

    deserializer.deserialize_any(BoolishVisitor)
}

/// Accept a number or its string form (web forms and CSV cells); an empty
/// string decodes as the type's default.
pub(crate) fn de_lenient_num<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default + TryFrom<i64> + TryFrom<u64>,
    <T as FromStr>::Err: Display,
{
    struct NumVisitor<T>(std::marker::PhantomData<T>);

    impl<T> serde::de::Visitor<'_> for NumVisitor<T>
    where
        T: FromStr + Default + TryFrom<i64> + TryFrom<u64>,
        <T as FromStr>::Err: Display,
    {
        type Value = T;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a number or numeric string")
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<T, E> {
            T::try_from(v).map_err(|_| E::custom(format!("{v} out of range")))
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<T, E> {
            T::try_from(v).map_err(|_| E::custom(format!("{v} out of range")))
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<T, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(T::default());
            }
            trimmed.parse().map_err(|e| E::custom(format!("{e}")))
        }
    }

    deserializer.deserialize_any(NumVisitor(std::marker::PhantomData))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn default_values_match_contract() {
        let s = Settings::default();
        assert_eq!(s.frame_rate, 40);
        assert_eq!(s.deadzone, 0.08);
        assert_eq!(s.expo, 0.35);
        assert_eq!(s.fine_gain, 0.20);
        assert_eq!(s.priority, 150);
        assert_eq!(s.flash10_level, 26);
        assert_eq!(s.destination, DestinationMode::Multicast);
    }

    #[test]
    fn rejects_out_of_range_priority() {
        let s = Settings {
            priority: 201,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_semantic_buttons() {
        let s = Settings {
            btn_activate: 3,
            btn_dim_off: 3,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn ensure_cid_is_stable() {
        let mut s = Settings::default();
        assert!(s.ensure_cid());
        let first = s.cid;
        assert!(!s.ensure_cid());
        assert_eq!(s.cid, first);
    }

    #[test]
    fn boolish_strings_accepted() {
        let json = r#"{"throttle_invert": "True", "virtual_enabled": "off"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.throttle_invert);
        assert!(!s.virtual_enabled);
    }

    #[test]
    fn unicast_targets_roundtrip() {
        let mut targets = BTreeMap::new();
        targets.insert(1u16, Ipv4Addr::new(10, 0, 0, 20));
        let s = Settings {
            destination: DestinationMode::Unicast { targets },
            ..Default::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
