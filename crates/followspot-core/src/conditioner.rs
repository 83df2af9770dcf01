//! Input conditioning
//!
//! Pure transformation from raw joystick axes to the 16-bit pan/tilt,
//! 8-bit dimmer and 16-bit zoom values the frame assembler consumes.
//! Per axis: clamp → deadzone → exponential curve → fine-mode gain →
//! scale to 0..=65535 with 32768 at center. Per fixture, afterwards:
//! invert, bias in the 16-bit domain, soft travel limits.
//!
//! Identical inputs always produce identical outputs; the only carried
//! state is the previous output, which feeds the sticky zoom value and
//! the tilt hold while zoom-mod routes the axis elsewhere.

use serde::{Deserialize, Serialize};

use crate::buttons::Held;
use crate::fixture::Fixture;
use crate::settings::{Settings, ZoomSource};

/// Conditioned output for one tick. Pan/tilt/zoom are 16-bit (split into
/// coarse/fine bytes on the wire), dimmer is 8-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditioned {
    /// 16-bit pan, 32768 = center
    pub pan16: u16,
    /// 16-bit tilt, 32768 = center
    pub tilt16: u16,
    /// 8-bit dimmer
    pub dim8: u8,
    /// 16-bit zoom, sticky between zoom-mod holds
    pub zoom16: u16,
}

impl Default for Conditioned {
    fn default() -> Self {
        Self {
            pan16: 0x8000,
            tilt16: 0x8000,
            dim8: 0,
            zoom16: 0,
        }
    }
}

/// Deadzone plus exponential response curve on a single axis.
///
/// Below the deadzone the axis reads 0; above it the remaining travel is
/// rescaled to the full range and raised to `1 + 2*expo` (expo 0.35 gives
/// exponent 1.7).
pub fn shape_axis(raw: f32, deadzone: f32, expo: f32) -> f32 {
    let v = raw.clamp(-1.0, 1.0);
    let mag = v.abs();
    if mag < deadzone {
        return 0.0;
    }
    let rescaled = (mag - deadzone) / (1.0 - deadzone);
    rescaled.powf(1.0 + 2.0 * expo).copysign(v)
}

/// Scale a normalized value to the 16-bit DMX domain, 32768 at center.
pub fn axis_to_u16(v: f32) -> u16 {
    let scaled = 32768.0 + (v.clamp(-1.0, 1.0) * 32767.0).round();
    scaled.clamp(0.0, 65535.0) as u16
}

/// Map the throttle axis linearly onto the 8-bit dimmer range.
pub fn throttle_to_dim8(raw: f32, invert: bool) -> u8 {
    let mut t = raw.clamp(-1.0, 1.0);
    if invert {
        t = -t;
    }
    (((t + 1.0) * 0.5) * 255.0).round() as u8
}

/// Condition one tick of raw axes into output values.
///
/// `axes` follows the fixed convention: 0 = pan, 1 = tilt, 2 = throttle,
/// 3 = z-axis. `prev` supplies the sticky zoom value and the tilt hold
/// while zoom-mod is engaged.
pub fn condition(settings: &Settings, axes: &[f32; 4], held: &Held, prev: Conditioned) -> Conditioned {
    let gain = if held.fine { settings.fine_gain } else { 1.0 };
    let x = shape_axis(axes[0], settings.deadzone, settings.expo) * gain;
    let y = shape_axis(axes[1], settings.deadzone, settings.expo) * gain;

    let pan16 = axis_to_u16(x);
    let (tilt16, zoom16) = if held.zoom_mod {
        let feed = match settings.zoom_source {
            ZoomSource::ZAxis => axes[3],
            ZoomSource::YAxis => axes[1],
        };
        (prev.tilt16, axis_to_u16(feed))
    } else {
        (axis_to_u16(y), prev.zoom16)
    };

    let mut dim8 = throttle_to_dim8(axes[2], settings.throttle_invert);
    if held.flash10 {
        dim8 = settings.flash10_level;
    }
    if held.dim_off {
        dim8 = 0;
    }

    Conditioned {
        pan16,
        tilt16,
        dim8,
        zoom16,
    }
}

/// Apply a fixture's invert, bias and the global soft travel limits to the
/// pan/tilt halves of a conditioned value.
pub fn apply_fixture(values: Conditioned, fixture: &Fixture, settings: &Settings) -> Conditioned {
    Conditioned {
        pan16: adjust16(
            values.pan16,
            fixture.invert_pan,
            fixture.pan_bias,
            settings.pan_min,
            settings.pan_max,
        ),
        tilt16: adjust16(
            values.tilt16,
            fixture.invert_tilt,
            fixture.tilt_bias,
            settings.tilt_min,
            settings.tilt_max,
        ),
        ..values
    }
}

fn adjust16(value: u16, invert: bool, bias: i16, min: u16, max: u16) -> u16 {
    let v = if invert {
        (65536u32 - u32::from(value)).min(65535) as u16
    } else {
        value
    };
    let biased = (i32::from(v) + i32::from(bias)).clamp(0, 65535) as u16;
    biased.clamp(min, max)
}
