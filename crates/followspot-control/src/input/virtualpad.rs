//! Virtual joystick
//!
//! Written by the HTTP surface, read by the input stage at poll time.
//! Axis values clamp to [-1, 1] on write. The throttle rests at -1 like a
//! real HOTAS throttle; the UI re-centers the zoom rocker by writing
//! zaxis=0 on slider release (the conditioner itself keeps zoom sticky).

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use super::InputSample;

/// Shared virtual joystick state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VirtualState {
    /// Stick X in [-1, 1]
    pub x: f32,
    /// Stick Y in [-1, 1]
    pub y: f32,
    /// Throttle axis in [-1, 1]
    pub throttle: f32,
    /// Zoom rocker axis in [-1, 1]
    pub zaxis: f32,
    /// Button index → down
    pub buttons: BTreeMap<u8, bool>,
}

impl Default for VirtualState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            throttle: -1.0,
            zaxis: 0.0,
            buttons: BTreeMap::new(),
        }
    }
}

/// Mutex-guarded holder for the virtual joystick.
#[derive(Debug, Default)]
pub struct VirtualPad {
    state: Mutex<VirtualState>,
}

impl VirtualPad {
    /// Pad at rest (centered stick, throttle at -1).
    pub fn new() -> Self {
        Self::default()
    }

    /// Update any subset of the axes; values clamp to [-1, 1].
    pub fn set_axes(
        &self,
        x: Option<f32>,
        y: Option<f32>,
        throttle: Option<f32>,
        zaxis: Option<f32>,
    ) {
        let mut state = self.state.lock().expect("virtual pad poisoned");
        if let Some(x) = x {
            state.x = x.clamp(-1.0, 1.0);
        }
        if let Some(y) = y {
            state.y = y.clamp(-1.0, 1.0);
        }
        if let Some(t) = throttle {
            state.throttle = t.clamp(-1.0, 1.0);
        }
        if let Some(z) = zaxis {
            state.zaxis = z.clamp(-1.0, 1.0);
        }
    }

    /// Press or release a virtual button.
    pub fn set_button(&self, index: u8, down: bool) {
        let mut state = self.state.lock().expect("virtual pad poisoned");
        if down {
            state.buttons.insert(index, true);
        } else {
            state.buttons.insert(index, false);
        }
    }

    /// Replace several buttons at once.
    pub fn set_buttons(&self, updates: &BTreeMap<u8, bool>) {
        let mut state = self.state.lock().expect("virtual pad poisoned");
        for (index, down) in updates {
            state.buttons.insert(*index, *down);
        }
    }

    /// Clone the current state (for `GET /api/virtual`).
    pub fn state(&self) -> VirtualState {
        self.state.lock().expect("virtual pad poisoned").clone()
    }

    /// Render the state as an input sample.
    pub fn sample(&self) -> InputSample {
        let state = self.state.lock().expect("virtual pad poisoned");
        let len = state
            .buttons
            .keys()
            .next_back()
            .map(|&i| usize::from(i) + 1)
            .unwrap_or(0);
        let mut buttons = vec![false; len];
        for (&index, &down) in &state.buttons {
            buttons[usize::from(index)] = down;
        }
        InputSample {
            axes: [state.x, state.y, state.throttle, state.zaxis],
            buttons,
        }
    }
}
