//! Runtime status shared between the control loop and the HTTP surface
//!
//! The control loop is the single writer; readers take a short lock and
//! clone the snapshot.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::conditioner::Conditioned;

/// Live controller status.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    /// Streaming / in control of the fixtures
    pub active: bool,
    /// A subsystem reported an error this tick
    pub error: bool,
    /// Human-readable message for the last error
    pub error_msg: String,
    /// Name of the attached input device, empty when none
    pub joystick_name: String,
    /// Axis count reported by the input source
    pub axis_count: usize,
    /// Button count reported by the input source
    pub button_count: usize,
    /// The virtual joystick is the active source
    pub virtual_active: bool,
    /// Completion time of the most recent tick
    pub last_frame: Option<Instant>,
    /// Per-slot fixture health (enabled and last emit succeeded)
    pub fixture_ok: Vec<bool>,
    /// Conditioner output from the most recent tick
    pub values: Conditioned,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            active: false,
            error: false,
            error_msg: String::new(),
            joystick_name: String::new(),
            axis_count: 0,
            button_count: 0,
            virtual_active: false,
            last_frame: None,
            fixture_ok: vec![false; crate::FIXTURE_LIMIT],
            values: Conditioned::default(),
        }
    }
}

impl RuntimeState {
    /// Record an error, keeping the first message of the tick.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = true;
        self.error_msg = message.into();
    }

    /// Clear the error flag after a clean tick.
    pub fn clear_error(&mut self) {
        self.error = false;
        self.error_msg.clear();
    }
}

/// Cloneable handle to the shared runtime state.
#[derive(Debug, Clone, Default)]
pub struct RuntimeHandle {
    inner: Arc<Mutex<RuntimeState>>,
}

impl RuntimeHandle {
    /// Fresh handle with default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the current state under a short lock.
    pub fn read(&self) -> RuntimeState {
        self.inner.lock().expect("runtime state poisoned").clone()
    }

    /// Mutate the state under a short lock (control loop only).
    pub fn update<R>(&self, f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        f(&mut self.inner.lock().expect("runtime state poisoned"))
    }

    /// Whether output is currently active.
    pub fn is_active(&self) -> bool {
        self.read().active
    }
}
