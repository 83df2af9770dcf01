//! Status indicator sinks
//!
//! The control loop drives two outputs: a power/error indicator pair and a
//! bank of per-fixture status LEDs. Concrete GPIO drivers live outside
//! this crate; hosts without pins use the no-op implementations.

/// Power/error indicator pair.
pub trait IndicatorSink: Send {
    /// Power LED: on while the process runs and output is healthy.
    fn set_power(&mut self, on: bool);
    /// Error LED: on while RuntimeState.error is set.
    fn set_error(&mut self, on: bool);
}

/// Bank of per-fixture status outputs, one slot per fixture LED.
pub trait FixtureStatusSink: Send {
    /// Drive all slots; missing entries read as off.
    fn set_slots(&mut self, states: &[bool]);
}

/// No-op indicators for hosts without GPIO.
#[derive(Debug, Default)]
pub struct NoopIndicators;

impl IndicatorSink for NoopIndicators {
    fn set_power(&mut self, _on: bool) {}
    fn set_error(&mut self, _on: bool) {}
}

impl FixtureStatusSink for NoopIndicators {
    fn set_slots(&mut self, _states: &[bool]) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every write, for loop tests.
    #[derive(Debug, Default, Clone)]
    pub struct RecordingSink {
        pub power: Arc<Mutex<Vec<bool>>>,
        pub error: Arc<Mutex<Vec<bool>>>,
        pub slots: Arc<Mutex<Vec<Vec<bool>>>>,
    }

    impl IndicatorSink for RecordingSink {
        fn set_power(&mut self, on: bool) {
            self.power.lock().unwrap().push(on);
        }
        fn set_error(&mut self, on: bool) {
            self.error.lock().unwrap().push(on);
        }
    }

    impl FixtureStatusSink for RecordingSink {
        fn set_slots(&mut self, states: &[bool]) {
            self.slots.lock().unwrap().push(states.to_vec());
        }
    }
}
