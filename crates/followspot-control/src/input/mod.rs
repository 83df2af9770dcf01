//! Input sources
//!
//! The control loop pulls one [`InputSample`] per tick from either a
//! physical HID device or the virtual joystick. The swap is atomic per
//! tick: while the virtual flag is on, hardware is ignored but the device
//! handle is kept open. Missing hardware is not fatal; the source reports
//! idle until a device appears or the virtual pad is enabled.

mod hardware;
mod virtualpad;

pub use hardware::{HidProvider, NullProvider};
pub use virtualpad::{VirtualPad, VirtualState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use followspot_core::Settings;

use crate::Result;

/// One tick's worth of normalized input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSample {
    /// Axis values in [-1, 1]: 0 = pan, 1 = tilt, 2 = throttle, 3 = z
    pub axes: [f32; 4],
    /// Button down states, indexed by button number
    pub buttons: Vec<bool>,
}

/// Metadata about where the sample came from, for /api/status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfo {
    /// Device name, empty when no hardware is attached
    pub device_name: String,
    /// Axis count of the active source
    pub axis_count: usize,
    /// Button count of the active source
    pub button_count: usize,
    /// The sample came from the virtual pad
    pub virtual_active: bool,
}

/// An input device enumerated by a [`DeviceProvider`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceInfo {
    /// Opaque id usable with [`DeviceProvider::open`]
    pub id: String,
    /// Human-readable product name
    pub name: String,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
}

/// An opened joystick-class device.
pub trait InputDevice: Send {
    /// Product name for status display.
    fn name(&self) -> &str;
    /// Non-blocking poll; returns the latest sample.
    fn poll(&mut self) -> Result<InputSample>;
    /// Axes the device reports.
    fn axis_count(&self) -> usize;
    /// Buttons the device reports.
    fn button_count(&self) -> usize;
}

/// Enumerates and opens input devices.
pub trait DeviceProvider: Send + Sync {
    /// List candidate devices.
    fn list(&self) -> Vec<DeviceInfo>;
    /// Open a device by its enumeration id.
    fn open(&self, id: &str) -> Result<Box<dyn InputDevice>>;
    /// Open the first available device, if any.
    fn open_first(&self) -> Result<Box<dyn InputDevice>> {
        let first = self.list().into_iter().next().ok_or_else(|| {
            crate::ControlError::DeviceUnavailable("no input devices present".into())
        })?;
        self.open(&first.id)
    }
}

/// How often to probe for hardware while none is attached.
const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// The control loop's input stage: hardware with virtual override.
pub struct InputStage {
    provider: Arc<dyn DeviceProvider>,
    pad: Arc<VirtualPad>,
    device: Option<Box<dyn InputDevice>>,
    last_probe: Option<Instant>,
}

impl InputStage {
    /// Build the stage around a device provider and the shared virtual pad.
    pub fn new(provider: Arc<dyn DeviceProvider>, pad: Arc<VirtualPad>) -> Self {
        Self {
            provider,
            pad,
            device: None,
            last_probe: None,
        }
    }

    /// Poll the active source for this tick.
    pub fn poll(&mut self, settings: &Settings, now: Instant) -> (InputSample, SourceInfo) {
        if settings.virtual_enabled {
            let sample = self.pad.sample();
            let info = SourceInfo {
                device_name: self
                    .device
                    .as_ref()
                    .map(|d| d.name().to_string())
                    .unwrap_or_default(),
                axis_count: 4,
                button_count: sample.buttons.len(),
                virtual_active: true,
            };
            return (sample, info);
        }

        if self.device.is_none() {
            let due = self
                .last_probe
                .map_or(true, |t| now.duration_since(t) >= PROBE_INTERVAL);
            if due {
                self.last_probe = Some(now);
                match self.provider.open_first() {
                    Ok(device) => {
                        tracing::info!(name = device.name(), "input device attached");
                        self.device = Some(device);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "no input device yet");
                    }
                }
            }
        }

        match self.device.as_mut() {
            Some(device) => match device.poll() {
                Ok(sample) => {
                    let info = SourceInfo {
                        device_name: device.name().to_string(),
                        axis_count: device.axis_count(),
                        button_count: device.button_count(),
                        virtual_active: false,
                    };
                    (sample, info)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input device lost");
                    self.device = None;
                    (InputSample::default(), SourceInfo::default())
                }
            },
            None => (InputSample::default(), SourceInfo::default()),
        }
    }
}
