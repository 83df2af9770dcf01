//! HID-backed input devices
//!
//! Enumeration goes through `hidapi`; only joystick-class usages
//! (generic desktop page, joystick/gamepad usage) are listed. The opened
//! device is read non-blocking and decoded with the plain HOTAS report
//! layout this controller supports: four 8-bit axes followed by two bytes
//! of button bits. Devices with other report layouts need their own
//! [`InputDevice`] implementation behind the same trait.

use std::sync::Mutex;

use hidapi::{HidApi, HidDevice};

use super::{DeviceInfo, InputDevice, InputSample};
use crate::{ControlError, Result};

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_JOYSTICK: u16 = 0x04;
const USAGE_GAMEPAD: u16 = 0x05;

/// Device provider backed by hidapi.
pub struct HidProvider {
    api: Mutex<HidApi>,
}

impl HidProvider {
    /// Initialize the HID backend. Failure here means the host has no
    /// usable HID stack; callers fall back to [`NullProvider`].
    pub fn new() -> Result<Self> {
        let api = HidApi::new()
            .map_err(|e| ControlError::DeviceUnavailable(format!("hidapi init failed: {e}")))?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl super::DeviceProvider for HidProvider {
    fn list(&self) -> Vec<DeviceInfo> {
        let mut api = self.api.lock().expect("hidapi poisoned");
        if let Err(e) = api.refresh_devices() {
            tracing::warn!(error = %e, "HID enumeration refresh failed");
        }
        api.device_list()
            .filter(|d| {
                d.usage_page() == USAGE_PAGE_GENERIC_DESKTOP
                    && (d.usage() == USAGE_JOYSTICK || d.usage() == USAGE_GAMEPAD)
            })
            .map(|d| DeviceInfo {
                id: d.path().to_string_lossy().into_owned(),
                name: d.product_string().unwrap_or("unknown").to_string(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
            })
            .collect()
    }

    fn open(&self, id: &str) -> Result<Box<dyn InputDevice>> {
        let api = self.api.lock().expect("hidapi poisoned");
        let path = std::ffi::CString::new(id)
            .map_err(|_| ControlError::DeviceUnavailable("invalid device path".into()))?;
        let device = api
            .open_path(&path)
            .map_err(|e| ControlError::DeviceUnavailable(format!("open {id} failed: {e}")))?;
        device
            .set_blocking_mode(false)
            .map_err(|e| ControlError::DeviceUnavailable(format!("set nonblocking failed: {e}")))?;
        let name = device
            .get_product_string()
            .ok()
            .flatten()
            .unwrap_or_else(|| "HID joystick".to_string());
        Ok(Box::new(HidJoystick {
            device,
            name,
            last: InputSample {
                axes: [0.0; 4],
                buttons: vec![false; 16],
            },
        }))
    }
}

/// A joystick decoded with the fixed 4-axes + 16-buttons report layout.
struct HidJoystick {
    device: HidDevice,
    name: String,
    last: InputSample,
}

impl HidJoystick {
    fn decode(&mut self, report: &[u8]) {
        if report.len() < 6 {
            return;
        }
        for (i, &byte) in report[..4].iter().enumerate() {
            // 0x00..=0xFF centered on 0x80
            self.last.axes[i] = (f32::from(byte) - 128.0) / 127.0;
            self.last.axes[i] = self.last.axes[i].clamp(-1.0, 1.0);
        }
        let bits = u16::from_le_bytes([report[4], report[5]]);
        for (i, slot) in self.last.buttons.iter_mut().enumerate() {
            *slot = bits & (1 << i) != 0;
        }
    }
}

impl InputDevice for HidJoystick {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<InputSample> {
        let mut report = [0u8; 64];
        // drain queued reports, keep the newest
        loop {
            match self.device.read(&mut report) {
                Ok(0) => break,
                Ok(n) => self.decode(&report[..n]),
                Err(e) => {
                    return Err(ControlError::DeviceUnavailable(format!(
                        "HID read failed: {e}"
                    )))
                }
            }
        }
        Ok(self.last.clone())
    }

    fn axis_count(&self) -> usize {
        4
    }

    fn button_count(&self) -> usize {
        self.last.buttons.len()
    }
}

/// Provider for hosts without a HID stack: lists nothing, opens nothing.
pub struct NullProvider;

impl super::DeviceProvider for NullProvider {
    fn list(&self) -> Vec<DeviceInfo> {
        Vec::new()
    }

    fn open(&self, id: &str) -> Result<Box<dyn InputDevice>> {
        Err(ControlError::DeviceUnavailable(format!(
            "no HID backend for device {id}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DeviceProvider;

    #[test]
    fn null_provider_is_empty() {
        assert!(NullProvider.list().is_empty());
        assert!(NullProvider.open("x").is_err());
        assert!(NullProvider.open_first().is_err());
    }
}
