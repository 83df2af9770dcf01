//! Button state machine
//!
//! Tracks per-button down state from the raw sample each tick, debounces
//! edges (two edges on the same button within 5 ms collapse to one), and
//! turns presses of the configured semantic buttons into commands for the
//! control loop. Hold-style actions (flash-10, dim-off, fine, zoom-mod)
//! are exposed through [`ButtonMachine::held`] instead of commands.

use std::time::{Duration, Instant};

use crate::store::ConfigSnapshot;

/// Edges closer together than this on one button are ignored.
pub const DEBOUNCE: Duration = Duration::from_millis(5);

/// Commands emitted on press/release edges of mapped buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonCommand {
    /// Take control: resume sACN output
    Activate,
    /// Release control: flush a zero frame, then keep alive
    Release,
    /// Load a preset into the held-values slot
    RecallPreset(String),
    /// The recall button was released; resume live conditioning
    ClearPresetHold,
}

/// Hold-style modifiers currently engaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Held {
    /// Fine-mode gain applies to pan/tilt
    pub fine: bool,
    /// Dimmer forced to the flash level
    pub flash10: bool,
    /// Dimmer forced to zero
    pub dim_off: bool,
    /// Tilt axis routed to zoom
    pub zoom_mod: bool,
}

/// Debounced button edge processor.
#[derive(Debug, Default)]
pub struct ButtonMachine {
    down: Vec<bool>,
    last_edge: Vec<Option<Instant>>,
    hold_button: Option<u8>,
}

impl ButtonMachine {
    /// Create an empty machine; button slots grow with the first sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sampled button array. Edges are debounced per button and
    /// presses of mapped buttons become commands. Buttons that drop out of
    /// the sample (device unplugged) read as released.
    pub fn update(
        &mut self,
        buttons: &[bool],
        now: Instant,
        snapshot: &ConfigSnapshot,
    ) -> Vec<ButtonCommand> {
        let tracked = buttons.len().max(self.down.len());
        self.down.resize(tracked, false);
        self.last_edge.resize(tracked, None);

        let settings = &snapshot.settings;
        let mut commands = Vec::new();

        for index in 0..tracked {
            let pressed = buttons.get(index).copied().unwrap_or(false);
            if pressed == self.down[index] {
                continue;
            }
            if let Some(last) = self.last_edge[index] {
                if now.duration_since(last) < DEBOUNCE {
                    continue;
                }
            }
            self.last_edge[index] = Some(now);
            self.down[index] = pressed;

            let Ok(button) = u8::try_from(index) else {
                continue;
            };
            if pressed {
                if button == settings.btn_activate {
                    commands.push(ButtonCommand::Activate);
                } else if button == settings.btn_release {
                    commands.push(ButtonCommand::Release);
                } else if let Some(preset_id) = snapshot.bindings.get(&button) {
                    self.hold_button = Some(button);
                    commands.push(ButtonCommand::RecallPreset(preset_id.clone()));
                }
            } else if self.hold_button == Some(button) {
                self.hold_button = None;
                commands.push(ButtonCommand::ClearPresetHold);
            }
        }

        commands
    }

    /// Current hold-style modifier state per the configured indices.
    pub fn held(&self, snapshot: &ConfigSnapshot) -> Held {
        let s = &snapshot.settings;
        Held {
            fine: self.is_down(s.btn_fine),
            flash10: self.is_down(s.btn_flash10),
            dim_off: self.is_down(s.btn_dim_off),
            zoom_mod: self.is_down(s.btn_zoom_mod),
        }
    }

    fn is_down(&self, button: u8) -> bool {
        self.down.get(usize::from(button)).copied().unwrap_or(false)
    }
}
