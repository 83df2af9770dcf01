//! FollowSpot Core - Domain Model and Control Logic
//!
//! This crate contains the headless follow-spot controller's domain model:
//! - Settings, fixtures, presets and button bindings
//! - The immutable-snapshot config store shared between the control loop
//!   and the HTTP surface
//! - The pure input-conditioning pipeline (deadzone, expo, fine mode,
//!   per-fixture invert/bias)
//! - The debounced button state machine
//! - The per-universe DMX frame assembler
//!
//! Protocol transmission (sACN) and the web API live in `followspot-control`;
//! persistence lives in `followspot-io`.

#![warn(missing_docs)]

use thiserror::Error;

pub mod buttons;
pub mod conditioner;
pub mod fixture;
pub mod frame;
pub mod logging;
pub mod preset;
pub mod runtime;
pub mod settings;
pub mod store;

pub use buttons::{ButtonCommand, ButtonMachine, Held};
pub use conditioner::Conditioned;
pub use fixture::{Fixture, FIXTURE_LIMIT};
pub use frame::{FrameAssembler, UniverseBuffer};
pub use logging::{LogConfig, LogRing};
pub use preset::Preset;
pub use runtime::{RuntimeHandle, RuntimeState};
pub use settings::{DestinationMode, Settings, ZoomSource};
pub use store::{ChangeEvent, ConfigSnapshot, ConfigStore};

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Admission payload violated an invariant
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Highest sACN universe number
pub const UNIVERSE_MAX: u16 = 63999;

/// Number of DMX slots per universe
pub const DMX_SLOTS: usize = 512;

/// A full DMX frame for one universe
pub type DmxFrame = [u8; DMX_SLOTS];
