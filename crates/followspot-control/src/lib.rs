//! FollowSpot Control - Runtime and Protocol Integration
//!
//! This crate runs the follow-spot controller:
//! - **sACN**: bit-exact E1.31 output with per-universe sequencing,
//!   keepalives and multi-NIC duplicate sends
//! - **Input**: HID joystick sources with an atomic virtual override
//! - **Control loop**: fixed-period tick driving input → conditioning →
//!   frame assembly → emission
//! - **Web API**: the JSON control surface consumed by the UI
//! - **Indicators**: power/error and per-fixture status sinks

#![allow(missing_docs)]

pub mod error;
/// Status LED sink traits
pub mod indicators;
/// Input sources and device enumeration
pub mod input;
/// Control loop / scheduler
pub mod runner;
/// sACN (E1.31) output
pub mod sacn;
/// Web API server
pub mod web;

pub use error::{ControlError, Result};
pub use indicators::{FixtureStatusSink, IndicatorSink, NoopIndicators};
pub use input::{DeviceProvider, HidProvider, InputDevice, InputSample, NullProvider, VirtualPad};
pub use runner::{ControlLoop, LoopCommand};
pub use sacn::SacnEmitter;
pub use web::{serve, ApiContext, WebServerConfig};
