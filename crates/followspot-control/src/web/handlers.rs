//! HTTP request/response types and the error envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use followspot_core::conditioner::Conditioned;
use followspot_core::{CoreError, Fixture};

use crate::ControlError;

/// Write-endpoint acknowledgement: `{"ok": true}` plus an optional note.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
            count: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
            count: None,
        }
    }

    pub fn count(count: usize) -> Self {
        Self {
            ok: true,
            message: None,
            count: Some(count),
        }
    }
}

/// `GET /api/status` payload: RuntimeState plus joystick metadata.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub active: bool,
    pub error: bool,
    pub error_msg: String,
    pub joystick_name: String,
    pub axes: usize,
    pub buttons: usize,
    /// Seconds-ago rendering of the last tick, "-" before the first
    pub last_frame: String,
    pub virtual_active: bool,
    pub power_led: bool,
    pub error_led: bool,
    pub fixture_leds: Vec<FixtureLed>,
    pub values: Conditioned,
    pub version: String,
}

/// One fixture-status LED slot for the dashboard.
#[derive(Debug, Serialize)]
pub struct FixtureLed {
    pub label: String,
    pub on: bool,
}

/// `GET /api/fixtures` payload.
#[derive(Debug, Serialize)]
pub struct FixturesResponse {
    pub multi_universe_enabled: bool,
    pub default_universe: u16,
    pub fixtures: Vec<Fixture>,
}

/// `POST /api/fixtures/config` body.
#[derive(Debug, Deserialize)]
pub struct FixturesConfigRequest {
    pub multi_universe_enabled: Option<bool>,
    pub default_universe: Option<u16>,
}

/// `POST /api/virtual` body; any subset of fields.
#[derive(Debug, Default, Deserialize)]
pub struct VirtualUpdateRequest {
    pub enabled: Option<bool>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub throttle: Option<f32>,
    pub zaxis: Option<f32>,
    pub buttons: Option<std::collections::BTreeMap<u8, u8>>,
}

/// `POST /api/virtual/press` and `/release` body.
#[derive(Debug, Deserialize)]
pub struct VirtualButtonRequest {
    pub button: u8,
}

/// `POST /api/presets` body: capture the current output, optionally named.
#[derive(Debug, Default, Deserialize)]
pub struct PresetCreateRequest {
    pub name: Option<String>,
}

/// `PATCH /api/presets/{id}` body.
#[derive(Debug, Default, Deserialize)]
pub struct PresetUpdateRequest {
    pub name: Option<String>,
    /// Overwrite stored values with the current conditioner output
    #[serde(default)]
    pub use_current: bool,
}

/// `POST /api/preset-buttons` body; empty preset id unbinds.
#[derive(Debug, Deserialize)]
pub struct PresetBindRequest {
    pub button: u8,
    #[serde(default)]
    pub preset: String,
}

/// `GET /api/network/adapters` entry.
#[derive(Debug, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    pub address: String,
}

/// `POST /api/restart` body and response.
#[derive(Debug, Default, Deserialize)]
pub struct RestartRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// Error envelope: `{"error": "..."}` with the mapped status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(source: impl std::fmt::Display) -> Self {
        let correlation = uuid::Uuid::new_v4();
        tracing::error!(%correlation, error = %source, "internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("internal error ({correlation})"),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match &error {
            CoreError::Validation(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message: message.clone(),
            },
            CoreError::NotFound(what) => Self {
                status: StatusCode::NOT_FOUND,
                message: format!("{what} not found"),
            },
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(error: ControlError) -> Self {
        match error {
            ControlError::Core(core) => core.into(),
            ControlError::Persistence(io) => Self::bad_request(io.to_string()),
            other => Self::internal(other),
        }
    }
}

impl From<followspot_io::IoError> for ApiError {
    fn from(error: followspot_io::IoError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
