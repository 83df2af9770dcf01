//! REST API route definitions
//!
//! JSON-over-HTTP surface consumed by the external UI. All write
//! endpoints validate through the config store; validation failures come
//! back as 400 envelopes, unknown ids as 404, everything else as 500 with
//! a correlation id in the log.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::Value;

use followspot_core::{ChangeEvent, Fixture, FIXTURE_LIMIT};

use super::handlers::{
    Ack, AdapterInfo, ApiError, FixtureLed, FixturesConfigRequest, FixturesResponse,
    PresetBindRequest, PresetCreateRequest, PresetUpdateRequest, RestartRequest, StatusResponse,
    VirtualButtonRequest, VirtualUpdateRequest,
};
use super::server::ApiContext;
use crate::runner::LoopCommand;

/// A restart confirmation is honored for this long.
const RESTART_CONFIRM_WINDOW: Duration = Duration::from_secs(30);

/// Build the API router.
pub fn build_router() -> Router<Arc<ApiContext>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs))
        .route("/api/settings", get(get_settings).post(post_settings))
        .route("/api/fixtures", get(get_fixtures).post(post_fixture))
        .route("/api/fixtures/import", post(import_fixtures))
        .route("/api/fixtures/export", get(export_fixtures))
        .route("/api/fixtures/config", post(post_fixtures_config))
        .route("/api/fixtures/:id", patch(patch_fixture).delete(delete_fixture))
        .route("/api/activate", post(post_activate))
        .route("/api/release", post(post_release))
        .route("/api/virtual", get(get_virtual).post(post_virtual))
        .route("/api/virtual/press", post(virtual_press))
        .route("/api/virtual/release", post(virtual_release))
        .route("/api/presets", get(get_presets).post(create_preset))
        .route("/api/presets/release", post(release_preset_hold))
        .route("/api/presets/:id", patch(update_preset).delete(delete_preset))
        .route("/api/presets/:id/recall", post(recall_preset))
        .route("/api/preset-buttons", post(bind_preset_button))
        .route("/api/network/adapters", get(get_adapters))
        .route("/api/usb/devices", get(get_usb_devices))
        .route("/api/restart", post(post_restart))
}

/// GET /api/status
async fn get_status(State(ctx): State<Arc<ApiContext>>) -> Json<StatusResponse> {
    let state = ctx.runtime.read();
    let snapshot = ctx.store.snapshot();

    let last_frame = match state.last_frame {
        Some(at) => {
            let secs = at.elapsed().as_secs_f64();
            if secs < 3600.0 {
                format!("{secs:.2}s ago")
            } else {
                "long ago".to_string()
            }
        }
        None => "-".to_string(),
    };

    let mut fixture_leds: Vec<FixtureLed> = (0..FIXTURE_LIMIT)
        .map(|slot| FixtureLed {
            label: format!("Slot {}", slot + 1),
            on: state.fixture_ok.get(slot).copied().unwrap_or(false),
        })
        .collect();
    for fixture in &snapshot.fixtures {
        let slot = usize::from(fixture.status_led);
        if (1..=FIXTURE_LIMIT).contains(&slot) {
            let led = &mut fixture_leds[slot - 1];
            if led.label.starts_with("Slot ") {
                led.label = fixture.id.clone();
            } else {
                led.label = format!("{}, {}", led.label, fixture.id);
            }
        }
    }

    Json(StatusResponse {
        active: state.active,
        error: state.error,
        error_msg: state.error_msg.clone(),
        joystick_name: state.joystick_name.clone(),
        axes: state.axis_count,
        buttons: state.button_count,
        last_frame,
        virtual_active: state.virtual_active,
        power_led: !state.error,
        error_led: state.error,
        fixture_leds,
        values: state.values,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/logs - most recent lines, plain text
async fn get_logs(State(ctx): State<Arc<ApiContext>>) -> String {
    let mut body = ctx.log_ring.tail(800).join("\n");
    body.push('\n');
    body
}

/// GET /api/settings
async fn get_settings(State(ctx): State<Arc<ApiContext>>) -> Json<followspot_core::Settings> {
    Json(ctx.store.snapshot().settings.clone())
}

/// POST /api/settings - merge a partial settings object
async fn post_settings(
    State(ctx): State<Arc<ApiContext>>,
    Json(patch): Json<Value>,
) -> Result<Json<Ack>, ApiError> {
    ctx.store
        .apply(ChangeEvent::Settings, |s| s.merge_settings(patch))?;
    tracing::info!("settings saved");
    Ok(Json(Ack::message("Settings saved")))
}

/// GET /api/fixtures
async fn get_fixtures(State(ctx): State<Arc<ApiContext>>) -> Json<FixturesResponse> {
    let snapshot = ctx.store.snapshot();
    Json(FixturesResponse {
        multi_universe_enabled: snapshot.settings.multi_universe_enabled,
        default_universe: snapshot.settings.default_universe,
        fixtures: snapshot.fixtures.clone(),
    })
}

/// POST /api/fixtures - create; 400 on limit or invariant violations
async fn post_fixture(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<Value>,
) -> Result<Json<Ack>, ApiError> {
    let fixture: Fixture =
        serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("invalid fixture: {e}")))?;
    let id = fixture.id.clone();
    ctx.store
        .apply(ChangeEvent::Fixtures, |s| s.add_fixture(fixture))?;
    tracing::info!(fixture = %id, "fixture added");
    Ok(Json(Ack::ok()))
}

/// PATCH /api/fixtures/:id - partial update
async fn patch_fixture(
    State(ctx): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Ack>, ApiError> {
    ctx.store
        .apply(ChangeEvent::Fixtures, |s| s.patch_fixture(&id, body))?;
    tracing::info!(fixture = %id, "fixture updated");
    Ok(Json(Ack::ok()))
}

/// DELETE /api/fixtures/:id
async fn delete_fixture(
    State(ctx): State<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    ctx.store
        .apply(ChangeEvent::Fixtures, |s| s.remove_fixture(&id))?;
    tracing::info!(fixture = %id, "fixture removed");
    Ok(Json(Ack::ok()))
}

/// POST /api/fixtures/import - text/plain CSV bulk import
async fn import_fixtures(
    State(ctx): State<Arc<ApiContext>>,
    body: String,
) -> Result<Json<Ack>, ApiError> {
    let fixtures = followspot_io::fixtures_csv::import(&body)?;
    let count = fixtures.len();
    ctx.store
        .apply(ChangeEvent::Fixtures, |s| s.replace_fixtures(fixtures))?;
    tracing::info!(count, "fixtures imported from CSV");
    Ok(Json(Ack::count(count)))
}

/// GET /api/fixtures/export - CSV download
async fn export_fixtures(State(ctx): State<Arc<ApiContext>>) -> Result<impl IntoResponse, ApiError> {
    let csv = followspot_io::fixtures_csv::export(&ctx.store.snapshot().fixtures)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=fixtures.csv",
            ),
        ],
        csv,
    ))
}

/// POST /api/fixtures/config - multi-universe toggle / default universe
async fn post_fixtures_config(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<FixturesConfigRequest>,
) -> Result<Json<Ack>, ApiError> {
    ctx.store.apply(ChangeEvent::Settings, |s| {
        if let Some(enabled) = body.multi_universe_enabled {
            s.settings.multi_universe_enabled = enabled;
        }
        if let Some(universe) = body.default_universe {
            s.settings.default_universe = universe;
        }
        Ok(())
    })?;
    Ok(Json(Ack::ok()))
}

/// POST /api/activate
async fn post_activate(State(ctx): State<Arc<ApiContext>>) -> Result<Json<Ack>, ApiError> {
    ctx.send_command(LoopCommand::Activate)?;
    tracing::info!("activated via API");
    Ok(Json(Ack::ok()))
}

/// POST /api/release
async fn post_release(State(ctx): State<Arc<ApiContext>>) -> Result<Json<Ack>, ApiError> {
    ctx.send_command(LoopCommand::Release)?;
    tracing::info!("released via API");
    Ok(Json(Ack::ok()))
}

/// GET /api/virtual
async fn get_virtual(State(ctx): State<Arc<ApiContext>>) -> Json<Value> {
    let state = ctx.pad.state();
    let enabled = ctx.store.snapshot().settings.virtual_enabled;
    let mut value = serde_json::to_value(state).unwrap_or_default();
    if let Value::Object(map) = &mut value {
        map.insert("enabled".into(), Value::Bool(enabled));
    }
    Json(value)
}

/// POST /api/virtual - update axes/buttons/enabled
async fn post_virtual(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<VirtualUpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    if let Some(enabled) = body.enabled {
        ctx.store.apply(ChangeEvent::Settings, |s| {
            s.settings.virtual_enabled = enabled;
            Ok(())
        })?;
    }
    ctx.pad.set_axes(body.x, body.y, body.throttle, body.zaxis);
    if let Some(buttons) = body.buttons {
        let updates = buttons.into_iter().map(|(i, v)| (i, v != 0)).collect();
        ctx.pad.set_buttons(&updates);
    }
    Ok(Json(Ack::ok()))
}

/// POST /api/virtual/press
async fn virtual_press(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<VirtualButtonRequest>,
) -> Json<Ack> {
    ctx.pad.set_button(body.button, true);
    Json(Ack::ok())
}

/// POST /api/virtual/release
async fn virtual_release(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<VirtualButtonRequest>,
) -> Json<Ack> {
    ctx.pad.set_button(body.button, false);
    Json(Ack::ok())
}

/// GET /api/presets
async fn get_presets(State(ctx): State<Arc<ApiContext>>) -> Json<Value> {
    let snapshot = ctx.store.snapshot();
    Json(serde_json::json!({
        "presets": snapshot.presets,
        "bindings": snapshot.bindings,
    }))
}

/// POST /api/presets - capture the current conditioner output
async fn create_preset(
    State(ctx): State<Arc<ApiContext>>,
    body: Option<Json<PresetCreateRequest>>,
) -> Result<Json<followspot_core::Preset>, ApiError> {
    let name = body.and_then(|Json(b)| b.name);
    let values = ctx.runtime.read().values;
    let preset = ctx
        .store
        .apply(ChangeEvent::Presets, |s| s.capture_preset(name, values))?;
    tracing::info!(preset = %preset.name, "preset captured");
    Ok(Json(preset))
}

/// PATCH /api/presets/:id - rename and/or overwrite values
async fn update_preset(
    State(ctx): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(body): Json<PresetUpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    let values = body.use_current.then(|| ctx.runtime.read().values);
    ctx.store
        .apply(ChangeEvent::Presets, |s| s.update_preset(&id, body.name, values))?;
    Ok(Json(Ack::ok()))
}

/// DELETE /api/presets/:id - remove, cascading to bindings
async fn delete_preset(
    State(ctx): State<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    ctx.store
        .apply(ChangeEvent::Presets, |s| s.remove_preset(&id))?;
    tracing::info!(preset = %id, "preset removed");
    Ok(Json(Ack::ok()))
}

/// POST /api/presets/:id/recall - hold the preset's values
async fn recall_preset(
    State(ctx): State<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let snapshot = ctx.store.snapshot();
    if snapshot.preset(&id).is_none() {
        return Err(followspot_core::CoreError::NotFound(format!("preset {id}")).into());
    }
    ctx.send_command(LoopCommand::RecallPreset(id))?;
    Ok(Json(Ack::ok()))
}

/// POST /api/presets/release - drop the held values
async fn release_preset_hold(State(ctx): State<Arc<ApiContext>>) -> Result<Json<Ack>, ApiError> {
    ctx.send_command(LoopCommand::ClearPresetHold)?;
    Ok(Json(Ack::ok()))
}

/// POST /api/preset-buttons - bind or unbind a button
async fn bind_preset_button(
    State(ctx): State<Arc<ApiContext>>,
    Json(body): Json<PresetBindRequest>,
) -> Result<Json<Ack>, ApiError> {
    let preset = (!body.preset.is_empty()).then_some(body.preset);
    ctx.store.apply(ChangeEvent::Bindings, |s| {
        s.bind_button(body.button, preset.as_deref())
    })?;
    Ok(Json(Ack::ok()))
}

/// GET /api/network/adapters - local IPv4 adapters
async fn get_adapters() -> Result<Json<Vec<AdapterInfo>>, ApiError> {
    let adapters = if_addrs::get_if_addrs()
        .map_err(ApiError::internal)?
        .into_iter()
        .filter(|iface| iface.ip().is_ipv4())
        .map(|iface| AdapterInfo {
            address: iface.ip().to_string(),
            name: iface.name,
        })
        .collect();
    Ok(Json(adapters))
}

/// GET /api/usb/devices - HID joystick enumeration
async fn get_usb_devices(State(ctx): State<Arc<ApiContext>>) -> Json<Vec<crate::input::DeviceInfo>> {
    Json(ctx.provider.list())
}

/// POST /api/restart - confirm-then-reexec handshake
async fn post_restart(
    State(ctx): State<Arc<ApiContext>>,
    body: Option<Json<RestartRequest>>,
) -> Result<Json<Value>, ApiError> {
    let confirm = body.map(|Json(b)| b.confirm).unwrap_or(false);
    let mut pending = ctx.restart_pending.lock().expect("restart state poisoned");

    if !confirm {
        *pending = Some(Instant::now());
        return Ok(Json(serde_json::json!({
            "pending": true,
            "message": "POST again with {\"confirm\": true} to restart"
        })));
    }

    let confirmed = pending
        .take()
        .is_some_and(|at| at.elapsed() < RESTART_CONFIRM_WINDOW);
    if !confirmed {
        return Err(ApiError::bad_request("no restart pending; request one first"));
    }
    drop(pending);

    tracing::warn!("restart confirmed; re-executing");
    ctx.send_command(LoopCommand::Shutdown)?;
    tokio::spawn(async {
        // give the loop a moment to flush zero frames
        tokio::time::sleep(Duration::from_millis(300)).await;
        match std::env::current_exe() {
            Ok(exe) => {
                let args: Vec<String> = std::env::args().skip(1).collect();
                match std::process::Command::new(exe).args(args).spawn() {
                    Ok(_) => tracing::info!("restart process spawned"),
                    Err(e) => tracing::error!(error = %e, "restart spawn failed"),
                }
            }
            Err(e) => tracing::error!(error = %e, "current_exe lookup failed"),
        }
        std::process::exit(0);
    });

    Ok(Json(serde_json::json!({ "ok": true, "restarting": true })))
}
