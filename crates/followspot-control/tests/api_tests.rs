//! Route-level tests for the JSON control surface.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use followspot_control::runner::LoopCommand;
use followspot_control::web::routes::build_router;
use followspot_control::{ApiContext, NullProvider, VirtualPad};
use followspot_core::{ConfigSnapshot, ConfigStore, LogRing, RuntimeHandle};

struct Harness {
    app: Router,
    ctx: Arc<ApiContext>,
    commands: crossbeam_channel::Receiver<LoopCommand>,
}

fn harness() -> Harness {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.settings.ensure_cid();
    let store = Arc::new(ConfigStore::new(snapshot).unwrap());
    let (tx, rx) = crossbeam_channel::unbounded();
    let ctx = Arc::new(ApiContext {
        store,
        runtime: RuntimeHandle::new(),
        pad: Arc::new(VirtualPad::new()),
        log_ring: Arc::new(LogRing::new()),
        commands: tx,
        provider: Arc::new(NullProvider),
        restart_pending: Mutex::new(None),
    });
    Harness {
        app: build_router().with_state(ctx.clone()),
        ctx,
        commands: rx,
    }
}

async fn request(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

fn sample_fixture(id: &str) -> Value {
    json!({
        "id": id,
        "enabled": "True",
        "universe": 1,
        "start_addr": 1,
        "pan_coarse": 1,
        "pan_fine": 2,
        "tilt_coarse": 3,
        "tilt_fine": 4,
        "dimmer": 5
    })
}

#[tokio::test]
async fn status_reports_idle_controller() {
    let h = harness();
    let (status, body) = request(&h.app, Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], json!(false));
    assert_eq!(body["error"], json!(false));
    assert_eq!(body["last_frame"], json!("-"));
    assert_eq!(body["fixture_leds"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn fixture_crud_lifecycle() {
    let h = harness();

    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/fixtures",
        Some(sample_fixture("F1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // duplicate id rejected
    let (status, body) = request(
        &h.app,
        Method::POST,
        "/api/fixtures",
        Some(sample_fixture("F1")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));

    let (status, body) = request(&h.app, Method::GET, "/api/fixtures", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fixtures"].as_array().unwrap().len(), 1);

    let (status, _) = request(
        &h.app,
        Method::PATCH,
        "/api/fixtures/F1",
        Some(json!({"enabled": "False", "pan_bias": -200})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let snapshot = h.ctx.store.snapshot();
    assert!(!snapshot.fixtures[0].enabled);
    assert_eq!(snapshot.fixtures[0].pan_bias, -200);

    let (status, _) = request(&h.app, Method::DELETE, "/api/fixtures/F1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&h.app, Method::DELETE, "/api/fixtures/F1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fixture_limit_returns_400() {
    let h = harness();
    for i in 0..6 {
        let (status, _) = request(
            &h.app,
            Method::POST,
            "/api/fixtures",
            Some(sample_fixture(&format!("F{i}"))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = request(
        &h.app,
        Method::POST,
        "/api/fixtures",
        Some(sample_fixture("F6")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn invalid_channel_range_returns_400() {
    let h = harness();
    let mut fixture = sample_fixture("F1");
    fixture["start_addr"] = json!(510);
    fixture["dimmer"] = json!(4);
    let (status, body) = request(&h.app, Method::POST, "/api/fixtures", Some(fixture)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("past 512"));
}

#[tokio::test]
async fn settings_merge_and_validation() {
    let h = harness();

    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/settings",
        Some(json!({"priority": 120, "throttle_invert": "True"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let settings = &h.ctx.store.snapshot().settings;
    assert_eq!(settings.priority, 120);
    assert!(settings.throttle_invert);

    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/settings",
        Some(json!({"deadzone": 0.9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // failed merge left the previous value in place
    assert_eq!(h.ctx.store.snapshot().settings.priority, 120);
}

#[tokio::test]
async fn activate_and_release_reach_the_loop() {
    let h = harness();
    let (status, _) = request(&h.app, Method::POST, "/api/activate", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&h.app, Method::POST, "/api/release", None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(h.commands.try_recv().unwrap(), LoopCommand::Activate);
    assert_eq!(h.commands.try_recv().unwrap(), LoopCommand::Release);
}

#[tokio::test]
async fn virtual_pad_roundtrip() {
    let h = harness();
    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/virtual",
        Some(json!({"x": 0.5, "y": -0.25, "enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, press) = request(
        &h.app,
        Method::POST,
        "/api/virtual/press",
        Some(json!({"button": 5})),
    )
    .await;
    assert_eq!(press["ok"], json!(true));

    let (status, body) = request(&h.app, Method::GET, "/api/virtual", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["x"], json!(0.5));
    assert_eq!(body["enabled"], json!(true));
    assert_eq!(body["buttons"]["5"], json!(true));
}

#[tokio::test]
async fn preset_capture_bind_and_cascade() {
    let h = harness();

    let (status, preset) = request(
        &h.app,
        Method::POST,
        "/api/presets",
        Some(json!({"name": "Downstage"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = preset["id"].as_str().unwrap().to_string();

    // binding onto a semantic button is rejected
    let semantic = h.ctx.store.snapshot().settings.btn_activate;
    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/preset-buttons",
        Some(json!({"button": semantic, "preset": id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/preset-buttons",
        Some(json!({"button": 9, "preset": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // recall goes to the loop
    let (status, _) = request(
        &h.app,
        Method::POST,
        &format!("/api/presets/{id}/recall"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.commands.try_recv().unwrap(),
        LoopCommand::RecallPreset(id.clone())
    );

    // delete cascades to the binding
    let (status, _) = request(&h.app, Method::DELETE, &format!("/api/presets/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.ctx.store.snapshot().bindings.is_empty());

    let (status, _) = request(
        &h.app,
        Method::POST,
        &format!("/api/presets/{id}/recall"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn csv_import_and_export() {
    let h = harness();
    let csv = "\
id,enabled,universe,start_addr,pan_coarse,pan_fine,tilt_coarse,tilt_fine,dimmer,zoom,zoom_fine,color_temp_channel,color_temp_value,invert_pan,invert_tilt,pan_bias,tilt_bias,status_led
Left,True,1,1,1,2,3,4,5,0,0,0,0,False,False,0,0,1
Right,True,2,1,1,2,3,4,5,0,0,0,0,True,False,0,0,2
";
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/fixtures/import")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.ctx.store.snapshot().fixtures.len(), 2);

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/fixtures/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/csv"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("id,enabled,universe"));
    assert!(text.contains("Left,True,1"));
}

#[tokio::test]
async fn logs_are_plain_text() {
    let h = harness();
    h.ctx.log_ring.push("[00:00:00] INFO hello".into());
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("hello"));
}

#[tokio::test]
async fn restart_requires_confirmation_handshake() {
    let h = harness();

    // confirm without a pending request fails
    let (status, _) = request(
        &h.app,
        Method::POST,
        "/api/restart",
        Some(json!({"confirm": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(&h.app, Method::POST, "/api/restart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], json!(true));
}
