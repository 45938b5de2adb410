// Integration tests for the HTTP method-channel bridge

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wav_recorder::{
    create_router, AppState, HostPermissions, MethodChannel, MockDevice, Recorder, RecorderConfig,
};

fn app(temp_dir: &TempDir, device: &MockDevice) -> Router {
    let device = Arc::new(device.clone());
    let config = RecorderConfig {
        output_dir: temp_dir.path().join("recordings"),
        scratch_dir: temp_dir.path().join("scratch"),
        buffer_multiplier: 3,
    };
    let permissions = Arc::new(HostPermissions::new(config.output_dir.clone(), device.clone()));
    let recorder = Arc::new(Recorder::new(config, device));

    create_router(AppState::new(MethodChannel::new(recorder, permissions)))
}

async fn call(app: &Router, method: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value)?),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method("POST")
        .uri(format!("/channel/{}", method))
        .header("content-type", "application/json")
        .body(body)?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;

    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = app(&temp_dir, &MockDevice::new(64));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"OK");

    Ok(())
}

#[tokio::test]
async fn test_record_over_http() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let device = MockDevice::new(1024).with_zero_blocks(4);
    let app = app(&temp_dir, &device);
    let output = temp_dir.path().join("http.wav");

    let (status, body) = call(
        &app,
        "start",
        Some(json!({ "path": output, "extension": ".wav" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": null }));

    let (_, body) = call(&app, "isRecording", None).await?;
    assert_eq!(body["result"], json!(true));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !device.is_drained() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    let (status, body) = call(&app, "stop", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["path"], json!(output.display().to_string()));
    assert_eq!(body["result"]["audioOutputFormat"], json!(".wav"));
    assert_eq!(std::fs::metadata(&output)?.len(), 44 + 4 * 1024);

    let (_, body) = call(&app, "isRecording", None).await?;
    assert_eq!(body["result"], json!(false));

    Ok(())
}

#[tokio::test]
async fn test_error_statuses() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = app(&temp_dir, &MockDevice::new(64));

    let (status, body) = call(&app, "stop", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("NOT_RECORDING"));

    let (status, body) = call(&app, "resume", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("NOT_IMPLEMENTED"));

    let (status, body) = call(&app, "start", Some(json!({ "extension": ".aac" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("UNSUPPORTED_FORMAT"));

    Ok(())
}

#[tokio::test]
async fn test_unavailable_device_is_503() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = app(&temp_dir, &MockDevice::new(64).unavailable());

    let (status, body) = call(&app, "start", Some(json!({ "extension": ".wav" }))).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!("DEVICE_UNAVAILABLE"));

    let (status, body) = call(&app, "hasPermissions", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(false));

    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_400() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = app(&temp_dir, &MockDevice::new(64));

    let request = Request::builder()
        .method("POST")
        .uri("/channel/start")
        .body(Body::from("{not json"))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
