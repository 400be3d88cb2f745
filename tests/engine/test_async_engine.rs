// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Async engine: multipart submission and the polling state machine

use axum::extract::Path;
use axum::http::HeaderMap;
use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::support::{spawn_stub, Counter};
use zai_proxy_node::upstream::{
    AsyncEngine, GenerationRequest, PollConfig, Transport, UpstreamError,
};

const PATH: &str = "/v1/videos";

fn request() -> GenerationRequest {
    GenerationRequest {
        model: "gemini-3-pro-image-preview-async".to_string(),
        prompt: "a city in the clouds".to_string(),
        size: None,
        images: None,
    }
}

fn engine(base_url: &str, max_attempts: u32) -> AsyncEngine {
    AsyncEngine::new(
        Transport::new(Duration::from_secs(5)),
        base_url,
        "sk-test",
        PollConfig {
            max_attempts,
            interval: Duration::from_millis(5),
        },
    )
}

/// Stub with a fixed submit response and scripted poll responses. The last
/// script entry repeats once the script is exhausted.
fn stub_router(
    submit_response: Value,
    poll_script: Vec<(StatusCode, String)>,
    polls: Counter,
) -> Router {
    let script = Arc::new(poll_script);
    Router::new()
        .route(
            PATH,
            post(move || {
                let submit_response = submit_response.clone();
                async move { Json(submit_response) }
            }),
        )
        .route(
            &format!("{}/:id", PATH),
            get(move |Path(_id): Path<String>| {
                let script = script.clone();
                let polls = polls.clone();
                async move {
                    let attempt = polls.bump() as usize;
                    let index = (attempt - 1).min(script.len() - 1);
                    let (status, body) = script[index].clone();
                    (status, body)
                }
            }),
        )
}

#[tokio::test]
async fn test_completed_task_returns_video_url() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"id": "task-1"}),
        vec![(
            StatusCode::OK,
            json!({"status": "completed", "video_url": "http://x/video.mp4"}).to_string(),
        )],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let url = engine(&base, 60).generate(&request(), PATH).await.unwrap();
    assert_eq!(url, "http://x/video.mp4");
    assert_eq!(polls.get(), 1);
}

#[tokio::test]
async fn test_task_id_from_nested_data_shape() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"data": {"id": "task-9"}}),
        vec![(
            StatusCode::OK,
            json!({"status": "succeeded", "url": "http://x/result.png"}).to_string(),
        )],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let url = engine(&base, 60).generate(&request(), PATH).await.unwrap();
    assert_eq!(url, "http://x/result.png");
}

#[tokio::test]
async fn test_submission_without_task_id_is_fatal() {
    let polls = Counter::new();
    let router = stub_router(json!({"accepted": true}), vec![], polls.clone());
    let base = spawn_stub(router).await;

    let err = engine(&base, 60).generate(&request(), PATH).await.unwrap_err();
    assert!(matches!(err, UpstreamError::NoTaskId(_)));
    assert_eq!(polls.get(), 0, "no polling after a failed submission");
}

#[tokio::test]
async fn test_failed_status_aborts_after_exactly_one_poll() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"id": "task-1"}),
        vec![(
            StatusCode::OK,
            json!({"status": "failed", "detail": "content rejected"}).to_string(),
        )],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let err = engine(&base, 60).generate(&request(), PATH).await.unwrap_err();
    match err {
        UpstreamError::GenerationFailed(payload) => {
            assert!(payload.contains("content rejected"));
        }
        other => panic!("expected GenerationFailed, got {:?}", other),
    }
    assert_eq!(polls.get(), 1);
}

#[tokio::test]
async fn test_no_terminal_status_times_out_after_budget() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"id": "task-1"}),
        vec![(
            StatusCode::OK,
            json!({"status": "processing"}).to_string(),
        )],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let err = engine(&base, 60).generate(&request(), PATH).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Timeout { attempts: 60 }));
    assert_eq!(polls.get(), 60, "exactly the budget, no more");
}

#[tokio::test]
async fn test_transient_poll_failures_consume_attempts_without_aborting() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"id": "task-1"}),
        vec![
            (StatusCode::BAD_GATEWAY, "gateway error".to_string()),
            (StatusCode::OK, "<html>not json</html>".to_string()),
            (
                StatusCode::OK,
                json!({"status": "completed", "url": "http://x/late.png"}).to_string(),
            ),
        ],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let url = engine(&base, 60).generate(&request(), PATH).await.unwrap();
    assert_eq!(url, "http://x/late.png");
    assert_eq!(polls.get(), 3);
}

#[tokio::test]
async fn test_result_field_priority_falls_back_to_images_list() {
    let polls = Counter::new();
    let router = stub_router(
        json!({"id": "task-1"}),
        vec![(
            StatusCode::OK,
            json!({
                "status": "completed",
                "images": [{"url": "http://x/from-list.png"}]
            })
            .to_string(),
        )],
        polls.clone(),
    );
    let base = spawn_stub(router).await;

    let url = engine(&base, 60).generate(&request(), PATH).await.unwrap();
    assert_eq!(url, "http://x/from-list.png");
}

#[tokio::test]
async fn test_submit_sends_byte_exact_multipart_with_content_length() {
    let captured: Arc<Mutex<Option<(HeaderMap, Bytes)>>> = Arc::new(Mutex::new(None));
    let captured_submit = captured.clone();
    let router = Router::new()
        .route(
            PATH,
            post(move |headers: HeaderMap, body: Bytes| {
                let captured = captured_submit.clone();
                async move {
                    *captured.lock().unwrap() = Some((headers, body));
                    Json(json!({"id": "task-1"}))
                }
            }),
        )
        .route(
            &format!("{}/:id", PATH),
            get(|| async {
                Json(json!({"status": "completed", "url": "http://x/done.png"}))
            }),
        );
    let base = spawn_stub(router).await;

    let image_bytes = b"raw attachment bytes".to_vec();
    let req = GenerationRequest {
        model: "gemini-3-pro-image-preview-async".to_string(),
        prompt: "edit this".to_string(),
        size: Some("16:9".to_string()),
        images: Some(vec![format!(
            "data:image/png;base64,{}",
            STANDARD.encode(&image_bytes)
        )]),
    };

    engine(&base, 60).generate(&req, PATH).await.unwrap();

    let (headers, body) = captured.lock().unwrap().clone().expect("captured submit");
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .expect("content-type header")
        .to_string();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("boundary parameter");

    let declared_length: usize = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("content-length header");
    assert_eq!(declared_length, body.len());

    let body_str = String::from_utf8_lossy(&body);
    assert!(body_str.contains(&format!("--{}\r\n", boundary)));
    assert!(body_str.contains("name=\"prompt\"\r\n\r\nedit this\r\n"));
    assert!(body_str.contains("name=\"size\"\r\n\r\n16:9\r\n"));
    assert!(body_str.contains("filename=\"image_0.png\""));
    assert!(body_str.ends_with(&format!("--{}--\r\n", boundary)));
    // Raw bytes appear verbatim in the buffer
    assert!(body
        .windows(image_bytes.len())
        .any(|window| window == image_bytes.as_slice()));
}

#[tokio::test]
async fn test_default_size_field_is_16_9() {
    let captured: Arc<Mutex<Option<Bytes>>> = Arc::new(Mutex::new(None));
    let captured_submit = captured.clone();
    let router = Router::new()
        .route(
            PATH,
            post(move |body: Bytes| {
                let captured = captured_submit.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({"id": "task-1"}))
                }
            }),
        )
        .route(
            &format!("{}/:id", PATH),
            get(|| async { Json(json!({"status": "completed", "url": "http://x/d.png"})) }),
        );
    let base = spawn_stub(router).await;

    engine(&base, 60).generate(&request(), PATH).await.unwrap();

    let body = captured.lock().unwrap().clone().expect("captured body");
    let body_str = String::from_utf8_lossy(&body);
    assert!(body_str.contains("name=\"size\"\r\n\r\n16:9\r\n"));
}
