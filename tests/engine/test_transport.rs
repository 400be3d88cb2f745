// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transport executor behavior against stub upstreams

use axum::{http::StatusCode, routing::get, Json, Router};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

use crate::support::spawn_stub;
use zai_proxy_node::upstream::{RequestBody, Transport, UpstreamError};

fn transport() -> Transport {
    Transport::new(Duration::from_secs(5))
}

#[tokio::test]
async fn test_parses_json_success_body() {
    let router = Router::new().route("/ok", get(|| async { Json(json!({"hello": "world"})) }));
    let base = spawn_stub(router).await;

    let value = transport()
        .send(Method::GET, &format!("{}/ok", base), &[], RequestBody::Empty)
        .await
        .expect("success response");
    assert_eq!(value["hello"], "world");
}

#[tokio::test]
async fn test_non_json_body_yields_typed_error_with_excerpt() {
    let long_body = "x".repeat(500);
    let router = Router::new().route(
        "/text",
        get(move || async move { long_body.clone() }),
    );
    let base = spawn_stub(router).await;

    let err = transport()
        .send(Method::GET, &format!("{}/text", base), &[], RequestBody::Empty)
        .await
        .unwrap_err();
    match err {
        UpstreamError::NonJsonBody { excerpt } => {
            assert_eq!(excerpt.len(), 200);
            assert!(excerpt.chars().all(|c| c == 'x'));
        }
        other => panic!("expected NonJsonBody, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_2xx_with_json_body_yields_rejected() {
    let router = Router::new().route(
        "/bad",
        get(|| async { (StatusCode::BAD_GATEWAY, Json(json!({"error": "upstream sad"}))) }),
    );
    let base = spawn_stub(router).await;

    let err = transport()
        .send(Method::GET, &format!("{}/bad", base), &[], RequestBody::Empty)
        .await
        .unwrap_err();
    match err {
        UpstreamError::Rejected { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("upstream sad"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_network_failure_yields_transport_error() {
    // Nothing listens here
    let err = transport()
        .send(
            Method::GET,
            "http://127.0.0.1:59999/nothing",
            &[],
            RequestBody::Empty,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
}

#[tokio::test]
async fn test_custom_headers_are_forwarded() {
    let router = Router::new().route(
        "/echo-auth",
        get(|headers: axum::http::HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            Json(json!({ "auth": auth }))
        }),
    );
    let base = spawn_stub(router).await;

    let value: Value = transport()
        .send(
            Method::GET,
            &format!("{}/echo-auth", base),
            &[("Authorization".to_string(), "Bearer sk-123".to_string())],
            RequestBody::Empty,
        )
        .await
        .expect("success");
    assert_eq!(value["auth"], "Bearer sk-123");
}
