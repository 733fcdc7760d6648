// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::SESSION_HEADER;
use crate::app::Wishbox;
use crate::mcp::WidgetUrls;
use crate::model::SessionId;
use crate::store::WishStore;

fn test_app() -> Wishbox {
    Wishbox::new(
        Arc::new(WishStore::in_memory()),
        WidgetUrls::new("http://localhost:4444"),
        Duration::from_secs(3600),
    )
}

struct Reply {
    status: StatusCode,
    session: Option<String>,
    body: Value,
}

/// The last JSON-RPC message carried by an SSE body. Priming events have empty data.
fn last_event(text: &str) -> Value {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .last()
        .map_or(Value::Null, |data| serde_json::from_str(data).expect("json event"))
}

async fn send(
    router: &Router,
    method: Method,
    session: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let body = body.map(|body| body.to_string());
    send_raw(router, method, session, body).await
}

async fn send_raw(
    router: &Router,
    method: Method,
    session: Option<&str>,
    body: Option<String>,
) -> Reply {
    let mut request = Request::builder()
        .method(method)
        .uri("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(session) = session {
        request = request.header(SESSION_HEADER, session);
    }
    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(body)
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("router is infallible");
    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|value| value.to_str().expect("ascii header").to_owned());
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8_lossy(&bytes);
    let body = if text.is_empty() {
        Value::Null
    } else if content_type.starts_with("text/event-stream") {
        last_event(&text)
    } else if content_type.starts_with("application/json") {
        serde_json::from_str(&text).expect("json body")
    } else {
        Value::String(text.into_owned())
    };
    Reply {
        status,
        session,
        body,
    }
}

fn initialize_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "wishbox-tests", "version": "0.0.0" }
        }
    })
}

fn list_tools(id: u64) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": "tools/list" })
}

fn call_tool(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// Runs the initialize handshake and returns the new session id.
async fn open_session(router: &Router) -> String {
    let reply = send(router, Method::POST, None, Some(initialize_request())).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], 1);
    let session = reply.session.expect("session header on creation");

    let ack = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let reply = send(router, Method::POST, Some(&session), Some(ack)).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.session, None);
    session
}

#[tokio::test]
async fn initialize_creates_session_and_tools_run_in_it() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;
    assert_eq!(app.sessions().len(), 1);

    let reply = send(
        &router,
        Method::POST,
        Some(&session),
        Some(call_tool(2, "make_wish", json!({ "message": "Warm mittens", "category": "toy" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], 2);
    assert_eq!(reply.body["result"]["structuredContent"]["wish"], "Warm mittens");
    assert_eq!(reply.body["result"]["content"][1]["resource"]["uri"], "ui://make_wish");

    let id = SessionId::new(session.as_str()).expect("session id");
    assert_eq!(app.store().count(&id), 1);
}

#[tokio::test]
async fn initialize_with_existing_header_starts_a_new_session() {
    let app = test_app();
    let router = app.router();
    let first = open_session(&router).await;

    let reply = send(&router, Method::POST, Some(&first), Some(initialize_request())).await;
    assert_eq!(reply.status, StatusCode::OK);
    let second = reply.session.expect("new session header");
    assert_ne!(first, second);
    assert_eq!(app.sessions().len(), 2);
}

#[tokio::test]
async fn batches_are_rejected_and_the_session_stays_usable() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;

    let batch = json!([
        call_tool(3, "make_wish", json!({ "message": "Snow" })),
        call_tool(4, "view_wishes", json!({})),
    ]);
    let reply = send(&router, Method::POST, Some(&session), Some(batch)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body["error"]["message"],
        "Invalid JSON-RPC message: batches are not supported"
    );

    let reply = send(&router, Method::POST, Some(&session), Some(list_tools(5))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], 5);
    let id = SessionId::new(session.as_str()).expect("session id");
    assert_eq!(app.store().count(&id), 0);
}

#[tokio::test]
async fn non_object_params_are_rejected_without_harming_the_session() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;

    for params in [json!("oops"), json!(42), json!(["Snow"])] {
        let bad = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": params });
        let reply = send(&router, Method::POST, Some(&session), Some(bad)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            reply.body["error"]["message"],
            "Invalid JSON-RPC message: params must be an object"
        );
    }

    let reply = send(&router, Method::POST, Some(&session), Some(list_tools(3))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], 3);
    assert_eq!(reply.body["result"]["tools"].as_array().expect("tools").len(), 4);
    assert!(app.sessions().contains(&SessionId::new(session.as_str()).expect("session id")));
}

#[tokio::test]
async fn request_ids_must_be_strings_or_integers() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;

    for id in [json!(1.5), json!({ "x": 1 }), json!(true)] {
        let bad = json!({ "jsonrpc": "2.0", "id": id, "method": "tools/list" });
        let reply = send(&router, Method::POST, Some(&session), Some(bad)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            reply.body["error"]["message"],
            "Invalid JSON-RPC message: id must be a string or an integer"
        );
    }

    let string_id = json!({ "jsonrpc": "2.0", "id": "list-1", "method": "tools/list" });
    let reply = send(&router, Method::POST, Some(&session), Some(string_id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], "list-1");
}

#[tokio::test]
async fn garbage_on_an_open_session_leaves_it_working() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;

    for body in ["{not json", "\"tools/list\"", r#"{"id":7,"method":"tools/list"}"#] {
        let reply = send_raw(&router, Method::POST, Some(&session), Some(body.to_owned())).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{body}");
    }

    let reply = send(
        &router,
        Method::POST,
        Some(&session),
        Some(call_tool(8, "make_wish", json!({ "message": "Cocoa" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["result"]["structuredContent"]["wish"], "Cocoa");
}

#[tokio::test]
async fn stopped_session_service_closes_the_session_and_its_wishes() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;
    send(
        &router,
        Method::POST,
        Some(&session),
        Some(call_tool(2, "make_wish", json!({ "message": "Sled" }))),
    )
    .await;
    let id = SessionId::new(session.as_str()).expect("session id");
    assert_eq!(app.store().count(&id), 1);

    app.sessions().stop_service(&id).await;
    let reply = send(&router, Method::POST, Some(&session), Some(list_tools(3))).await;
    assert!(
        reply.status == StatusCode::INTERNAL_SERVER_ERROR || reply.status == StatusCode::NOT_FOUND,
        "unexpected status {}",
        reply.status
    );
    assert!(!app.sessions().contains(&id));
    assert_eq!(app.store().count(&id), 0);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app();
    let router = app.router();

    let reply = send(
        &router,
        Method::POST,
        Some("no-such-session"),
        Some(call_tool(2, "view_wishes", json!({}))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"]["message"], "Session not found");

    for method in [Method::GET, Method::DELETE] {
        let reply = send(&router, method, Some("no-such-session"), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["error"]["message"], "Session not found");
    }
    assert!(app.sessions().is_empty());
}

#[tokio::test]
async fn poll_and_close_require_session_header() {
    let router = test_app().router();
    for method in [Method::GET, Method::DELETE] {
        let reply = send(&router, method, None, None).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"]["message"], "Missing mcp-session-id header");
    }
}

#[tokio::test]
async fn poll_opens_an_event_stream() {
    let router = test_app().router();
    let session = open_session(&router).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/mcp")
        .header(header::ACCEPT, "text/event-stream")
        .header(SESSION_HEADER, session.as_str())
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).expect("content type");
    assert_eq!(content_type, "text/event-stream");
}

#[tokio::test]
async fn close_drops_session_and_its_wishes() {
    let app = test_app();
    let router = app.router();
    let session = open_session(&router).await;
    send(
        &router,
        Method::POST,
        Some(&session),
        Some(call_tool(2, "make_wish", json!({ "message": "Sled" }))),
    )
    .await;
    let id = SessionId::new(session.as_str()).expect("session id");
    assert_eq!(app.store().count(&id), 1);

    let reply = send(&router, Method::DELETE, Some(&session), None).await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(app.store().count(&id), 0);
    assert!(app.sessions().is_empty());

    let reply = send(&router, Method::DELETE, Some(&session), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = send(
        &router,
        Method::POST,
        Some(&session),
        Some(call_tool(3, "view_wishes", json!({}))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn first_message_must_initialize() {
    let app = test_app();
    let router = app.router();

    let reply = send(&router, Method::POST, None, Some(list_tools(1))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["message"], "Session must start with an initialize request");
    assert!(app.sessions().is_empty());
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = test_app();
    let router = app.router();

    for body in [json!({ "id": 1, "method": "initialize" }), json!([]), json!("initialize")] {
        let reply = send(&router, Method::POST, None, Some(body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body["error"]["message"]
            .as_str()
            .expect("message")
            .starts_with("Invalid JSON-RPC message"));
    }

    let reply = send_raw(&router, Method::POST, None, Some("{not json".to_owned())).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(app.sessions().is_empty());
}

#[tokio::test]
async fn health_reports_live_sessions() {
    let app = test_app();
    let router = app.router();
    open_session(&router).await;

    let request = Request::builder().uri("/health").body(Body::empty()).expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 1);
    assert!(body["timestamp"].is_string());
}
