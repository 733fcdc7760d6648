// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP surface: `/mcp` for the protocol and `/health` for liveness probes.
//!
//! | Method | Path      | Meaning                                                  |
//! |--------|-----------|----------------------------------------------------------|
//! | POST   | `/mcp`    | open or continue a session; body is one JSON-RPC message |
//! | GET    | `/mcp`    | SSE stream of server-initiated messages for the session  |
//! | DELETE | `/mcp`    | close the session and drop its wishes                    |
//! | GET    | `/health` | status, timestamp and live session count                 |
//!
//! The protocol itself is rmcp's streamable-HTTP service. A guard layer in front of it
//! answers malformed messages and unknown sessions with `{error:{message}}` before they
//! reach a session.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rmcp::model::{ClientJsonRpcMessage, ClientRequest};
use rmcp::transport::StreamableHttpService;
use serde_json::Value;

use crate::app::Wishbox;
use crate::model::SessionId;

pub use crate::session::SESSION_HEADER;

/// Upper bound for a single POST body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub fn router(app: Wishbox) -> Router {
    let mcp_service = {
        let handler = app.handler().clone();
        StreamableHttpService::new(
            move || Ok(handler.clone()),
            app.session_manager(),
            app.http_config().clone(),
        )
    };
    let mcp = Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(middleware::from_fn_with_state(app.clone(), guard_sessions));

    Router::new()
        .route("/health", get(health))
        .with_state(app)
        .merge(mcp)
        .layer(middleware::from_fn(log_requests))
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Missing {SESSION_HEADER} header")]
    MissingSessionId,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Invalid JSON-RPC message: {0}")]
    InvalidMessage(String),
    #[error("Session must start with an initialize request")]
    NotInitialized,
}

impl RouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSessionId | Self::InvalidMessage(_) | Self::NotInitialized => {
                StatusCode::BAD_REQUEST
            }
            Self::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": { "message": self.to_string() } });
        (self.status_code(), Json(body)).into_response()
    }
}

/// The header value, if any. A value that cannot be a session id names no live session.
fn session_header(headers: &HeaderMap) -> Result<Option<SessionId>, RouteError> {
    let Some(raw) = headers.get(SESSION_HEADER) else {
        return Ok(None);
    };
    let id = raw
        .to_str()
        .ok()
        .and_then(|raw| SessionId::new(raw.trim()).ok())
        .ok_or(RouteError::SessionNotFound)?;
    Ok(Some(id))
}

/// The session named by the header; `None` when there is no header at all.
fn live_session(app: &Wishbox, headers: &HeaderMap) -> Result<Option<SessionId>, RouteError> {
    match session_header(headers)? {
        Some(id) if app.sessions().contains(&id) => Ok(Some(id)),
        Some(_) => Err(RouteError::SessionNotFound),
        None => Ok(None),
    }
}

fn invalid(reason: impl Into<String>) -> RouteError {
    RouteError::InvalidMessage(reason.into())
}

/// Checks one POST body against the JSON-RPC 2.0 envelope and rmcp's client message types.
pub(crate) fn parse_message(body: &[u8]) -> Result<ClientJsonRpcMessage, RouteError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| invalid(format!("body is not JSON: {err}")))?;
    let fields = match &value {
        Value::Object(fields) => fields,
        Value::Array(_) => return Err(invalid("batches are not supported")),
        _ => return Err(invalid("expected a JSON object")),
    };
    if fields.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(invalid("jsonrpc must be \"2.0\""));
    }
    // An id that is neither a string nor an integer would otherwise pass as a notification.
    if let Some(id) = fields.get("id") {
        if !(id.is_string() || id.is_i64()) {
            return Err(invalid("id must be a string or an integer"));
        }
    }
    if let Some(params) = fields.get("params") {
        if !(params.is_object() || params.is_null()) {
            return Err(invalid("params must be an object"));
        }
    }
    serde_json::from_value(value).map_err(|err| invalid(err.to_string()))
}

fn is_initialize(message: &ClientJsonRpcMessage) -> bool {
    matches!(
        message,
        ClientJsonRpcMessage::Request(request)
            if matches!(request.request, ClientRequest::InitializeRequest(_))
    )
}

/// Rejects what the protocol service must never see and closes a session whose service
/// failed while handling the request.
async fn guard_sessions(
    State(app): State<Wishbox>,
    request: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let (mut parts, body) = request.into_parts();
    let (request, target) = match parts.method {
        Method::POST => {
            let bytes: Bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|err| invalid(format!("unreadable body: {err}")))?;
            let message = parse_message(&bytes)?;
            let target = if is_initialize(&message) {
                // Handshakes always start a fresh session.
                parts.headers.remove(SESSION_HEADER);
                None
            } else {
                Some(live_session(&app, &parts.headers)?.ok_or(RouteError::NotInitialized)?)
            };
            (Request::from_parts(parts, Body::from(bytes)), target)
        }
        Method::GET | Method::DELETE => {
            let id = live_session(&app, &parts.headers)?.ok_or(RouteError::MissingSessionId)?;
            (Request::from_parts(parts, body), Some(id))
        }
        _ => (Request::from_parts(parts, body), None),
    };

    let response = next.run(request).await;
    if response.status().is_server_error() {
        if let Some(id) = &target {
            tracing::warn!(
                session_id = %id,
                status = response.status().as_u16(),
                "session service failed, closing session"
            );
            app.close_session(id).await;
        }
    }
    Ok(response)
}

async fn health(State(app): State<Wishbox>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "sessions": app.sessions().len(),
    }))
}

async fn log_requests(request: Request, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

#[cfg(test)]
mod tests;
