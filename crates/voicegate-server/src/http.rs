//! HTTP endpoints
//!
//! The carrier webhook surface plus operational endpoints. The
//! incoming-call webhook answers with stream-connect instructions pointing
//! the carrier at our media WebSocket, carrying the call SID and caller
//! number as stream parameters.

use axum::{
    extract::{Form, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/incoming-call", post(incoming_call))
        .route("/call-status", post(call_status))
        .route("/health", get(health))
        .route("/media-stream", get(media_stream))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Carrier webhook payload for a new inbound call
#[derive(Debug, Deserialize)]
struct IncomingCall {
    #[serde(rename = "CallSid", default)]
    call_sid: String,
    #[serde(rename = "From", default)]
    caller: String,
}

/// Answer an inbound call with stream-connect instructions
async fn incoming_call(headers: HeaderMap, Form(call): Form<IncomingCall>) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    tracing::info!(call_sid = %call.call_sid, "Incoming call");

    let twiml = render_stream_twiml(host, &call.call_sid, &call.caller);
    ([(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}

/// Build the connect/stream answer document
fn render_stream_twiml(host: &str, call_sid: &str, caller: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="wss://{host}/media-stream">
      <Parameter name="callSid" value="{call_sid}" />
      <Parameter name="callerPhone" value="{caller}" />
    </Stream>
  </Connect>
</Response>"#,
        host = xml_escape(host),
        call_sid = xml_escape(call_sid),
        caller = xml_escape(caller),
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Carrier status callback payload
#[derive(Debug, Deserialize)]
struct CallStatus {
    #[serde(rename = "CallSid", default)]
    call_sid: String,
    #[serde(rename = "CallStatus", default)]
    status: String,
}

/// Carrier call lifecycle callback, logged for operational visibility
async fn call_status(Form(update): Form<CallStatus>) -> StatusCode {
    tracing::info!(call_sid = %update.call_sid, status = %update.status, "Call status update");
    StatusCode::OK
}

/// Liveness plus a view of active calls
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "active_calls": state.registry.count(),
        "streams": state.registry.stream_sids(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Carrier media stream WebSocket upgrade
async fn media_stream(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| ws::handle_media_stream(state, socket))
}
