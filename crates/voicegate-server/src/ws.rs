//! Media stream WebSocket handling
//!
//! Splits the carrier socket into a reader feeding parsed events to the
//! orchestrator and a writer serializing outbound messages, so slow
//! delivery never blocks inbound audio.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use voicegate_transport::{CarrierMessage, OutboundMessage};

use crate::state::AppState;

pub async fn handle_media_stream(state: AppState, socket: WebSocket) {
    tracing::info!("Media stream connected");
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Unserializable outbound message");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let (inbound_tx, inbound_rx) = mpsc::channel::<CarrierMessage>(256);
    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<CarrierMessage>(&text) {
                    Ok(event) => {
                        if inbound_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Unrecognized carrier message");
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    if let Err(e) = state.orchestrator.run_call(inbound_rx, outbound_tx).await {
        tracing::error!(error = %e, "Call setup failed");
    }

    // run_call returning drops its channel ends; both tasks unwind from
    // the resulting send/recv errors.
    let _ = writer.await;
    reader.abort();
    tracing::info!("Media stream closed");
}
