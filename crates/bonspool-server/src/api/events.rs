// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WebSocket event feed.
//
// Each connection subscribes before the upgrade completes, receives a
// `connected` envelope, then every bus event in order. A client message
// `{"event":"ping"}` is answered with `pong` on that connection only.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use bonspool_core::types::EventType;
use bonspool_print::EventEnvelope;

use crate::SpoolServices;

pub async fn event_feed(ws: WebSocketUpgrade, State(services): State<SpoolServices>) -> Response {
    let events = services.dispatcher().events().subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<EventEnvelope>) {
    let (mut sink, mut incoming) = socket.split();
    if send(&mut sink, &EventEnvelope::connected()).await.is_err() {
        return;
    }
    debug!("event subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(envelope) => {
                    if send(&mut sink, &envelope).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if is_ping(text.as_str()) {
                        let pong = EventEnvelope::new(EventType::Pong, serde_json::Value::Null);
                        if send(&mut sink, &pong).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("event subscriber disconnected");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    envelope: &EventEnvelope,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(envelope).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

fn is_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(|e| e == "ping"))
        .unwrap_or(false)
}
