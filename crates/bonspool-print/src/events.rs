// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process event bus for job and printer lifecycle notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use bonspool_core::types::{EventType, Job, JobId, JobStatus, PrinterId};

/// Job fields carried by job events. The payload stays out of the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub printer_id: Option<PrinterId>,
    pub user: String,
    pub notes: Option<String>,
    pub trace_id: String,
    pub chain_depth: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            printer_id: job.printer_id,
            user: job.user.clone(),
            notes: job.notes.clone(),
            trace_id: job.trace_id.clone(),
            chain_depth: job.chain_depth,
            updated_at: job.updated_at,
        }
    }
}

/// The envelope every subscriber receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: EventType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: EventType, data: serde_json::Value) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Sent to a subscriber once, when it connects.
    pub fn connected() -> Self {
        Self::new(
            EventType::Connected,
            serde_json::json!({ "message": "subscribed to spool events" }),
        )
    }
}

/// Fan-out of events to whoever is subscribed right now.
///
/// Nothing is stored: a subscriber sees only events sent after it
/// subscribed, in send order. A subscriber that falls more than the channel
/// capacity behind skips the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send an event to every current subscriber. Returns how many received
    /// it; zero subscribers is not an error.
    pub fn broadcast<T: Serialize>(&self, event: EventType, data: &T) -> usize {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(event = %event, error = %e, "event payload not serializable");
                serde_json::Value::Null
            }
        };
        let receivers = self.sender.send(EventEnvelope::new(event, data)).unwrap_or(0);
        trace!(event = %event, receivers, "event broadcast");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
