// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonspool Print: persistent job store and printer registry, raw TCP
// delivery to receipt printers, ESC/POS status probing, chain forwarding to
// upstream spools, and the dispatcher that ties them together.

mod db;

pub mod dispatch;
pub mod events;
pub mod forwarder;
pub mod jobs;
pub mod printers;
pub mod raw_client;
pub mod retry;
pub mod status_probe;

pub use dispatch::Dispatcher;
pub use events::{EventBus, EventEnvelope, JobSummary};
pub use forwarder::{ChainForwarder, ForwardReceipt};
pub use jobs::JobStore;
pub use printers::PrinterRegistry;
pub use retry::RetryPolicy;
pub use status_probe::ProbeSettings;
