// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonspool Server: the REST and WebSocket surface over the spool, the
// service context that wires the stores to the dispatcher, and the periodic
// retention sweep.

pub mod api;
pub mod services;

pub use api::router;
pub use services::app_services::SpoolServices;
