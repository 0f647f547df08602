// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// REST and WebSocket surface.

pub mod error;
pub mod events;
pub mod jobs;
pub mod printers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::router;
