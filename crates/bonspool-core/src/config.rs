// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SpoolError};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent spool settings.
///
/// Every field has a default, so a partial `config.json` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// Name this instance stamps on jobs it forwards upstream.
    pub service_id: String,
    /// Address the HTTP surface binds to.
    pub listen_addr: String,
    /// Timeout for printers registered without one.
    pub default_printer_timeout_ms: u64,
    /// Overall deadline for a status probe.
    pub probe_timeout_ms: u64,
    /// Deadline for each individual status query.
    pub probe_query_timeout_ms: u64,
    /// Pause between status queries.
    pub probe_inter_query_delay_ms: u64,
    /// Deadline for one upstream forwarding request.
    pub forward_timeout_ms: u64,
    /// Jobs arriving deeper than this are refused at dispatch.
    pub max_chain_depth: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Buffer per event subscriber; slow subscribers skip older events.
    pub event_channel_capacity: usize,
    /// Finished jobs older than this are swept. `None` disables the sweep.
    pub retention_days: Option<u32>,
    pub cleanup_interval_secs: u64,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            service_id: "bonspool".into(),
            listen_addr: "127.0.0.1:8631".into(),
            default_printer_timeout_ms: 5_000,
            probe_timeout_ms: 5_000,
            probe_query_timeout_ms: 1_000,
            probe_inter_query_delay_ms: 50,
            forward_timeout_ms: 10_000,
            max_chain_depth: 8,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            event_channel_capacity: 256,
            retention_days: Some(30),
            cleanup_interval_secs: 3_600,
        }
    }
}

impl SpoolConfig {
    /// Read `config.json` from `dir`, falling back to defaults when the file
    /// is missing. A file that exists but cannot be parsed is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `dir/config.json`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Apply `BONSPOOL_LISTEN_ADDR` and `BONSPOOL_SERVICE_ID` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("BONSPOOL_LISTEN_ADDR").filter(|v| !v.trim().is_empty()) {
            self.listen_addr = addr;
        }
        if let Some(id) = lookup("BONSPOOL_SERVICE_ID").filter(|v| !v.trim().is_empty()) {
            self.service_id = id;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() {
            return Err(SpoolError::Validation("service_id must not be empty".into()));
        }
        if self.default_printer_timeout_ms == 0 {
            return Err(SpoolError::Validation(
                "default_printer_timeout_ms must be positive".into(),
            ));
        }
        if self.probe_timeout_ms == 0 || self.probe_query_timeout_ms == 0 {
            return Err(SpoolError::Validation("probe timeouts must be positive".into()));
        }
        if self.forward_timeout_ms == 0 {
            return Err(SpoolError::Validation(
                "forward_timeout_ms must be positive".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(SpoolError::Validation(
                "event_channel_capacity must be positive".into(),
            ));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            warn!(
                base = self.retry_base_delay_ms,
                max = self.retry_max_delay_ms,
                "retry_max_delay_ms is below retry_base_delay_ms; delays will be capped at the max"
            );
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_query_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_query_timeout_ms)
    }

    pub fn probe_inter_query_delay(&self) -> Duration {
        Duration::from_millis(self.probe_inter_query_delay_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}
