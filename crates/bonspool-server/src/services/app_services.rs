// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service context: opens the stores, builds the event bus and forwarder, and
// hands out one dispatcher shared by every request handler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use bonspool_core::SpoolConfig;
use bonspool_core::error::Result;
use bonspool_print::{ChainForwarder, Dispatcher, EventBus, JobStore, PrinterRegistry};

use super::retention;

const JOBS_DB: &str = "jobs.db";
const PRINTERS_DB: &str = "printers.db";

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct SpoolServices {
    dispatcher: Dispatcher,
    data_dir: Option<PathBuf>,
}

impl SpoolServices {
    /// Open the file-backed stores under `dir`.
    pub fn init(dir: &Path, config: SpoolConfig) -> Result<Self> {
        info!(
            path = %dir.display(),
            service_id = %config.service_id,
            "initialising spool services"
        );
        let jobs = JobStore::open(dir.join(JOBS_DB))?;
        let printers = PrinterRegistry::open(dir.join(PRINTERS_DB))?;
        let mut services = Self::assemble(jobs, printers, config)?;
        services.data_dir = Some(dir.to_path_buf());
        Ok(services)
    }

    /// Services backed by in-memory databases.
    pub fn in_memory(config: SpoolConfig) -> Result<Self> {
        let jobs = JobStore::open_in_memory()?;
        let printers = PrinterRegistry::open_in_memory()?;
        Self::assemble(jobs, printers, config)
    }

    fn assemble(jobs: JobStore, printers: PrinterRegistry, config: SpoolConfig) -> Result<Self> {
        config.validate()?;
        let printers = printers.with_default_timeout(config.default_printer_timeout_ms);
        let forwarder = ChainForwarder::from_config(&config)?;
        let events = EventBus::new(config.event_channel_capacity);
        let dispatcher = Dispatcher::new(
            Arc::new(jobs),
            Arc::new(printers),
            events,
            Arc::new(forwarder),
            Arc::new(config),
        );
        Ok(Self {
            dispatcher,
            data_dir: None,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &SpoolConfig {
        self.dispatcher.config()
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Start the periodic retention sweep when `retention_days` is set.
    pub fn spawn_retention_sweep(&self) -> Option<JoinHandle<()>> {
        let config = self.config();
        let days = config.retention_days?;
        Some(retention::spawn_sweep(
            self.dispatcher.clone(),
            days,
            config.cleanup_interval(),
        ))
    }
}

/// Read `config.json` from `dir`, then apply environment overrides. An
/// unreadable file falls back to defaults.
pub fn load_config(dir: &Path) -> SpoolConfig {
    let mut config = match SpoolConfig::load(dir) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            SpoolConfig::default()
        }
    };
    config.apply_env_overrides();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonspool_core::types::{NewJob, NewPrinter, PrinterConnection};

    #[test]
    fn file_backed_services_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let job_id;
        {
            let services = SpoolServices::init(dir.path(), SpoolConfig::default()).unwrap();
            let d = services.dispatcher();
            d.register_printer(NewPrinter::new(
                "kitchen",
                PrinterConnection::physical("10.0.0.5", 9100),
            ))
            .unwrap();
            job_id = d.submit(NewJob::new(b"persist".to_vec())).unwrap().id;
            assert_eq!(services.data_dir(), Some(dir.path()));
        }

        let services = SpoolServices::init(dir.path(), SpoolConfig::default()).unwrap();
        let d = services.dispatcher();
        assert!(d.jobs().get(&job_id).unwrap().is_some());
        assert!(d.printers().get_by_name("kitchen").unwrap().is_some());
    }

    #[test]
    fn registry_uses_configured_default_timeout() {
        let config = SpoolConfig {
            default_printer_timeout_ms: 1_234,
            ..SpoolConfig::default()
        };
        let services = SpoolServices::in_memory(config).unwrap();
        let printer = services
            .dispatcher()
            .register_printer(NewPrinter::new(
                "bar",
                PrinterConnection::physical("10.0.0.6", 9100),
            ))
            .unwrap();
        assert_eq!(printer.timeout_ms, 1_234);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = SpoolConfig {
            service_id: " ".into(),
            ..SpoolConfig::default()
        };
        assert!(SpoolServices::in_memory(config).is_err());
    }

    #[test]
    fn malformed_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let config = load_config(dir.path());
        assert_eq!(config.max_chain_depth, SpoolConfig::default().max_chain_depth);
    }
}
