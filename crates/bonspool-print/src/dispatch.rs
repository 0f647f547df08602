// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch orchestration.
//
// The dispatcher is the only writer of job transitions past `approved` and
// of printer health. Each dispatch runs three independent steps (job
// update, printer health, broadcast); there is no transaction spanning
// them. The transition into `printing` is the only guard against two
// dispatches of the same job.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use bonspool_core::SpoolConfig;
use bonspool_core::error::{Result, SpoolError};
use bonspool_core::integrity::verify_payload;
use bonspool_core::types::{
    ConnectionTest, EventType, Job, JobId, NewJob, NewPrinter, Printer, PrinterConnection,
    PrinterId, PrinterStatus, PrinterType, PrinterUpdate,
};

use crate::events::{EventBus, JobSummary};
use crate::forwarder::ChainForwarder;
use crate::jobs::JobStore;
use crate::printers::PrinterRegistry;
use crate::raw_client;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::status_probe::{ProbeSettings, probe_status};

/// Coordinates the job store, printer registry, connector, forwarder and
/// event bus. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    jobs: Arc<JobStore>,
    printers: Arc<PrinterRegistry>,
    events: EventBus,
    forwarder: Arc<ChainForwarder>,
    config: Arc<SpoolConfig>,
}

impl Dispatcher {
    pub fn new(
        jobs: Arc<JobStore>,
        printers: Arc<PrinterRegistry>,
        events: EventBus,
        forwarder: Arc<ChainForwarder>,
        config: Arc<SpoolConfig>,
    ) -> Self {
        Self {
            jobs,
            printers,
            events,
            forwarder,
            config,
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn printers(&self) -> &PrinterRegistry {
        &self.printers
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }

    // -- Job workflow ---------------------------------------------------------

    pub fn submit(&self, request: NewJob) -> Result<Job> {
        let job = self.jobs.create(request)?;
        self.events.broadcast(EventType::JobCreated, &JobSummary::from(&job));
        Ok(job)
    }

    /// Approve a job. With `auto_dispatch` the print runs as a background
    /// task and the approved job is returned immediately.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn approve(&self, id: &JobId, user: &str, auto_dispatch: bool) -> Result<Job> {
        let job = self.jobs.approve(id, user)?;
        self.events.broadcast(EventType::JobApproved, &JobSummary::from(&job));

        if auto_dispatch {
            let dispatcher = self.clone();
            let id = *id;
            tokio::spawn(async move {
                if let Err(e) = dispatcher.print_job(&id).await {
                    warn!(job_id = %id, error = %e, "auto-dispatch failed");
                }
            });
        }
        Ok(job)
    }

    pub fn reject(&self, id: &JobId, reason: &str, user: &str) -> Result<Job> {
        let job = self.jobs.reject(id, reason, user)?;
        self.events.broadcast(EventType::JobRejected, &JobSummary::from(&job));
        Ok(job)
    }

    pub fn delete(&self, id: &JobId) -> Result<Job> {
        let job = self.jobs.delete(id)?;
        self.events.broadcast(EventType::JobDeleted, &JobSummary::from(&job));
        Ok(job)
    }

    /// Sweep finished jobs older than `age_days`.
    pub fn cleanup(&self, age_days: u32) -> Result<usize> {
        let swept = self.jobs.cleanup(age_days)?;
        if swept > 0 {
            self.events.broadcast(
                EventType::JobsCleanup,
                &serde_json::json!({ "count": swept, "age_days": age_days }),
            );
        }
        Ok(swept)
    }

    /// Dispatch a job to its printer and wait for the outcome.
    ///
    /// Missing job or printer, a disabled or undispatchable printer, an
    /// over-deep chain and a payload that no longer matches its digest are
    /// all refused before the job moves. Once the job is `printing`, any
    /// failure marks it `failed`, records it on the printer, broadcasts
    /// `job:failed` and is returned.
    #[instrument(skip(self), fields(job_id = %id))]
    pub async fn print_job(&self, id: &JobId) -> Result<Job> {
        let job = self.jobs.require(id)?;
        let printer_id = job.printer_id.ok_or(SpoolError::NoPrinterSelected)?;
        let printer = self.printers.require(&printer_id)?;

        if !printer.enabled {
            return Err(SpoolError::PrinterDisabled(printer.name));
        }
        if printer.printer_type == PrinterType::Usb {
            return Err(SpoolError::UnsupportedPrinterType(PrinterType::Usb));
        }
        if printer.printer_type == PrinterType::Spool
            && job.chain_depth >= self.config.max_chain_depth
        {
            return Err(SpoolError::ChainDepthExceeded {
                depth: job.chain_depth.saturating_add(1),
                max: self.config.max_chain_depth,
            });
        }
        verify_payload(&job.payload, &job.payload_hash)?;

        let job = self
            .jobs
            .mark_printing(id, Some(&format!("dispatching to {}", printer.name)))?;
        self.events.broadcast(EventType::JobPrinting, &JobSummary::from(&job));

        match &printer.connection {
            PrinterConnection::Physical { host, port } => {
                self.print_physical(&job, &printer, host, *port).await
            }
            PrinterConnection::Spool { url, printer_id } => {
                self.forward_to_spool(&job, &printer, url, printer_id.as_deref())
                    .await
            }
            PrinterConnection::Usb { .. } => Err(self.settle_failure(
                &job,
                &printer,
                SpoolError::UnsupportedPrinterType(PrinterType::Usb),
            )),
        }
    }

    async fn print_physical(
        &self,
        job: &Job,
        printer: &Printer,
        host: &str,
        port: u32,
    ) -> Result<Job> {
        let port = match u16::try_from(port) {
            Ok(port) => port,
            Err(_) => {
                let e =
                    SpoolError::InvalidConfiguration(format!("port {port} is outside 1-65535"));
                return Err(self.settle_failure(job, printer, e));
            }
        };

        let policy = RetryPolicy::for_printer(printer, &self.config);
        let mut attempt = 0;
        let outcome = loop {
            match raw_client::deliver(host, port, &job.payload, printer.timeout()).await {
                Ok(delivery) => break Ok(delivery),
                Err(e) => match policy.decide_delivery(e.code, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            job_id = %job.id,
                            attempt,
                            code = %e.code,
                            "delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp | RetryDecision::Exhausted => break Err(e),
                },
            }
        };

        match outcome {
            Ok(delivery) => {
                let notes = format!(
                    "printed {} bytes on {}",
                    delivery.bytes_written, printer.name
                );
                self.settle_success(job, printer, &notes)
            }
            Err(e) => Err(self.settle_failure(job, printer, e.into())),
        }
    }

    async fn forward_to_spool(
        &self,
        job: &Job,
        printer: &Printer,
        url: &str,
        upstream_printer: Option<&str>,
    ) -> Result<Job> {
        match self.forwarder.forward(job, url, upstream_printer).await {
            Ok(receipt) => {
                let mut notes = format!(
                    "forwarded to {} at chain depth {}",
                    receipt.target, receipt.chain_depth
                );
                if let Some(upstream_id) = receipt.upstream_job_id {
                    notes.push_str(&format!(" as job {upstream_id}"));
                }
                self.settle_success(job, printer, &notes)
            }
            Err(e) => Err(self.settle_failure(job, printer, e)),
        }
    }

    fn settle_success(&self, job: &Job, printer: &Printer, notes: &str) -> Result<Job> {
        let done = match self.jobs.mark_completed(&job.id, Some(notes)) {
            Ok(done) => done,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "cannot mark job completed");
                return Err(e);
            }
        };
        if let Err(e) = self.printers.record_success(&printer.id) {
            error!(printer_id = %printer.id, error = %e, "cannot record printer success");
        }
        self.events.broadcast(EventType::JobCompleted, &JobSummary::from(&done));
        info!(job_id = %job.id, printer = %printer.name, "job completed");
        Ok(done)
    }

    /// Record a failed dispatch everywhere it belongs and hand the error
    /// back for the caller.
    fn settle_failure(&self, job: &Job, printer: &Printer, err: SpoolError) -> SpoolError {
        let message = err.to_string();
        match self.jobs.mark_failed(&job.id, Some(&message)) {
            Ok(failed) => {
                self.events.broadcast(EventType::JobFailed, &JobSummary::from(&failed));
            }
            Err(e) => error!(job_id = %job.id, error = %e, "cannot mark job failed"),
        }
        if let Err(e) = self.printers.record_failure(&printer.id, &message) {
            error!(printer_id = %printer.id, error = %e, "cannot record printer failure");
        }
        warn!(job_id = %job.id, printer = %printer.name, error = %message, "job failed");
        err
    }

    // -- Printers -------------------------------------------------------------

    pub fn register_printer(&self, request: NewPrinter) -> Result<Printer> {
        let printer = self.printers.register(request)?;
        self.events.broadcast(EventType::PrinterRegistered, &printer);
        Ok(printer)
    }

    pub fn update_printer(&self, id: &PrinterId, update: PrinterUpdate) -> Result<Printer> {
        let printer = self.printers.update(id, update)?;
        self.events.broadcast(EventType::PrinterUpdated, &printer);
        Ok(printer)
    }

    pub fn delete_printer(&self, id: &PrinterId) -> Result<Printer> {
        let printer = self.printers.delete(id)?;
        self.events.broadcast(EventType::PrinterDeleted, &printer);
        Ok(printer)
    }

    /// Check that a printer is reachable without touching any job or the
    /// printer's health record.
    #[instrument(skip(self), fields(printer_id = %id))]
    pub async fn test_connection(&self, id: &PrinterId) -> Result<ConnectionTest> {
        let printer = self.printers.require(id)?;
        let started = Instant::now();
        match &printer.connection {
            PrinterConnection::Physical { host, port } => {
                let port = u16::try_from(*port).map_err(|_| {
                    SpoolError::InvalidConfiguration(format!("port {port} is outside 1-65535"))
                })?;
                raw_client::deliver(host, port, &[], printer.timeout()).await?;
            }
            PrinterConnection::Spool { url, .. } => {
                self.forwarder.check_health(url, printer.timeout()).await?;
            }
            PrinterConnection::Usb { .. } => {
                return Err(SpoolError::UnsupportedPrinterType(PrinterType::Usb));
            }
        }
        let test = ConnectionTest {
            printer_id: printer.id,
            target: printer.connection.target(),
            reachable: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(target_addr = %test.target, elapsed_ms = test.elapsed_ms, "printer reachable");
        Ok(test)
    }

    /// Query a physical printer's real-time status.
    pub async fn probe_printer(&self, id: &PrinterId) -> Result<PrinterStatus> {
        let printer = self.printers.require(id)?;
        match &printer.connection {
            PrinterConnection::Physical { host, port } => {
                let port = u16::try_from(*port).map_err(|_| {
                    SpoolError::InvalidConfiguration(format!("port {port} is outside 1-65535"))
                })?;
                probe_status(host, port, ProbeSettings::from_config(&self.config)).await
            }
            _ => Err(SpoolError::UnsupportedPrinterType(printer.printer_type)),
        }
    }
}
