// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bonspool receipt spool.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SpoolError};
use crate::integrity::payload_digest;

/// Actor recorded on transitions performed by the spool itself.
pub const SYSTEM_ACTOR: &str = "system";

/// User recorded when a submitter does not identify themselves.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Default and maximum page sizes for job listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

/// Upper bound for any per-printer network timeout.
pub const MAX_TIMEOUT_MS: u64 = 300_000;

/// Upper bound for per-printer retry attempts.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| SpoolError::Validation(format!("invalid job id {s:?}: {e}")))
    }
}

/// Unique identifier for a registered printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterId(pub Uuid);

impl PrinterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrinterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrinterId {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| SpoolError::Validation(format!("invalid printer id {s:?}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, waiting for an operator decision.
    Pending,
    /// Approved, ready to dispatch.
    Approved,
    /// Rejected by an operator. Terminal.
    Rejected,
    /// Currently being delivered to its printer.
    Printing,
    /// Delivered (or handed off to an upstream spool). Terminal.
    Completed,
    /// Delivery failed. May be retried or re-approved.
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Printing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Printing => "printing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// States reachable from this one in a single transition.
    pub fn allowed_transitions(&self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::Printing, Self::Rejected],
            Self::Printing => &[Self::Completed, Self::Failed],
            Self::Failed => &[Self::Printing, Self::Approved],
            Self::Rejected | Self::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Validate a transition, producing the error the store surfaces.
    pub fn check_transition(self, next: JobStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SpoolError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Explicit soft delete is only allowed before or instead of printing.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Pending | Self::Rejected)
    }

    /// States the retention sweep may soft-delete.
    pub fn is_sweepable(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SpoolError::Validation(format!("unknown job status {s:?}")))
    }
}

/// Base64 (standard alphabet) encoding for payload bytes in JSON.
pub mod base64_payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Same as [`base64_payload`] for optional payloads.
pub mod base64_payload_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|e| STANDARD.decode(e.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A request to create a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    /// Raw receipt bytes. Opaque to the spool.
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub printer_id: Option<PrinterId>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Carried unchanged across a forwarding chain; generated when absent.
    #[serde(default)]
    pub trace_id: Option<String>,
    /// 0 on the originating instance.
    #[serde(default)]
    pub chain_depth: u32,
    #[serde(default)]
    pub origin_service: Option<String>,
}

impl NewJob {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_printer(mut self, printer_id: PrinterId) -> Self {
        self.printer_id = Some(printer_id);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// One print request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    /// SHA-256 hex digest of `payload`, fixed at creation.
    pub payload_hash: String,
    pub printer_id: Option<PrinterId>,
    pub user: String,
    /// Overwritten on every transition.
    pub notes: Option<String>,
    /// Reserved for editing workflows; never mutated by the spool itself.
    pub modified: bool,
    #[serde(default, with = "base64_payload_opt")]
    pub original_payload: Option<Vec<u8>>,
    pub modified_markup: Option<String>,
    pub chain_depth: u32,
    pub origin_service: Option<String>,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a `pending` job from a creation request.
    ///
    /// Rejects an empty payload; generates a trace id when the request has
    /// none (or only whitespace).
    pub fn new(request: NewJob) -> Result<Self> {
        if request.payload.is_empty() {
            return Err(SpoolError::Validation("payload must not be empty".into()));
        }

        let trace_id = request
            .trace_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let user = request
            .user
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            payload_hash: payload_digest(&request.payload),
            payload: request.payload,
            printer_id: request.printer_id,
            user,
            notes: request.notes,
            modified: false,
            original_payload: None,
            modified_markup: None,
            chain_depth: request.chain_depth,
            origin_service: request.origin_service.filter(|s| !s.trim().is_empty()),
            trace_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

/// One row of the append-only transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub job_id: JobId,
    pub from_status: JobStatus,
    pub to_status: JobStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter and pagination for job listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl JobQuery {
    /// Clamp the limit into `1..=MAX_PAGE_SIZE`.
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }
}

/// One page of jobs plus the total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

// ---------------------------------------------------------------------------
// Printers
// ---------------------------------------------------------------------------

/// Kind of dispatch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    /// Network receipt printer reached over raw TCP.
    Physical,
    /// Another spool instance, the next hop of an approval chain.
    Spool,
    /// Locally attached printer. Registrable, not yet dispatchable.
    Usb,
}

impl PrinterType {
    pub const ALL: [PrinterType; 3] = [Self::Physical, Self::Spool, Self::Usb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Spool => "spool",
            Self::Usb => "usb",
        }
    }
}

impl std::fmt::Display for PrinterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterType {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SpoolError::Validation(format!("unknown printer type {s:?}")))
    }
}

/// Type-specific connection data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PrinterConnection {
    Physical {
        host: String,
        /// Wider than `u16` so out-of-range ports reach validation.
        port: u32,
    },
    Spool {
        /// Base URL of the upstream spool, e.g. `http://spool-b:8631`.
        url: String,
        /// Printer to target on the upstream instance.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        printer_id: Option<String>,
    },
    Usb {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vendor_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_path: Option<String>,
    },
}

impl PrinterConnection {
    pub fn physical(host: impl Into<String>, port: u32) -> Self {
        Self::Physical {
            host: host.into(),
            port,
        }
    }

    pub fn spool(url: impl Into<String>) -> Self {
        Self::Spool {
            url: url.into(),
            printer_id: None,
        }
    }

    pub fn printer_type(&self) -> PrinterType {
        match self {
            Self::Physical { .. } => PrinterType::Physical,
            Self::Spool { .. } => PrinterType::Spool,
            Self::Usb { .. } => PrinterType::Usb,
        }
    }

    /// Check the descriptor's own fields.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Physical { host, port } => {
                if host.trim().is_empty() {
                    return Err(SpoolError::InvalidConfiguration(
                        "physical printer requires a host".into(),
                    ));
                }
                if !(1..=u32::from(u16::MAX)).contains(port) {
                    return Err(SpoolError::InvalidConfiguration(format!(
                        "port {port} is outside 1-65535"
                    )));
                }
                Ok(())
            }
            Self::Spool { url, printer_id } => {
                if let Some(upstream) = printer_id {
                    Uuid::parse_str(upstream.trim()).map_err(|e| {
                        SpoolError::InvalidConfiguration(format!(
                            "upstream printer id {upstream:?} is not a valid id: {e}"
                        ))
                    })?;
                }
                let parsed = url::Url::parse(url).map_err(|e| {
                    SpoolError::InvalidConfiguration(format!(
                        "spool url {url:?} is not a valid absolute URL: {e}"
                    ))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                    return Err(SpoolError::InvalidConfiguration(format!(
                        "spool url {url:?} must be an http(s) URL with a host"
                    )));
                }
                Ok(())
            }
            Self::Usb {
                vendor_id,
                device_path,
                ..
            } => {
                let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
                if has(vendor_id) || has(device_path) {
                    Ok(())
                } else {
                    Err(SpoolError::InvalidConfiguration(
                        "usb printer requires a vendor id or a device path".into(),
                    ))
                }
            }
        }
    }

    /// Short human-readable target, for logs and notes.
    pub fn target(&self) -> String {
        match self {
            Self::Physical { host, port } => format!("{host}:{port}"),
            Self::Spool { url, .. } => url.clone(),
            Self::Usb {
                vendor_id,
                product_id,
                device_path,
            } => match (device_path, vendor_id) {
                (Some(path), _) => path.clone(),
                (None, Some(vendor)) => {
                    format!("usb:{vendor}:{}", product_id.as_deref().unwrap_or("*"))
                }
                (None, None) => "usb".into(),
            },
        }
    }
}

/// Check that a descriptor matches the type it was declared with, returning
/// the effective type. An undeclared type is taken from the descriptor.
pub fn resolve_printer_type(
    declared: Option<PrinterType>,
    connection: &PrinterConnection,
) -> Result<PrinterType> {
    let actual = connection.printer_type();
    match declared {
        Some(declared) if declared != actual => Err(SpoolError::InvalidConfiguration(format!(
            "printer type is {declared} but the connection describes a {actual} target"
        ))),
        _ => Ok(actual),
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SpoolError::InvalidConfiguration(
            "printer name must not be empty".into(),
        ));
    }
    if trimmed.chars().count() > 128 {
        return Err(SpoolError::InvalidConfiguration(
            "printer name must be at most 128 characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_timeout(timeout_ms: u64) -> Result<u64> {
    if timeout_ms == 0 || timeout_ms > MAX_TIMEOUT_MS {
        return Err(SpoolError::InvalidConfiguration(format!(
            "timeout {timeout_ms}ms is outside 1-{MAX_TIMEOUT_MS}ms"
        )));
    }
    Ok(timeout_ms)
}

fn validate_retry_attempts(attempts: u32) -> Result<u32> {
    if attempts > MAX_RETRY_ATTEMPTS {
        return Err(SpoolError::InvalidConfiguration(format!(
            "retry attempts {attempts} exceeds {MAX_RETRY_ATTEMPTS}"
        )));
    }
    Ok(attempts)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_enabled() -> bool {
    true
}

/// A request to register a printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrinter {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Optional; when given it must match the connection descriptor.
    #[serde(default)]
    pub printer_type: Option<PrinterType>,
    pub connection: PrinterConnection,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
}

impl NewPrinter {
    pub fn new(name: impl Into<String>, connection: PrinterConnection) -> Self {
        Self {
            name: name.into(),
            model: None,
            description: None,
            printer_type: None,
            connection,
            enabled: true,
            timeout_ms: None,
            retry_attempts: None,
        }
    }
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub printer_type: Option<PrinterType>,
    #[serde(default)]
    pub connection: Option<PrinterConnection>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
}

/// One dispatch target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    pub model: Option<String>,
    pub description: Option<String>,
    pub printer_type: PrinterType,
    pub connection: PrinterConnection,
    pub enabled: bool,
    /// Deadline for each network operation against this printer.
    pub timeout_ms: u64,
    /// Additional attempts after a transient delivery failure.
    pub retry_attempts: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Printer {
    /// Validate a registration request and build the printer record.
    pub fn new(request: NewPrinter, default_timeout_ms: u64) -> Result<Self> {
        let name = validate_name(&request.name)?;
        request.connection.validate()?;
        let printer_type = resolve_printer_type(request.printer_type, &request.connection)?;
        let timeout_ms = validate_timeout(request.timeout_ms.unwrap_or(default_timeout_ms))?;
        let retry_attempts = validate_retry_attempts(request.retry_attempts.unwrap_or(0))?;

        let now = Utc::now();
        Ok(Self {
            id: PrinterId::new(),
            name,
            model: non_blank(request.model),
            description: non_blank(request.description),
            printer_type,
            connection: request.connection,
            enabled: request.enabled,
            timeout_ms,
            retry_attempts,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Apply a partial update, all-or-nothing.
    ///
    /// A new connection without a declared type re-derives the type from
    /// the descriptor; a declared type must match the (possibly unchanged)
    /// descriptor.
    pub fn apply_update(&mut self, update: PrinterUpdate) -> Result<()> {
        let mut next = self.clone();

        if let Some(name) = update.name {
            next.name = validate_name(&name)?;
        }
        if let Some(model) = update.model {
            next.model = non_blank(Some(model));
        }
        if let Some(description) = update.description {
            next.description = non_blank(Some(description));
        }
        let connection_changed = update.connection.is_some();
        if let Some(connection) = update.connection {
            connection.validate()?;
            next.connection = connection;
        }
        let declared = match update.printer_type {
            Some(t) => Some(t),
            None if connection_changed => None,
            None => Some(next.printer_type),
        };
        next.printer_type = resolve_printer_type(declared, &next.connection)?;
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        if let Some(timeout_ms) = update.timeout_ms {
            next.timeout_ms = validate_timeout(timeout_ms)?;
        }
        if let Some(attempts) = update.retry_attempts {
            next.retry_attempts = validate_retry_attempts(attempts)?;
        }

        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Listing filter for printers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrinterFilter {
    #[serde(default)]
    pub enabled_only: bool,
    #[serde(default)]
    pub printer_type: Option<PrinterType>,
}

/// Outcome of a reachability test against a printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub printer_id: PrinterId,
    pub target: String,
    pub reachable: bool,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// Device status
// ---------------------------------------------------------------------------

/// Paper supply as reported by the roll sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Ok,
    Low,
    Out,
    Unknown,
}

/// Aggregate result of a status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatus {
    /// False when the device answered none of the queries.
    pub supported: bool,
    pub online: bool,
    pub paper_status: PaperStatus,
    pub cover_open: bool,
    pub error: bool,
    /// The first problem encountered, in query order.
    pub error_message: Option<String>,
    /// Every decoded flag, keyed by name.
    pub details: BTreeMap<String, bool>,
    /// How many of the queries were answered.
    pub responses: u8,
    pub warning: Option<String>,
}

impl PrinterStatus {
    /// Neutral status for a device that does not implement the probe.
    pub fn unsupported(warning: impl Into<String>) -> Self {
        Self {
            supported: false,
            online: true,
            paper_status: PaperStatus::Unknown,
            cover_open: false,
            error: false,
            error_message: None,
            details: BTreeMap::new(),
            responses: 0,
            warning: Some(warning.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Event names carried on the subscriber feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "job:created")]
    JobCreated,
    #[serde(rename = "job:approved")]
    JobApproved,
    #[serde(rename = "job:rejected")]
    JobRejected,
    #[serde(rename = "job:printing")]
    JobPrinting,
    #[serde(rename = "job:completed")]
    JobCompleted,
    #[serde(rename = "job:failed")]
    JobFailed,
    #[serde(rename = "job:deleted")]
    JobDeleted,
    #[serde(rename = "jobs:cleanup")]
    JobsCleanup,
    #[serde(rename = "printer:registered")]
    PrinterRegistered,
    #[serde(rename = "printer:updated")]
    PrinterUpdated,
    #[serde(rename = "printer:deleted")]
    PrinterDeleted,
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "pong")]
    Pong,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobCreated => "job:created",
            Self::JobApproved => "job:approved",
            Self::JobRejected => "job:rejected",
            Self::JobPrinting => "job:printing",
            Self::JobCompleted => "job:completed",
            Self::JobFailed => "job:failed",
            Self::JobDeleted => "job:deleted",
            Self::JobsCleanup => "jobs:cleanup",
            Self::PrinterRegistered => "printer:registered",
            Self::PrinterUpdated => "printer:updated",
            Self::PrinterDeleted => "printer:deleted",
            Self::Connected => "connected",
            Self::Pong => "pong",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
