// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bonspool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{JobId, JobStatus, PrinterId, PrinterType};

/// Failure codes for a single raw TCP delivery.
///
/// A delivery returns either a byte count or exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryErrorCode {
    /// No connection (or no progress) within the deadline.
    Timeout,
    /// Connection refused or host unreachable.
    ConnectionError,
    /// The transport rejected the write.
    WriteError,
    /// The socket closed before the full payload was sent.
    ConnectionClosed,
}

impl DeliveryErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::WriteError => "WRITE_ERROR",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
        }
    }

    /// Whether another attempt is safe.
    ///
    /// Only failures that happen before any byte could reach the device
    /// qualify; a retried partial write would print the receipt twice.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionError)
    }
}

impl std::fmt::Display for DeliveryErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed delivery: the code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct DeliveryError {
    pub code: DeliveryErrorCode,
    pub message: String,
}

impl DeliveryError {
    pub fn new(code: DeliveryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Coarse classification that drives propagation and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Malformed input. Never retried.
    Validation,
    /// Unknown job or printer.
    NotFound,
    /// The request conflicts with current state (state machine, uniqueness).
    Conflict,
    /// Printer or upstream spool unreachable or misbehaving.
    Network,
    /// Storage or serialization failure inside the spool.
    Internal,
}

/// Top-level error type for all Bonspool operations.
#[derive(Debug, Error)]
pub enum SpoolError {
    // -- Caller errors --
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid printer configuration: {0}")]
    InvalidConfiguration(String),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("printer {0} not found")]
    PrinterNotFound(PrinterId),

    #[error("printer name {0:?} is already in use")]
    DuplicatePrinterName(String),

    #[error("job has no target printer")]
    NoPrinterSelected,

    // -- State errors --
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job {id} cannot be deleted while {status}")]
    JobNotDeletable { id: JobId, status: JobStatus },

    #[error("printer {0:?} is disabled")]
    PrinterDisabled(String),

    #[error("dispatch to {0} printers is not supported")]
    UnsupportedPrinterType(PrinterType),

    #[error("chain depth {depth} exceeds the limit of {max}")]
    ChainDepthExceeded { depth: u32, max: u32 },

    #[error("payload integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Network errors --
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("status probe failed: {0}")]
    Probe(String),

    #[error("chain forwarding failed: {0}")]
    Forward(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpoolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_)
            | Self::InvalidConfiguration(_)
            | Self::NoPrinterSelected
            | Self::UnsupportedPrinterType(_)
            | Self::ChainDepthExceeded { .. } => ErrorClass::Validation,
            Self::JobNotFound(_) | Self::PrinterNotFound(_) => ErrorClass::NotFound,
            Self::DuplicatePrinterName(_)
            | Self::InvalidTransition { .. }
            | Self::JobNotDeletable { .. }
            | Self::PrinterDisabled(_) => ErrorClass::Conflict,
            Self::Delivery(_) | Self::Probe(_) | Self::Forward(_) => ErrorClass::Network,
            Self::IntegrityMismatch { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::PrinterNotFound(_) => "PRINTER_NOT_FOUND",
            Self::DuplicatePrinterName(_) => "DUPLICATE_PRINTER_NAME",
            Self::NoPrinterSelected => "NO_PRINTER_SELECTED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::JobNotDeletable { .. } => "JOB_NOT_DELETABLE",
            Self::PrinterDisabled(_) => "PRINTER_DISABLED",
            Self::UnsupportedPrinterType(_) => "UNSUPPORTED_PRINTER_TYPE",
            Self::ChainDepthExceeded { .. } => "CHAIN_DEPTH_EXCEEDED",
            Self::IntegrityMismatch { .. } => "INTEGRITY_MISMATCH",
            Self::Delivery(e) => e.code.as_str(),
            Self::Probe(_) => "PROBE_ERROR",
            Self::Forward(_) => "FORWARD_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SpoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_codes_render_as_wire_names() {
        let err = SpoolError::from(DeliveryError::new(
            DeliveryErrorCode::ConnectionClosed,
            "peer hung up",
        ));
        assert_eq!(err.code(), "CONNECTION_CLOSED");
        assert_eq!(err.class(), ErrorClass::Network);
        assert!(err.to_string().contains("CONNECTION_CLOSED: peer hung up"));
    }

    #[test]
    fn only_pre_write_failures_are_transient() {
        assert!(DeliveryErrorCode::Timeout.is_transient());
        assert!(DeliveryErrorCode::ConnectionError.is_transient());
        assert!(!DeliveryErrorCode::WriteError.is_transient());
        assert!(!DeliveryErrorCode::ConnectionClosed.is_transient());
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = SpoolError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Printing,
        };
        assert_eq!(err.class(), ErrorClass::Conflict);
        assert_eq!(
            err.to_string(),
            "invalid job transition from completed to printing"
        );
    }

    #[test]
    fn caller_mistakes_are_validation_class() {
        assert_eq!(
            SpoolError::InvalidConfiguration("port".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(SpoolError::NoPrinterSelected.class(), ErrorClass::Validation);
        assert_eq!(
            SpoolError::PrinterNotFound(PrinterId::new()).class(),
            ErrorClass::NotFound
        );
    }
}
