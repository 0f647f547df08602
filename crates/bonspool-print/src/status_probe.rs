// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS real-time status probe (DLE EOT n).
//
// The printer answers at most one status query at a time, so the four
// queries go out strictly in sequence over a single connection, each waiting
// for its one-byte reply. A reply that misses its window gets one grace
// window more; anything still buffered when the next query is due is
// discarded so a late byte is never decoded as the wrong query. Printers
// that ignore the queries are reported as unsupported rather than failed.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use bonspool_core::SpoolConfig;
use bonspool_core::error::{Result, SpoolError};
use bonspool_core::types::{PaperStatus, PrinterStatus};

use crate::raw_client::connect;

/// DLE EOT n for n = 1 (printer), 2 (offline cause), 3 (error cause),
/// 4 (roll paper sensor).
pub const STATUS_QUERIES: [[u8; 3]; 4] = [
    [0x10, 0x04, 0x01],
    [0x10, 0x04, 0x02],
    [0x10, 0x04, 0x03],
    [0x10, 0x04, 0x04],
];

// Every status byte has bits 1 and 4 set and bits 0 and 7 clear.
const FIXED_MASK: u8 = 0x93;
const FIXED_BITS: u8 = 0x12;

// n = 1: printer status
const DRAWER_OPEN: u8 = 0x04;
const OFFLINE: u8 = 0x08;
const WAITING_FOR_RECOVERY: u8 = 0x20;

// n = 2: offline cause
const COVER_OPEN: u8 = 0x04;
const FEED_BUTTON: u8 = 0x08;
const PAPER_END_STOP: u8 = 0x20;
const ERROR_OCCURRED: u8 = 0x40;

// n = 3: error cause
const AUTOCUTTER_ERROR: u8 = 0x08;
const UNRECOVERABLE_ERROR: u8 = 0x20;
const AUTO_RECOVERABLE_ERROR: u8 = 0x40;

// n = 4: roll paper sensor
const PAPER_NEAR_END: u8 = 0x0C;
const PAPER_NOT_PRESENT: u8 = 0x60;

/// Timing for one probe run.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    /// Deadline for the whole probe, connect included.
    pub overall_timeout: Duration,
    /// Wait for each reply; never longer than what is left of the overall
    /// deadline.
    pub query_timeout: Duration,
    /// Pause before each query after the first.
    pub inter_query_delay: Duration,
}

impl ProbeSettings {
    pub fn from_config(config: &SpoolConfig) -> Self {
        Self {
            overall_timeout: config.probe_timeout(),
            query_timeout: config.probe_query_timeout(),
            inter_query_delay: config.probe_inter_query_delay(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_config(&SpoolConfig::default())
    }
}

/// Run the four-query probe against `host:port`.
///
/// Connection failures and a dead socket before the first query are
/// errors. Silence is not: zero replies yields `supported = false`, and a
/// connection that drops after some replies yields the partial result.
#[instrument(skip(settings), fields(addr = %format!("{host}:{port}")))]
pub async fn probe_status(host: &str, port: u16, settings: ProbeSettings) -> Result<PrinterStatus> {
    let addr = format!("{host}:{port}");
    let deadline = Instant::now() + settings.overall_timeout;
    let mut stream = connect(&addr, settings.overall_timeout).await?;

    let mut replies: [Option<u8>; 4] = [None; 4];
    for (index, query) in STATUS_QUERIES.iter().enumerate() {
        let n = index + 1;
        if index > 0 && !settings.inter_query_delay.is_zero() {
            let pause = settings
                .inter_query_delay
                .min(deadline.saturating_duration_since(Instant::now()));
            tokio::time::sleep(pause).await;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(query = n, "probe deadline reached, stopping early");
            break;
        }
        if discard_stale(&stream, n).is_err() {
            debug!(query = n, "printer closed the connection");
            break;
        }

        match tokio::time::timeout(remaining, stream.write_all(query)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if index == 0 => {
                return Err(SpoolError::Probe(format!(
                    "cannot send status query to {addr}: {e}"
                )));
            }
            Ok(Err(e)) => {
                warn!(query = n, error = %e, "connection lost, keeping partial status");
                break;
            }
            Err(_) => {
                warn!(query = n, "status query write stalled, stopping early");
                break;
            }
        }

        let wait = settings.query_timeout.min(remaining);
        let mut reply = read_reply(&mut stream, wait).await;
        if matches!(reply, Reply::Silent) {
            let grace = settings
                .query_timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            if !grace.is_zero() {
                reply = read_reply(&mut stream, grace).await;
                if matches!(reply, Reply::Byte(..)) {
                    warn!(query = n, "status reply arrived late");
                }
            }
        }

        match reply {
            Reply::Silent => debug!(query = n, "no reply"),
            Reply::Closed => {
                debug!(query = n, "printer closed the connection");
                break;
            }
            Reply::Byte(byte, len) => {
                if len > 1 {
                    warn!(query = n, len, "multi-byte status reply, using the first byte");
                }
                debug!(query = n, reply = %format!("{byte:#04x}"), "status reply");
                replies[index] = Some(byte);
            }
            Reply::Failed(e) => {
                warn!(query = n, error = %e, "read failed, keeping partial status");
                break;
            }
        }
    }

    stream.shutdown().await.ok();

    let status = decode_replies(&replies);
    info!(
        supported = status.supported,
        responses = status.responses,
        online = status.online,
        error = status.error,
        "status probe finished"
    );
    Ok(status)
}

enum Reply {
    /// First byte and the number of bytes read with it.
    Byte(u8, usize),
    Silent,
    Closed,
    Failed(std::io::Error),
}

async fn read_reply(stream: &mut TcpStream, wait: Duration) -> Reply {
    let mut buf = [0u8; 16];
    match tokio::time::timeout(wait, stream.read(&mut buf)).await {
        Err(_) => Reply::Silent,
        Ok(Ok(0)) => Reply::Closed,
        Ok(Ok(len)) => Reply::Byte(buf[0], len),
        Ok(Err(e)) => Reply::Failed(e),
    }
}

/// Drop whatever the printer sent since the last reply was taken. Errors
/// once the peer has closed or the socket failed.
fn discard_stale(stream: &TcpStream, query: usize) -> std::io::Result<()> {
    let mut buf = [0u8; 16];
    loop {
        match stream.try_read(&mut buf) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(len) => warn!(query, len, "discarding stale status bytes"),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// Record a decoded flag and pass its value through.
fn flag(details: &mut BTreeMap<String, bool>, name: &str, set: bool) -> bool {
    details.insert(name.to_string(), set);
    set
}

/// Fold up to four reply bytes (in query order) into one status.
pub fn decode_replies(replies: &[Option<u8>; 4]) -> PrinterStatus {
    let responses = replies.iter().filter(|r| r.is_some()).count() as u8;
    if responses == 0 {
        return PrinterStatus::unsupported("printer did not answer any status query");
    }

    let mut details = BTreeMap::new();
    let mut problems: Vec<&'static str> = Vec::new();
    for (index, reply) in replies.iter().enumerate() {
        if let Some(byte) = reply {
            if byte & FIXED_MASK != FIXED_BITS {
                debug!(
                    query = index + 1,
                    reply = %format!("{byte:#04x}"),
                    "reply lacks fixed status bits"
                );
            }
        }
    }

    let mut online = true;
    if let Some(b) = replies[0] {
        flag(&mut details, "drawer_open", b & DRAWER_OPEN != 0);
        if flag(&mut details, "offline", b & OFFLINE != 0) {
            online = false;
            problems.push("printer is offline");
        }
        flag(&mut details, "waiting_for_recovery", b & WAITING_FOR_RECOVERY != 0);
    }

    let mut cover_open = false;
    let mut error = false;
    let mut paper_end_stop = false;
    if let Some(b) = replies[1] {
        if flag(&mut details, "cover_open", b & COVER_OPEN != 0) {
            cover_open = true;
            problems.push("cover is open");
        }
        flag(&mut details, "feed_button_pressed", b & FEED_BUTTON != 0);
        if flag(&mut details, "paper_end_stop", b & PAPER_END_STOP != 0) {
            paper_end_stop = true;
            problems.push("printing stopped at paper end");
        }
        if flag(&mut details, "error_occurred", b & ERROR_OCCURRED != 0) {
            error = true;
            problems.push("printer reports an error");
        }
    }

    if let Some(b) = replies[2] {
        if flag(&mut details, "autocutter_error", b & AUTOCUTTER_ERROR != 0) {
            error = true;
            problems.push("autocutter error");
        }
        if flag(&mut details, "unrecoverable_error", b & UNRECOVERABLE_ERROR != 0) {
            error = true;
            problems.push("unrecoverable error");
        }
        if flag(&mut details, "auto_recoverable_error", b & AUTO_RECOVERABLE_ERROR != 0) {
            error = true;
            problems.push("temperature or voltage error");
        }
    }

    let mut near_end = false;
    let mut not_present = false;
    if let Some(b) = replies[3] {
        near_end = flag(&mut details, "paper_near_end", b & PAPER_NEAR_END != 0);
        not_present = flag(&mut details, "paper_not_present", b & PAPER_NOT_PRESENT != 0);
        if not_present {
            problems.push("paper roll is empty");
        } else if near_end {
            problems.push("paper roll is near its end");
        }
    }

    let paper_status = if not_present || paper_end_stop {
        PaperStatus::Out
    } else if near_end {
        PaperStatus::Low
    } else if replies[3].is_some() {
        PaperStatus::Ok
    } else {
        PaperStatus::Unknown
    };

    let warning = (responses < 4).then(|| format!("only {responses} of 4 status queries answered"));

    PrinterStatus {
        supported: true,
        online,
        paper_status,
        cover_open,
        error,
        error_message: problems.first().map(|p| p.to_string()),
        details,
        responses,
        warning,
    }
}
