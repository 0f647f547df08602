// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP delivery to receipt printers (port 9100).
//
// One connection per call: connect under a deadline, write the whole
// payload, then shut the socket down. The caller gets either the byte count
// or exactly one delivery error code.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use bonspool_core::error::{DeliveryError, DeliveryErrorCode};

/// A completed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// Send `payload` to `host:port`.
///
/// `timeout` bounds the connect and, separately, the write-and-close phase.
/// A stalled write is reported as `WRITE_ERROR` rather than `TIMEOUT` so
/// that only pre-connection failures count as safe to retry.
pub async fn deliver(
    host: &str,
    port: u16,
    payload: &[u8],
    timeout: Duration,
) -> Result<Delivery, DeliveryError> {
    let addr = format!("{host}:{port}");
    let started = Instant::now();
    debug!(
        addr = %addr,
        bytes = payload.len(),
        timeout_ms = timeout.as_millis() as u64,
        "connecting"
    );

    let mut stream = connect(&addr, timeout).await?;

    let send = async {
        stream
            .write_all(payload)
            .await
            .map_err(|e| write_failure(&addr, e))?;
        stream
            .flush()
            .await
            .map_err(|e| write_failure(&addr, e))?;
        stream.shutdown().await.map_err(|e| {
            DeliveryError::new(
                DeliveryErrorCode::ConnectionClosed,
                format!("connection to {addr} did not close cleanly: {e}"),
            )
        })
    };

    match tokio::time::timeout(timeout, send).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(addr = %addr, code = %e.code, "delivery failed");
            return Err(e);
        }
        Err(_) => {
            warn!(addr = %addr, "write stalled past deadline");
            return Err(DeliveryError::new(
                DeliveryErrorCode::WriteError,
                format!(
                    "write to {addr} did not complete within {}ms",
                    timeout.as_millis()
                ),
            ));
        }
    }

    let delivery = Delivery {
        bytes_written: payload.len(),
        elapsed: started.elapsed(),
    };
    info!(
        addr = %addr,
        bytes = delivery.bytes_written,
        elapsed_ms = delivery.elapsed.as_millis() as u64,
        "payload delivered"
    );
    Ok(delivery)
}

/// Open a connection under `timeout`, mapping failures to delivery codes.
pub(crate) async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, DeliveryError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            // Receipt printers expect small writes to go out immediately.
            stream.set_nodelay(true).ok();
            Ok(stream)
        }
        Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => Err(DeliveryError::new(
            DeliveryErrorCode::Timeout,
            format!("connection to {addr} timed out: {e}"),
        )),
        Ok(Err(e)) => Err(DeliveryError::new(
            DeliveryErrorCode::ConnectionError,
            format!("cannot connect to {addr}: {e}"),
        )),
        Err(_) => Err(DeliveryError::new(
            DeliveryErrorCode::Timeout,
            format!(
                "no connection to {addr} within {}ms",
                timeout.as_millis()
            ),
        )),
    }
}

fn write_failure(addr: &str, e: std::io::Error) -> DeliveryError {
    let code = match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::UnexpectedEof
        | ErrorKind::WriteZero => DeliveryErrorCode::ConnectionClosed,
        _ => DeliveryErrorCode::WriteError,
    };
    DeliveryError::new(code, format!("write to {addr} failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn delivers_full_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let printer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let payload = b"\x1b@Table 4\nTOTAL 18.20\n\x1dV\x00".to_vec();
        let delivery = deliver("127.0.0.1", port, &payload, Duration::from_secs(2))
            .await
            .expect("delivery");
        assert_eq!(delivery.bytes_written, payload.len());
        assert_eq!(printer.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn zero_bytes_only_checks_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let printer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received.len()
        });

        let delivery = deliver("127.0.0.1", port, &[], Duration::from_secs(2))
            .await
            .expect("reachable");
        assert_eq!(delivery.bytes_written, 0);
        assert_eq!(printer.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = deliver("127.0.0.1", port, b"x", Duration::from_secs(2))
            .await
            .expect_err("nothing listening");
        assert_eq!(err.code, DeliveryErrorCode::ConnectionError);
    }

    #[tokio::test]
    async fn peer_that_hangs_up_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        // Large enough that the kernel buffers cannot absorb it before the
        // reset arrives.
        let payload = vec![0x20u8; 16 * 1024 * 1024];
        let err = deliver("127.0.0.1", port, &payload, Duration::from_secs(5))
            .await
            .expect_err("peer closed");
        assert_eq!(err.code, DeliveryErrorCode::ConnectionClosed);
    }

    #[tokio::test]
    async fn stalled_reader_is_a_write_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(socket);
        });

        let payload = vec![0x20u8; 64 * 1024 * 1024];
        let err = deliver("127.0.0.1", port, &payload, Duration::from_millis(300))
            .await
            .expect_err("write stalls");
        assert_eq!(err.code, DeliveryErrorCode::WriteError);
        hold.abort();
    }
}
