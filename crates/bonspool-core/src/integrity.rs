// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload integrity: SHA-256 fingerprints taken at submission and checked
// again just before bytes go to a printer.

use sha2::{Digest, Sha256};

use crate::error::{Result, SpoolError};

/// Lowercase hex SHA-256 of a receipt payload.
pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Confirm `payload` still matches the digest recorded for it.
pub fn verify_payload(payload: &[u8], expected_hex: &str) -> Result<()> {
    let actual = payload_digest(payload);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(SpoolError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            payload_digest(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let digest = payload_digest(&[0x1b, 0x40]);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tampered_payload_is_detected() {
        let original = b"\x1b@TOTAL 12.50\n\x1dV\x00";
        let digest = payload_digest(original);
        let mut tampered = original.to_vec();
        tampered[9] = b'9';
        match verify_payload(&tampered, &digest) {
            Err(SpoolError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, digest);
                assert_eq!(actual, payload_digest(&tampered));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn untouched_payload_verifies() {
        let payload = b"receipt";
        assert!(verify_payload(payload, &payload_digest(payload)).is_ok());
        assert!(verify_payload(payload, &payload_digest(payload).to_uppercase()).is_ok());
    }
}
