use crate::identity::errors::IdentityError;
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use ring::digest::{digest, SHA256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time for expiry and certificate validity checks.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        now_millis()
    }
}

/// Formats a SHA-256 digest as uppercase colon-separated hex.
pub fn sha256_fingerprint(data: &[u8]) -> String {
    let d = digest(&SHA256, data);
    d.as_ref()
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(":")
}

/// Returns the current Unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Base64-decodes `value`, tagging errors with the provided label.
pub fn decode_b64(label: &str, value: &str) -> Result<Vec<u8>, IdentityError> {
    b64.decode(value.trim().as_bytes())
        .map_err(|e| IdentityError::Decode(format!("{label}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_colon_separated_uppercase() {
        let fp = sha256_fingerprint(b"abc");
        assert!(fp.starts_with("BA:78:16:BF"));
        assert_eq!(fp.len(), 32 * 3 - 1);
    }

    #[test]
    fn decode_b64_labels_errors() {
        match decode_b64("salt", "***") {
            Err(IdentityError::Decode(msg)) => assert!(msg.starts_with("salt:")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(decode_b64("salt", " AQI= ").unwrap(), vec![1, 2]);
    }
}
