use hmac::{Hmac, Mac};
use sha2::Sha256;

// ============================================================================
// Webhook Signatures
// ============================================================================
//
// Header format: t=<unix seconds>,v1=<hex hmac-sha256(secret, "<t>.<body>")>
//
// Several v1 entries may be present while a secret is being rotated; any one
// of them matching is enough. The timestamp bounds replay of captured events.
//
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing a timestamp")]
    MissingTimestamp,

    #[error("signature header carries no v1 signature")]
    MissingSignature,

    #[error("timestamp {timestamp} is outside the {tolerance_secs}s tolerance")]
    Expired { timestamp: i64, tolerance_secs: i64 },

    #[error("no signature matches the payload")]
    Mismatch,
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(payload);
    message
}

/// Hex HMAC over `"<timestamp>.<payload>"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so keying cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(&signed_payload(timestamp, payload));
    hex::encode(mac.finalize().into_bytes())
}

/// Build a complete header value for a payload.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},{}={}", timestamp, SCHEME, compute_signature(secret, timestamp, payload))
}

/// Check a header against the raw payload. `now` is unix seconds.
pub fn verify_header(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            SCHEME => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    // the timestamp is attacker-controlled; abs_diff cannot overflow
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired { timestamp, tolerance_secs });
    }

    let message = signed_payload(timestamp, payload);
    let matched = candidates.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(&message);
        // constant-time comparison
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
