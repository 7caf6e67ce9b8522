//! HMAC-based stateless crumb tokens.
//!
//! Wire format: `hex(HMAC-SHA256(secret, identity || timestamp)) + "_" +
//! timestamp`, where the timestamp is milliseconds since the epoch in
//! decimal. Validation recomputes the digest from the timestamp embedded in
//! the presented token, never from the validator's clock, and every failure
//! path returns `false` rather than raising.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn digest(identity: &str, timestamp: &str, secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(identity.as_bytes());
    mac.update(timestamp.as_bytes());
    mac
}

/// Produce a token bound to `identity`, signed with `secret`.
pub fn encrypt(identity: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp_millis().to_string();
    let mac = digest(identity, &timestamp, secret);
    format!("{}_{}", hex::encode(mac.finalize().into_bytes()), timestamp)
}

/// Check a presented token against `identity` and `secret`.
///
/// Returns `false` for any malformed input: missing `_` separator, empty
/// digest or timestamp parts, a timestamp that does not parse or lies in
/// the future, non-hex digest bytes, or empty identity / secret.
pub fn validate(token: &str, identity: &str, secret: &str) -> bool {
    if token.is_empty() || identity.is_empty() || secret.is_empty() {
        return false;
    }

    let Some((token_digest, token_timestamp)) = token.split_once('_') else {
        return false;
    };
    if token_digest.is_empty() || token_timestamp.is_empty() {
        return false;
    }

    let Ok(timestamp_ms) = token_timestamp.parse::<i64>() else {
        return false;
    };
    if timestamp_ms > Utc::now().timestamp_millis() {
        return false;
    }

    let Ok(presented) = hex::decode(token_digest) else {
        return false;
    };

    // Constant-time comparison via the Mac verifier.
    digest(identity, token_timestamp, secret)
        .verify_slice(&presented)
        .is_ok()
}
