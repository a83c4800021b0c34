//! Cryptographic utilities for webhook verification.
//!
//! Stripe signs each delivery with `Stripe-Signature: t=<unix>,v1=<hex>`,
//! where the signature is HMAC-SHA256 over `"{t}.{payload}"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How far a signature timestamp may drift from the local clock.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Reasons a webhook signature is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The header has no `t=` element.
    #[error("missing timestamp")]
    MissingTimestamp,

    /// The `t=` element is not a unix timestamp.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// The header has no `v1=` element.
    #[error("missing v1 signature")]
    MissingSignature,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance")]
    Expired,

    /// No `v1` signature matches the payload.
    #[error("signature mismatch")]
    Mismatch,

    /// The secret cannot key an HMAC.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the key is rejected by the HMAC
/// implementation.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(message.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns the first reason the header fails verification.
pub fn verify_stripe_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    // Format: t=timestamp,v1=signature,v1=signature2,...
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    if (now - issued_at).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return Err(SignatureError::Expired);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))?;

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
