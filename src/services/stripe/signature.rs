use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{StripeEvent, StripeServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a `Stripe-Signature` timestamp.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn expected_signature(
    payload: &[u8],
    timestamp: &str,
    secret: &str,
) -> Result<String, StripeServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeServiceError::Config(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `t=<unix>,v1=<hex>[,v1=...]` header against the raw body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), StripeServiceError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeServiceError::Webhook("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(StripeServiceError::Webhook("missing v1 signature".into()));
    }

    let ts = timestamp
        .parse::<i64>()
        .map_err(|_| StripeServiceError::Webhook("invalid timestamp".into()))?;
    // Attacker-controlled `t` may sit anywhere in i64.
    let skew = now_unix.checked_sub(ts).map(i64::unsigned_abs);
    if !matches!(skew, Some(skew) if skew <= tolerance_secs.unsigned_abs()) {
        return Err(StripeServiceError::Webhook(
            "timestamp outside tolerance".into(),
        ));
    }

    let expected = expected_signature(payload, timestamp, secret)?;
    let matched = signatures
        .iter()
        .any(|provided| bool::from(expected.as_bytes().ct_eq(provided.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(StripeServiceError::Webhook("signature mismatch".into()))
    }
}

/// Verifies then parses the event envelope. The payload stays untyped JSON so
/// event shapes newer than the pinned API version still parse.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<StripeEvent, StripeServiceError> {
    verify_signature(payload, header, secret, now_unix, DEFAULT_TOLERANCE_SECS)?;

    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StripeServiceError::Serde("event id missing".into()))?
        .to_string();
    let r#type = value
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(StripeEvent {
        id,
        r#type,
        payload: value,
    })
}

/// Builds a valid header for `payload`, as Stripe would.
#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let signature = expected_signature(payload, &ts, secret).unwrap();
    format!("t={ts},v1={signature}")
}
