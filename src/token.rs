use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

/// Reads the `exp` claim (Unix seconds) from a compact JWT without
/// verifying the signature. Returns `None` for anything that is not a
/// three-segment token whose payload is base64url JSON carrying `exp`.
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return None,
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Some(claims.exp)
}

/// Structural-and-expiry predicate for an access token. Expiry is strict:
/// a token expiring exactly now is already invalid. Malformed input is
/// invalid, never an error; an `exp` too large for millisecond math is
/// simply far in the future.
pub fn token_is_valid(token: &str, now: DateTime<Utc>) -> bool {
    decode_expiry(token).is_some_and(|exp| match exp.checked_mul(1000) {
        Some(exp_ms) => exp_ms > now.timestamp_millis(),
        None => exp > 0,
    })
}
