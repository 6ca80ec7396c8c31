use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Requests older or newer than this are refused as replays.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request timestamp `{0}` is not a unix timestamp")]
    MalformedTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from now")]
    Stale { skew_secs: i64 },
    #[error("request signature is not a v0 hex digest")]
    MalformedSignature,
    #[error("request signature does not match")]
    Mismatch,
    #[error("signing secret is unusable")]
    InvalidSecret,
}

/// Checks `X-Slack-Signature` against `v0=hex(hmac_sha256(secret, "v0:{timestamp}:{body}"))`.
pub fn verify_request(
    signing_secret: &[u8],
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp(timestamp.to_owned()))?;
    let skew_secs = now_unix.saturating_sub(sent_at);
    if skew_secs.abs() > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::Stale { skew_secs });
    }

    let expected = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(SignatureError::MalformedSignature)?;

    let mut mac = base_mac(signing_secret, timestamp.trim())?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Produces the header value a correctly signed request would carry.
pub fn sign_request(
    signing_secret: &[u8],
    timestamp: &str,
    body: &[u8],
) -> Result<String, SignatureError> {
    let mut mac = base_mac(signing_secret, timestamp.trim())?;
    mac.update(body);
    Ok(format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

fn base_mac(signing_secret: &[u8], timestamp: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(signing_secret).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    Ok(mac)
}
