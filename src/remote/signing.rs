//! Request signing for the engine admin API.
//!
//! Signature: `hex(HMAC-SHA256(key, timestamp ‖ nonce ‖ METHOD ‖ path ‖ hex(SHA256(body))))`
//!
//! The path is signed without its query string. The engine rejects any
//! request whose nonce it has already seen inside the timestamp window, so a
//! captured request cannot be replayed even within the same second.

use ring::{digest, hmac};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const NONCE_HEADER: &str = "X-Nonce";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Default tolerance for [`verify`], in seconds.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Compute the request signature.
pub fn sign(
    api_key: &str,
    timestamp: &str,
    nonce: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, api_key.as_bytes());
    let message = signing_message(timestamp, nonce, method, path, body);
    hex::encode(hmac::sign(&key, message.as_bytes()).as_ref())
}

/// `SHA256(body)`, hex encoded. The empty body hashes to `e3b0c442...b855`.
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(digest::digest(&digest::SHA256, body).as_ref())
}

fn signing_message(timestamp: &str, nonce: &str, method: &str, path: &str, body: &[u8]) -> String {
    format!(
        "{}{}{}{}{}",
        timestamp,
        nonce,
        method.to_ascii_uppercase(),
        strip_query(path),
        body_hash(body)
    )
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

/// Authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
}

impl SignedHeaders {
    pub fn new(
        api_key: &str,
        timestamp: i64,
        nonce: String,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Self {
        let timestamp = timestamp.to_string();
        let signature = sign(api_key, &timestamp, &nonce, method, path, body);
        Self {
            timestamp,
            nonce,
            signature,
        }
    }

    /// Header name/value pairs in wire order.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
            (NONCE_HEADER, self.nonce.as_str()),
            (SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }
}

/// Check a signed request the way the engine does.
///
/// `now` is Unix seconds. Nonce replay tracking is left to the caller.
pub fn verify(
    api_key: &str,
    headers: &SignedHeaders,
    method: &str,
    path: &str,
    body: &[u8],
    tolerance_secs: u64,
    now: i64,
) -> Result<()> {
    let timestamp: i64 = headers
        .timestamp
        .parse()
        .map_err(|_| Error::Validation("Invalid request timestamp".to_string()))?;

    if (now - timestamp).unsigned_abs() > tolerance_secs {
        return Err(Error::Validation(
            "Request timestamp outside tolerance".to_string(),
        ));
    }

    let expected = hex::decode(&headers.signature)
        .map_err(|_| Error::Validation("Invalid signature encoding".to_string()))?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, api_key.as_bytes());
    let message = signing_message(&headers.timestamp, &headers.nonce, method, path, body);
    let computed = hmac::sign(&key, message.as_bytes());

    if computed.as_ref().ct_eq(&expected).unwrap_u8() != 1 {
        return Err(Error::Validation("Invalid request signature".to_string()));
    }

    Ok(())
}
