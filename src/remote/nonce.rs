//! Per-request nonces.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Error, Result};

/// Random bytes per nonce. Encodes to 32 URL-safe characters.
pub const NONCE_BYTES: usize = 24;

/// Generate a fresh, URL-safe nonce from the system CSPRNG.
pub fn generate_nonce() -> Result<String> {
    let mut bytes = [0u8; NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| Error::Internal("Failed to generate request nonce".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
