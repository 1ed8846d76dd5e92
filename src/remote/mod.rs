//! Signed access to the remote execution engine.
//!
//! - [`nonce`]: single-use request tokens
//! - [`signing`]: HMAC-SHA256 request signatures
//! - [`client`]: the typed admin API client

pub mod client;
pub mod nonce;
pub mod signing;
pub mod types;

pub use client::EngineClient;
pub use nonce::generate_nonce;
pub use signing::{sign, verify, SignedHeaders};
pub use types::*;
