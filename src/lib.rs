//! flowsmith - workflow validation and signed engine access for voice agents
//!
//! A voice agent's behaviour is a directed graph of conversation nodes.
//! flowsmith checks those graphs before they are saved and ships valid ones
//! to the remote execution engine over an HMAC-signed admin API.
//!
//! ## Key Features
//!
//! - **Two-pass validation**: structural (shape, types, ranges) then semantic
//!   (graph closure, terminal nodes, intent references)
//! - **All issues at once**: every problem is reported with a path, never
//!   just the first
//! - **Replay-safe requests**: timestamp, nonce and body hash are signed into
//!   each call
//!
//! ## Example
//!
//! ```json
//! {
//!   "agent": { "name": "Front desk" },
//!   "workflow": {
//!     "initial_node": "greeting",
//!     "nodes": [
//!       { "id": "greeting", "type": "standard", "system_prompt": "Greet the caller",
//!         "transitions": [{ "condition": "intent:goodbye", "target": "bye" }],
//!         "intents": { "goodbye": { "description": "Caller wants to hang up" } } },
//!       { "id": "bye", "type": "end_call" }
//!     ]
//!   }
//! }
//! ```

#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod remote;
pub mod telemetry;
pub mod workflow;

pub use error::{Error, Result};
