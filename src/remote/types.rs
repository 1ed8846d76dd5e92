//! Request parameters and response payloads for the engine admin API.
//!
//! Parameters validate themselves before anything is sent so that obviously
//! bad input never costs a round trip.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::workflow::WorkflowConfig;

pub const MIN_TOP_K: u32 = 1;
pub const MAX_TOP_K: u32 = 50;
pub const DEFAULT_TOP_K: u32 = 5;

fn e164_regex() -> &'static Regex {
    static E164: OnceLock<Regex> = OnceLock::new();
    E164.get_or_init(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid regex"))
}

fn bucket_regex() -> &'static Regex {
    static BUCKET: OnceLock<Regex> = OnceLock::new();
    BUCKET.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex"))
}

fn ipv4_regex() -> &'static Regex {
    static IPV4: OnceLock<Regex> = OnceLock::new();
    IPV4.get_or_init(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").expect("valid regex"))
}

/// Reject ids that cannot be placed in a URL path unescaped.
pub fn validate_path_id(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    if id.chars().all(|c| c == '.') {
        return Err(Error::Validation(format!(
            "{} '{}' is not a valid id",
            field, id
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::Validation(format!(
            "{} '{}' may only contain letters, digits, '-', '_' and '.'",
            field, id
        )));
    }
    Ok(())
}

/// E.164: `+` then up to 15 digits, no leading zero.
pub fn validate_phone_number(field: &str, number: &str) -> Result<()> {
    if e164_regex().is_match(number) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} '{}' is not an E.164 phone number (e.g. +14155550123)",
            field, number
        )))
    }
}

/// S3 bucket naming rules.
pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    let valid =
        bucket_regex().is_match(bucket) && !bucket.contains("..") && !ipv4_regex().is_match(bucket);
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "'{}' is not a valid S3 bucket name",
            bucket
        )))
    }
}

// ---------------------------------------------------------------------------
// RAG
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagQueryParams {
    pub agent_id: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl RagQueryParams {
    pub fn new(agent_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            similarity_threshold: None,
            collection: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_path_id("agent_id", &self.agent_id)?;
        if self.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&self.top_k) {
            return Err(Error::Validation(format!(
                "top_k must be between {} and {}, got {}",
                MIN_TOP_K, MAX_TOP_K, self.top_k
            )));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::Validation(format!(
                    "similarity_threshold must be between 0 and 1, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagQueryResponse {
    #[serde(default)]
    pub results: Vec<RagChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagChunk {
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDeployParams {
    pub agent_id: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl RagDeployParams {
    pub fn validate(&self) -> Result<()> {
        validate_path_id("agent_id", &self.agent_id)?;
        validate_bucket_name(&self.bucket)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDeployment {
    pub deployment_id: String,
    pub status: DeploymentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Agent import / export
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ImportRequest<'a> {
    pub config: &'a WorkflowConfig,
    pub activate: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkImportRequest<'a> {
    pub configs: &'a [WorkflowConfig],
    pub activate: bool,
}

/// Engine outcome for one imported agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentImportResult {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub activated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkImportItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkImportResponse {
    #[serde(default)]
    pub results: Vec<BulkImportItem>,
}

impl BulkImportResponse {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Exported agent. The config is kept raw so that versions written by older
/// engines can still be saved and re-validated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExport {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub config: Value,
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCallParams {
    pub agent_id: String,
    pub to_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_number: Option<String>,
    /// Values made available to the workflow before the first node runs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl OutboundCallParams {
    pub fn new(agent_id: impl Into<String>, to_number: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            to_number: to_number.into(),
            from_number: None,
            variables: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_path_id("agent_id", &self.agent_id)?;
        validate_phone_number("to_number", &self.to_number)?;
        if let Some(from) = &self.from_number {
            validate_phone_number("from_number", from)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Busy,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl CallState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CallState::Completed
                | CallState::Failed
                | CallState::NoAnswer
                | CallState::Busy
                | CallState::Canceled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCall {
    pub call_id: String,
    pub status: CallState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStatus {
    pub call_id: String,
    pub status: CallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDebugTrace {
    pub call_id: String,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}
