//! Signed HTTP client for the engine admin API.
//!
//! Every request carries a fresh timestamp and nonce, is signed over the
//! exact body bytes that go on the wire, and runs under its own time budget.
//! Failures come back as one of four distinguishable errors: missing
//! credentials ([`Error::Config`]), an unreachable engine
//! ([`Error::Transport`]), an exhausted budget ([`Error::Timeout`]) or a
//! non-2xx answer ([`Error::Remote`]).

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::nonce::generate_nonce;
use super::signing::SignedHeaders;
use super::types::{
    validate_path_id, AgentExport, AgentImportResult, BulkImportRequest, BulkImportResponse,
    CallDebugTrace, CallStatus, ImportRequest, OutboundCall, OutboundCallParams, RagDeployParams,
    RagDeployment, RagQueryParams, RagQueryResponse,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::workflow::{validate_workflow, WorkflowConfig};

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Client for the engine admin API. Cheap to clone; clones share one
/// connection pool.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: Client,
    config: EngineConfig,
    timeout: Duration,
    bulk_timeout: Duration,
}

impl EngineClient {
    /// Create a client. Credentials are not checked here; an unconfigured
    /// client fails each operation with [`Error::Config`] before any I/O.
    pub fn new(config: EngineConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with connect timeout: {}", e);
                Client::new()
            });

        Self {
            http,
            timeout: config.timeout(),
            bulk_timeout: config.bulk_timeout(),
            config,
        }
    }

    /// Override the per-request time budgets.
    pub fn with_timeouts(mut self, timeout: Duration, bulk_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.bulk_timeout = bulk_timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Engine base URL is not set (FLOWSMITH_ENGINE_URL or [engine] base_url)"
                        .to_string(),
                )
            })?;
        let api_key = self
            .config
            .api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "Engine API key is not set (FLOWSMITH_ENGINE_API_KEY or [engine] api_key)"
                        .to_string(),
                )
            })?;
        Ok((base_url.trim_end_matches('/'), api_key.expose()))
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Ask the engine to drop its cached copy of an agent.
    pub async fn refresh_agent_cache(&self, agent_id: &str) -> Result<()> {
        validate_path_id("agent_id", agent_id)?;
        let path = format!("/admin/agents/{}/cache/refresh", agent_id);
        self.execute(Method::POST, &path, Vec::new(), self.timeout)
            .await
            .map(|_| ())
    }

    /// Cache refresh that never fails the caller. Returns whether it worked.
    pub async fn refresh_agent_cache_best_effort(&self, agent_id: &str) -> bool {
        match self.refresh_agent_cache(agent_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    agent_id = %agent_id,
                    code = e.code(),
                    "Agent cache refresh failed, continuing: {}",
                    e
                );
                false
            }
        }
    }

    /// Import one workflow. Configs that fail validation are never sent.
    pub async fn import_agent_config(
        &self,
        config: &WorkflowConfig,
        activate: bool,
    ) -> Result<AgentImportResult> {
        ensure_shippable(config)?;
        let body = ImportRequest { config, activate };
        self.send_json(Method::POST, "/admin/agents/import", &body, self.timeout)
            .await
    }

    /// Import several workflows in one request, under the bulk time budget.
    pub async fn bulk_import_agent_configs(
        &self,
        configs: &[WorkflowConfig],
        activate: bool,
    ) -> Result<BulkImportResponse> {
        if configs.is_empty() {
            return Err(Error::Validation(
                "bulk import needs at least one config".to_string(),
            ));
        }
        for config in configs {
            ensure_shippable(config)?;
        }
        let body = BulkImportRequest { configs, activate };
        self.send_json(
            Method::POST,
            "/admin/agents/bulk-import",
            &body,
            self.bulk_timeout,
        )
        .await
    }

    /// Import workflows as independent concurrent requests. Each result
    /// stands alone; one failure does not affect the others. With `activate`,
    /// every agent that did import gets a best-effort cache refresh, whatever
    /// happened to its siblings.
    pub async fn import_agent_configs_concurrently(
        &self,
        configs: &[WorkflowConfig],
        activate: bool,
    ) -> Vec<Result<AgentImportResult>> {
        let results = join_all(
            configs
                .iter()
                .map(|config| self.import_agent_config(config, activate)),
        )
        .await;

        if activate {
            self.refresh_agent_caches_best_effort(
                results.iter().flatten().map(|imported| imported.agent_id.as_str()),
            )
            .await;
        }
        results
    }

    /// Best-effort refresh of several agents. Returns how many succeeded.
    pub async fn refresh_agent_caches_best_effort<'a>(
        &self,
        agent_ids: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        join_all(
            agent_ids
                .into_iter()
                .map(|agent_id| self.refresh_agent_cache_best_effort(agent_id)),
        )
        .await
        .into_iter()
        .filter(|refreshed| *refreshed)
        .count()
    }

    pub async fn export_agent_config(&self, agent_id: &str) -> Result<AgentExport> {
        validate_path_id("agent_id", agent_id)?;
        let path = format!("/admin/agents/{}/export", agent_id);
        self.get_json(&path).await
    }

    // -----------------------------------------------------------------------
    // RAG
    // -----------------------------------------------------------------------

    pub async fn query_rag(&self, params: &RagQueryParams) -> Result<RagQueryResponse> {
        params.validate()?;
        self.send_json(Method::POST, "/admin/rag/query", params, self.timeout)
            .await
    }

    /// Start indexing documents from an S3 bucket.
    pub async fn deploy_rag_from_s3(&self, params: &RagDeployParams) -> Result<RagDeployment> {
        params.validate()?;
        self.send_json(
            Method::POST,
            "/admin/rag/deployments",
            params,
            self.bulk_timeout,
        )
        .await
    }

    pub async fn get_rag_deployment_status(&self, deployment_id: &str) -> Result<RagDeployment> {
        validate_path_id("deployment_id", deployment_id)?;
        let path = format!("/admin/rag/deployments/{}", deployment_id);
        self.get_json(&path).await
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    pub async fn initiate_outbound_call(&self, params: &OutboundCallParams) -> Result<OutboundCall> {
        params.validate()?;
        self.send_json(Method::POST, "/admin/calls/outbound", params, self.timeout)
            .await
    }

    pub async fn get_call_status(&self, call_id: &str) -> Result<CallStatus> {
        validate_path_id("call_id", call_id)?;
        let path = format!("/admin/calls/{}/status", call_id);
        self.get_json(&path).await
    }

    pub async fn get_call_debug_trace(&self, call_id: &str) -> Result<CallDebugTrace> {
        validate_path_id("call_id", call_id)?;
        let path = format!("/admin/calls/{}/debug", call_id);
        self.get_json(&path).await
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let text = self
            .execute(Method::GET, path, Vec::new(), self.timeout)
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        budget: Duration,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // Serialised once: these exact bytes are both signed and sent.
        let bytes = serde_json::to_vec(body)?;
        let text = self.execute(method, path, bytes, budget).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sign and send one request, returning the response body on 2xx.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        budget: Duration,
    ) -> Result<String> {
        let (base_url, api_key) = self.credentials()?;

        let nonce = generate_nonce()?;
        let timestamp = chrono::Utc::now().timestamp();
        let signed = SignedHeaders::new(api_key, timestamp, nonce, method.as_str(), path, &body);

        let url = format!("{}{}", base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in signed.pairs() {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        debug!("Engine {} {}", method, path);
        let start = Instant::now();
        let timeout_ms = budget.as_millis() as u64;

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, timeout_ms))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, timeout_ms))?;
            Ok::<_, Error>((status, text))
        };

        let (status, text) = tokio::time::timeout(budget, exchange)
            .await
            .map_err(|_| Error::Timeout { timeout_ms })??;

        let duration = start.elapsed();
        if !status.is_success() {
            let message = remote_message(status, &text);
            debug!(
                "Engine {} {} -> {} ({}ms): {}",
                method,
                path,
                status.as_u16(),
                duration.as_millis(),
                message
            );
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        info!(
            "Engine {} {} -> {} ({}ms)",
            method,
            path,
            status.as_u16(),
            duration.as_millis()
        );
        Ok(text)
    }
}

fn ensure_shippable(config: &WorkflowConfig) -> Result<()> {
    // Re-run both passes on the wire form: a config built or edited in code
    // has never been through the structural rules.
    let raw = serde_json::to_value(config)?;
    let outcome = validate_workflow(&raw);
    if outcome.is_valid() {
        return Ok(());
    }
    let errors = &outcome.report.errors;
    let first = errors.first().map_or_else(
        || "workflow could not be decoded".to_string(),
        |issue| format!("first at {}: {}", issue.path_string(), issue.message),
    );
    Err(Error::Validation(format!(
        "workflow '{}' has {} validation error(s); {}",
        config.agent.name,
        errors.len().max(1),
        first
    )))
}

fn map_reqwest_error(error: reqwest::Error, timeout_ms: u64) -> Error {
    if error.is_timeout() {
        Error::Timeout { timeout_ms }
    } else {
        Error::Transport(error.to_string())
    }
}

/// Error text from a non-2xx body: `detail` (string or structured), then
/// `message`, then the canonical status reason.
fn remote_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_body = parsed.as_ref().and_then(|payload| {
        match payload.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => return Some(detail.clone()),
            Some(detail) if !detail.is_null() && !detail.is_string() => {
                return Some(detail.to_string())
            }
            _ => {}
        }
        payload
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    });

    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    })
}
