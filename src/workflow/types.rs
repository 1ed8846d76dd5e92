//! Workflow type definitions.
//!
//! A [`WorkflowConfig`] is one immutable version of an agent's dialogue graph.
//! Maps use `BTreeMap` so that serialisation and validation output are stable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix marking a transition condition as a reference to a node-local intent.
pub const INTENT_CONDITION_PREFIX: &str = "intent:";

/// Root artifact for one agent version.
///
/// # Example JSON
///
/// ```json
/// {
///   "agent": { "name": "Support line" },
///   "workflow": {
///     "initial_node": "greeting",
///     "nodes": [
///       { "id": "greeting", "type": "standard", "system_prompt": "Greet the caller",
///         "transitions": [{ "condition": "caller said goodbye", "target": "bye" }] },
///       { "id": "bye", "type": "end_call" }
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub agent: AgentMeta,

    pub workflow: Workflow,

    /// Deprecated root-level blocks. Kept raw so the semantic pass can tell
    /// the tolerated `tts: {enabled}` shape apart from real drift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<Value>,
}

/// Agent identity for a workflow version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMeta {
    /// Engine-side agent id, absent for agents that have never been imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The dialogue graph plus workflow-wide tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Id of the node the conversation starts in
    pub initial_node: String,

    pub nodes: Vec<Node>,

    /// Intents evaluated ahead of node-local transitions, keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub global_intents: BTreeMap<String, GlobalIntent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_intent_config: Option<IntentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stt: Option<SttConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<RagConfig>,

    /// Default for nodes that leave `interruptions_enabled` unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruptions_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_call_analysis: Option<PostCallAnalysis>,
}

impl Workflow {
    /// Look up a node by id. Returns the first match if ids are duplicated.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One step of the conversation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `None` inherits the workflow default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruptions_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<NodeActions>,

    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Display label: the name when set, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Intents declared on this node. Only `standard` nodes declare any.
    pub fn intents(&self) -> Option<&BTreeMap<String, Intent>> {
        match &self.kind {
            NodeKind::Standard(standard) => Some(&standard.intents),
            _ => None,
        }
    }
}

/// Variant payload of a node, keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Standard(StandardNode),
    RetrieveVariable(RetrieveVariableNode),
    EndCall(EndCallNode),
    AgentTransfer(AgentTransferNode),
    ApiCall(ApiCallNode),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Standard(_) => NodeType::Standard,
            NodeKind::RetrieveVariable(_) => NodeType::RetrieveVariable,
            NodeKind::EndCall(_) => NodeType::EndCall,
            NodeKind::AgentTransfer(_) => NodeType::AgentTransfer,
            NodeKind::ApiCall(_) => NodeType::ApiCall,
        }
    }
}

/// Bare node tag, for code that needs the variant without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Standard,
    RetrieveVariable,
    EndCall,
    AgentTransfer,
    ApiCall,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Standard,
        NodeType::RetrieveVariable,
        NodeType::EndCall,
        NodeType::AgentTransfer,
        NodeType::ApiCall,
    ];

    /// Wire tag, as it appears in `"type"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Standard => "standard",
            NodeType::RetrieveVariable => "retrieve_variable",
            NodeType::EndCall => "end_call",
            NodeType::AgentTransfer => "agent_transfer",
            NodeType::ApiCall => "api_call",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM-driven conversational step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Fixed text spoken verbatim instead of prompting the LLM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<RagConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intents: BTreeMap<String, Intent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_config: Option<IntentConfig>,
}

/// Collects variables from the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveVariableNode {
    /// Batch mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<VariableExtraction>>,

    /// Legacy single-variable mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_prompt: Option<String>,
}

impl RetrieveVariableNode {
    /// Normalise both modes into a list of extractions.
    pub fn extractions(&self) -> Vec<VariableExtraction> {
        match (&self.variables, &self.variable_name, &self.extraction_prompt) {
            (Some(batch), _, _) => batch.clone(),
            (None, Some(name), Some(prompt)) => vec![VariableExtraction {
                variable_name: name.clone(),
                extraction_prompt: prompt.clone(),
                required: false,
            }],
            _ => Vec::new(),
        }
    }
}

/// A single variable to extract from the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableExtraction {
    pub variable_name: String,
    pub extraction_prompt: String,
    #[serde(default)]
    pub required: bool,
}

/// Terminal node: hangs up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndCallNode {}

/// Hands the call to another agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTransferNode {
    pub target_agent_id: String,

    /// Pass the conversation so far to the receiving agent
    #[serde(default)]
    pub transfer_context: bool,

    /// Spoken before the handover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_message: Option<String>,
}

/// Calls an external HTTP API mid-conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallNode {
    pub api_call: ApiCallConfig,

    /// Spoken while waiting for the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallConfig {
    #[serde(default)]
    pub method: HttpMethod,

    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,

    /// Response fields copied into conversation variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_extraction: Vec<ResponseExtraction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseExtraction {
    pub variable_name: String,
    /// Dot path into the JSON response, e.g. `data.customer.name`
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Directed, conditioned edge to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub condition: String,
    pub target: String,
    #[serde(default)]
    pub priority: i32,
}

impl Transition {
    /// Name of the referenced intent when the condition is `intent:<name>`.
    pub fn intent_name(&self) -> Option<&str> {
        self.condition
            .strip_prefix(INTENT_CONDITION_PREFIX)
            .map(str::trim)
    }
}

/// Node-local, example-driven trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    /// Conversation turns considered when classifying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_turns: Option<u32>,
}

/// Workflow-wide intent, checked before node-local transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalIntent {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    pub target_node: String,
    #[serde(default)]
    pub priority: i32,
    /// Only evaluated while in one of these nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_from_nodes: Option<Vec<String>>,
    /// Never evaluated while in one of these nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_from_nodes: Option<Vec<String>>,
}

impl GlobalIntent {
    /// Whether the intent can fire while the conversation is in `node_id`.
    pub fn is_active_in(&self, node_id: &str) -> bool {
        let included = self
            .active_from_nodes
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == node_id));
        let excluded = self
            .excluded_from_nodes
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == node_id));
        included && !excluded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeActions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_entry: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_exit: Vec<Action>,
}

/// Side effect run by the engine on node entry/exit. Parameters are opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Vocabulary hints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
}

/// Questions answered by the engine once a call has ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostCallAnalysis {
    #[serde(default)]
    pub questions: Vec<AnalysisQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisQuestion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub answer_type: AnswerType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    String,
    Number,
    Boolean,
    Enum,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kind_resolved_by_type_tag() {
        let node: Node = serde_json::from_value(json!({
            "id": "handoff",
            "type": "agent_transfer",
            "target_agent_id": "billing-agent",
            "transfer_context": true,
            "transitions": []
        }))
        .unwrap();

        assert_eq!(node.node_type(), NodeType::AgentTransfer);
        match node.kind {
            NodeKind::AgentTransfer(transfer) => {
                assert_eq!(transfer.target_agent_id, "billing-agent");
                assert!(transfer.transfer_context);
                assert!(transfer.transfer_message.is_none());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_end_call_serializes_with_tag() {
        let node = Node {
            id: "bye".into(),
            name: None,
            interruptions_enabled: None,
            transitions: Vec::new(),
            actions: None,
            kind: NodeKind::EndCall(EndCallNode {}),
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value, json!({"id": "bye", "type": "end_call"}));
    }

    #[test]
    fn test_interruptions_tri_state() {
        let unset: Node =
            serde_json::from_value(json!({"id": "a", "type": "end_call"})).unwrap();
        let off: Node = serde_json::from_value(
            json!({"id": "a", "type": "end_call", "interruptions_enabled": false}),
        )
        .unwrap();

        assert_eq!(unset.interruptions_enabled, None);
        assert_eq!(off.interruptions_enabled, Some(false));
    }

    #[test]
    fn test_transition_intent_name() {
        let intent = Transition {
            condition: "intent:billing".into(),
            target: "billing".into(),
            priority: 0,
        };
        let free_form = Transition {
            condition: "caller asks about invoices".into(),
            target: "billing".into(),
            priority: 0,
        };

        assert_eq!(intent.intent_name(), Some("billing"));
        assert_eq!(free_form.intent_name(), None);
    }

    #[test]
    fn test_retrieve_variable_legacy_mode_normalizes() {
        let node = RetrieveVariableNode {
            variables: None,
            variable_name: Some("account_number".into()),
            extraction_prompt: Some("Ask for the account number".into()),
        };

        let extractions = node.extractions();
        assert_eq!(extractions.len(), 1);
        assert_eq!(extractions[0].variable_name, "account_number");
    }

    #[test]
    fn test_global_intent_scope() {
        let intent = GlobalIntent {
            description: "Caller wants a human".into(),
            examples: vec!["agent please".into()],
            target_node: "transfer".into(),
            priority: 1,
            active_from_nodes: Some(vec!["menu".into(), "billing".into()]),
            excluded_from_nodes: Some(vec!["billing".into()]),
        };

        assert!(intent.is_active_in("menu"));
        assert!(!intent.is_active_in("billing"));
        assert!(!intent.is_active_in("greeting"));
    }

    #[test]
    fn test_node_type_parse() {
        assert_eq!(NodeType::parse("api_call"), Some(NodeType::ApiCall));
        assert_eq!(NodeType::parse("apiCall"), None);
    }
}
