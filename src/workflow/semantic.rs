//! Graph-level validation.
//!
//! Checks the invariants no per-field schema can express: references between
//! nodes, intents and global intents resolve, ids are unique, and the graph
//! can terminate. Each check runs independently; a failure in one never hides
//! the findings of another.
//!
//! Reachability of every node from `initial_node` is not required. A node
//! that nothing leads to is reported as a warning only.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::Value;

use super::issue::{IssueCode, ValidationReport};
use super::types::{AnswerType, NodeKind, NodeType, Workflow, WorkflowConfig};
use crate::path;

/// Validate graph invariants of a structurally valid config.
pub fn validate_semantics(config: &WorkflowConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let workflow = &config.workflow;
    let ids: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    check_initial_node(workflow, &mut report);
    check_unique_ids(workflow, &mut report);
    check_transition_targets(workflow, &ids, &mut report);
    check_end_call_exists(workflow, &mut report);
    check_intent_references(workflow, &mut report);
    check_global_intents(workflow, &ids, &mut report);
    check_root_legacy_fields(config, &mut report);
    check_analysis_questions(workflow, &mut report);
    check_agent_transfers(config, &mut report);
    check_reachability(workflow, &ids, &mut report);

    report
}

fn check_initial_node(workflow: &Workflow, report: &mut ValidationReport) {
    if workflow.node(&workflow.initial_node).is_none() {
        report.error(
            path!["workflow", "initial_node"],
            IssueCode::InvalidInitialNode,
            format!(
                "Initial node '{}' does not match any node id",
                workflow.initial_node
            ),
        );
    }
}

fn check_unique_ids(workflow: &Workflow, report: &mut ValidationReport) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for node in &workflow.nodes {
        *counts.entry(node.id.as_str()).or_default() += 1;
    }

    for (id, count) in counts {
        if count > 1 {
            report.error(
                path!["workflow", "nodes"],
                IssueCode::DuplicateNodeId,
                format!("Node id '{}' is used by {} nodes", id, count),
            );
        }
    }
}

fn check_transition_targets(
    workflow: &Workflow,
    ids: &HashSet<&str>,
    report: &mut ValidationReport,
) {
    for node in &workflow.nodes {
        for (index, transition) in node.transitions.iter().enumerate() {
            if !ids.contains(transition.target.as_str()) {
                report.error(
                    path!["workflow", "nodes"],
                    IssueCode::DanglingTransition,
                    format!(
                        "Node '{}' transition {} targets non-existent node '{}'",
                        node.id,
                        index + 1,
                        transition.target
                    ),
                );
            }
        }
    }
}

fn check_end_call_exists(workflow: &Workflow, report: &mut ValidationReport) {
    let has_end = workflow
        .nodes
        .iter()
        .any(|n| n.node_type() == NodeType::EndCall);

    if !has_end {
        report.error(
            path!["workflow", "nodes"],
            IssueCode::MissingEndCall,
            "Workflow must contain at least one end_call node",
        );
    }
}

fn check_intent_references(workflow: &Workflow, report: &mut ValidationReport) {
    for node in &workflow.nodes {
        for transition in &node.transitions {
            let Some(intent) = transition.intent_name() else {
                continue;
            };

            let declared = node
                .intents()
                .is_some_and(|intents| intents.contains_key(intent));
            if !declared {
                report.error(
                    path!["workflow", "nodes"],
                    IssueCode::MissingIntents,
                    format!(
                        "Node '{}' uses condition 'intent:{}' but declares no intent named '{}'",
                        node.id, intent, intent
                    ),
                );
            }
        }
    }
}

fn check_global_intents(workflow: &Workflow, ids: &HashSet<&str>, report: &mut ValidationReport) {
    for (name, intent) in &workflow.global_intents {
        if !ids.contains(intent.target_node.as_str()) {
            report.error(
                path!["workflow", "global_intents", name.as_str(), "target_node"],
                IssueCode::InvalidGlobalIntentReference,
                format!(
                    "Global intent '{}' targets non-existent node '{}'",
                    name, intent.target_node
                ),
            );
        }

        let scopes = [
            ("active_from_nodes", &intent.active_from_nodes),
            ("excluded_from_nodes", &intent.excluded_from_nodes),
        ];
        for (field, scope) in scopes {
            for (index, node_id) in scope.iter().flatten().enumerate() {
                if !ids.contains(node_id.as_str()) {
                    report.error(
                        path!["workflow", "global_intents", name.as_str(), field, index],
                        IssueCode::InvalidGlobalIntentReference,
                        format!(
                            "Global intent '{}' lists non-existent node '{}' in {}",
                            name, node_id, field
                        ),
                    );
                }
            }
        }
    }
}

/// `null` and `{}` count as absent.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// The only tolerated legacy root shape: `tts: { enabled: <bool> }`.
fn is_legacy_tts(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.get("enabled").is_some_and(Value::is_boolean))
}

fn check_root_legacy_fields(config: &WorkflowConfig, report: &mut ValidationReport) {
    if let Some(tts) = config.tts.as_ref().filter(|v| !is_blank(v)) {
        if is_legacy_tts(tts) {
            report.warning(
                path!["tts"],
                IssueCode::LegacyRootTts,
                "Root-level tts.enabled is deprecated; move TTS settings to workflow.tts",
            );
        } else {
            report.error(
                path!["tts"],
                IssueCode::DeprecatedRootField,
                "Root-level tts may only contain 'enabled'; move TTS settings to workflow.tts",
            );
        }
    }

    let others = [
        ("llm", &config.llm, "workflow.llm"),
        ("stt", &config.stt, "workflow.stt"),
        ("rag", &config.rag, "workflow.rag or a node's rag"),
    ];
    for (field, value, home) in others {
        if value.as_ref().is_some_and(|v| !is_blank(v)) {
            report.error(
                path![field],
                IssueCode::DeprecatedRootField,
                format!("Root-level {} is no longer supported; use {}", field, home),
            );
        }
    }
}

fn check_analysis_questions(workflow: &Workflow, report: &mut ValidationReport) {
    let Some(analysis) = &workflow.post_call_analysis else {
        return;
    };

    for (index, question) in analysis.questions.iter().enumerate() {
        if question.answer_type == AnswerType::Enum && question.choices.is_empty() {
            report.error(
                path!["workflow", "post_call_analysis", "questions", index, "choices"],
                IssueCode::MissingChoices,
                format!(
                    "Question '{}' is of type enum and must list at least one choice",
                    question.name
                ),
            );
        }
    }
}

fn check_agent_transfers(config: &WorkflowConfig, report: &mut ValidationReport) {
    for (index, node) in config.workflow.nodes.iter().enumerate() {
        let NodeKind::AgentTransfer(transfer) = &node.kind else {
            continue;
        };

        if config.agent.id.as_deref() == Some(transfer.target_agent_id.as_str()) {
            report.error(
                path!["workflow", "nodes", index, "target_agent_id"],
                IssueCode::SelfTransfer,
                format!(
                    "Node '{}' transfers the call back to this same agent",
                    node.id
                ),
            );
        }

        if !node.transitions.is_empty() {
            report.warning(
                path!["workflow", "nodes", index, "transitions"],
                IssueCode::IgnoredTransitions,
                format!(
                    "Node '{}' hands the call to another agent; its transitions are never followed",
                    node.id
                ),
            );
        }
    }
}

/// Walk transitions from `initial_node`, adding global intent targets once a
/// node where the intent is active has been reached.
fn reachable_nodes<'a>(workflow: &'a Workflow, ids: &HashSet<&str>) -> HashSet<&'a str> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &workflow.nodes {
        edges
            .entry(node.id.as_str())
            .or_default()
            .extend(node.transitions.iter().map(|t| t.target.as_str()));
    }

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: Vec<&str> = Vec::new();
    if ids.contains(workflow.initial_node.as_str()) {
        queue.push(workflow.initial_node.as_str());
    }

    loop {
        while let Some(id) = queue.pop() {
            if !ids.contains(id) || !reached.insert(id) {
                continue;
            }
            if let Some(targets) = edges.get(id) {
                queue.extend(targets.iter().copied());
            }
        }

        for intent in workflow.global_intents.values() {
            let target = intent.target_node.as_str();
            if reached.contains(target) || !ids.contains(target) {
                continue;
            }
            if reached.iter().any(|id| intent.is_active_in(id)) {
                queue.push(target);
            }
        }

        if queue.is_empty() {
            return reached;
        }
    }
}

fn check_reachability(workflow: &Workflow, ids: &HashSet<&str>, report: &mut ValidationReport) {
    if !ids.contains(workflow.initial_node.as_str()) {
        return;
    }

    let reached = reachable_nodes(workflow, ids);
    let mut reported: BTreeSet<&str> = BTreeSet::new();
    for (index, node) in workflow.nodes.iter().enumerate() {
        if reached.contains(node.id.as_str()) || !reported.insert(node.id.as_str()) {
            continue;
        }
        report.warning(
            path!["workflow", "nodes", index],
            IssueCode::UnreachableNode,
            format!(
                "Node '{}' cannot be reached from '{}' through transitions or global intents",
                node.id, workflow.initial_node
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::issue::Issue;
    use crate::workflow::structure::validate_structure;
    use serde_json::json;

    fn scenario_a() -> Value {
        json!({
            "agent": { "name": "Test" },
            "workflow": {
                "initial_node": "greeting",
                "nodes": [
                    {
                        "id": "greeting",
                        "type": "standard",
                        "system_prompt": "Hi",
                        "transitions": [{ "condition": "caller is done", "target": "bye" }]
                    },
                    { "id": "bye", "type": "end_call" }
                ]
            }
        })
    }

    fn semantics(raw: &Value) -> ValidationReport {
        let config = validate_structure(raw).expect("structurally valid");
        validate_semantics(&config)
    }

    fn codes(issues: &[Issue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_scenario_a_passes() {
        let report = semantics(&scenario_a());
        assert!(report.errors.is_empty(), "{:#?}", report.errors);
        assert!(report.warnings.is_empty(), "{:#?}", report.warnings);
    }

    #[test]
    fn test_scenario_b_dangling_target() {
        let mut raw = scenario_a();
        raw["workflow"]["nodes"][0]["transitions"][0]["target"] = json!("nonexistent");

        let report = semantics(&raw);
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.code, IssueCode::DanglingTransition);
        assert_eq!(error.path_string(), "workflow.nodes");
        assert!(error.message.contains("greeting"));
        assert!(error.message.contains("nonexistent"));
    }

    #[test]
    fn test_missing_end_call() {
        let raw = json!({
            "agent": { "name": "Loop" },
            "workflow": {
                "initial_node": "ask",
                "nodes": [
                    {
                        "id": "ask",
                        "type": "retrieve_variable",
                        "variable_name": "zip",
                        "extraction_prompt": "Ask for the zip code",
                        "transitions": [{ "condition": "captured", "target": "confirm" }]
                    },
                    {
                        "id": "confirm",
                        "type": "standard",
                        "static_text": "Thanks",
                        "transitions": [{ "condition": "wrong", "target": "ask" }]
                    }
                ]
            }
        });

        let report = semantics(&raw);
        assert_eq!(codes(&report.errors), vec![IssueCode::MissingEndCall]);
    }

    #[test]
    fn test_intent_condition_requires_local_intent() {
        let mut raw = scenario_a();
        raw["workflow"]["nodes"][0]["transitions"][0]["condition"] = json!("intent:billing");

        let report = semantics(&raw);
        assert_eq!(codes(&report.errors), vec![IssueCode::MissingIntents]);
        assert!(report.errors[0].message.contains("'greeting'"));

        raw["workflow"]["nodes"][0]["intents"] = json!({
            "billing": { "description": "Billing questions", "examples": ["my invoice"] }
        });
        assert!(semantics(&raw).is_valid());
    }

    #[test]
    fn test_global_intent_does_not_satisfy_node_intent() {
        let mut raw = scenario_a();
        raw["workflow"]["nodes"][0]["transitions"][0]["condition"] = json!("intent:billing");
        raw["workflow"]["global_intents"] = json!({
            "billing": { "description": "Billing", "target_node": "bye" }
        });

        let report = semantics(&raw);
        assert_eq!(codes(&report.errors), vec![IssueCode::MissingIntents]);
    }

    #[test]
    fn test_checks_are_independent() {
        let raw = json!({
            "agent": { "name": "Broken" },
            "workflow": {
                "initial_node": "missing",
                "nodes": [
                    {
                        "id": "a",
                        "type": "standard",
                        "system_prompt": "x",
                        "transitions": [{ "condition": "go", "target": "nowhere" }]
                    },
                    { "id": "a", "type": "standard", "static_text": "y" }
                ],
                "global_intents": {
                    "human": {
                        "description": "Operator",
                        "target_node": "operator",
                        "excluded_from_nodes": ["ghost"]
                    }
                }
            }
        });

        let report = semantics(&raw);
        let found = codes(&report.errors);
        assert!(found.contains(&IssueCode::InvalidInitialNode));
        assert!(found.contains(&IssueCode::DuplicateNodeId));
        assert!(found.contains(&IssueCode::DanglingTransition));
        assert!(found.contains(&IssueCode::MissingEndCall));
        assert_eq!(
            found
                .iter()
                .filter(|c| **c == IssueCode::InvalidGlobalIntentReference)
                .count(),
            2
        );
    }

    #[test]
    fn test_global_intent_paths() {
        let mut raw = scenario_a();
        raw["workflow"]["global_intents"] = json!({
            "human": {
                "description": "Operator",
                "target_node": "bye",
                "active_from_nodes": ["greeting", "ghost"]
            }
        });

        let report = semantics(&raw);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.errors[0].path_string(),
            "workflow.global_intents.human.active_from_nodes[1]"
        );
    }

    #[test]
    fn test_root_tts_enabled_only_is_a_warning() {
        let mut raw = scenario_a();
        raw["tts"] = json!({ "enabled": false });

        let report = semantics(&raw);
        assert!(report.is_valid());
        assert_eq!(codes(&report.warnings), vec![IssueCode::LegacyRootTts]);
    }

    #[test]
    fn test_root_legacy_blocks_are_errors() {
        let mut raw = scenario_a();
        raw["tts"] = json!({ "enabled": true, "voice_id": "rachel" });
        raw["llm"] = json!({ "model": "gpt-4o" });
        raw["stt"] = json!({});
        raw["rag"] = Value::Null;

        let report = semantics(&raw);
        let paths: Vec<String> = report.errors.iter().map(|e| e.path_string()).collect();
        assert_eq!(paths, vec!["tts", "llm"]);
        assert!(report
            .errors
            .iter()
            .all(|e| e.code == IssueCode::DeprecatedRootField));
    }

    #[test]
    fn test_enum_question_requires_choices() {
        let mut raw = scenario_a();
        raw["workflow"]["post_call_analysis"] = json!({
            "questions": [
                { "name": "resolved", "type": "boolean" },
                { "name": "sentiment", "type": "enum" },
                { "name": "topic", "type": "enum", "choices": ["billing", "support"] }
            ]
        });

        let report = semantics(&raw);
        assert_eq!(codes(&report.errors), vec![IssueCode::MissingChoices]);
        assert_eq!(
            report.errors[0].path_string(),
            "workflow.post_call_analysis.questions[1].choices"
        );
    }

    #[test]
    fn test_self_transfer() {
        let mut raw = scenario_a();
        raw["agent"]["id"] = json!("agent-1");
        raw["workflow"]["nodes"][1] = json!({
            "id": "bye",
            "type": "agent_transfer",
            "target_agent_id": "agent-1"
        });
        raw["workflow"]["nodes"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": "end", "type": "end_call" }));

        let report = semantics(&raw);
        assert!(report.has_code(IssueCode::SelfTransfer));
    }

    #[test]
    fn test_empty_transitions_and_unreachable_nodes_are_warnings() {
        let mut raw = scenario_a();
        raw["workflow"]["nodes"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": "orphan", "type": "standard", "static_text": "Unused" }));

        let report = semantics(&raw);
        assert!(report.is_valid());
        assert_eq!(codes(&report.warnings), vec![IssueCode::UnreachableNode]);
        assert!(report.warnings[0].message.contains("orphan"));
    }

    #[test]
    fn test_global_intent_target_counts_as_reachable() {
        let mut raw = scenario_a();
        raw["workflow"]["nodes"]
            .as_array_mut()
            .unwrap()
            .push(json!({
                "id": "operator",
                "type": "agent_transfer",
                "target_agent_id": "human-desk"
            }));
        raw["workflow"]["global_intents"] = json!({
            "human": { "description": "Wants a person", "target_node": "operator" }
        });
        assert!(semantics(&raw).warnings.is_empty());

        raw["workflow"]["global_intents"]["human"]["active_from_nodes"] = json!(["bye"]);
        raw["workflow"]["global_intents"]["human"]["excluded_from_nodes"] = json!(["bye"]);
        let report = semantics(&raw);
        assert_eq!(codes(&report.warnings), vec![IssueCode::UnreachableNode]);
    }

    #[test]
    fn test_semantics_is_idempotent() {
        let mut raw = scenario_a();
        raw["workflow"]["initial_node"] = json!("nope");
        let config = validate_structure(&raw).unwrap();

        assert_eq!(validate_semantics(&config), validate_semantics(&config));
    }
}
