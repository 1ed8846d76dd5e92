//! Structural validation of raw workflow documents.
//!
//! Runs in two layers over the raw JSON value:
//!
//! 1. The JSON Schema from [`schema`](super::schema), with every error
//!    collected rather than stopping at the first one.
//! 2. Per-variant refinements that need to look at several fields at once.
//!    They run on every node whose `type` tag is known, even when other parts
//!    of the document already failed, so operators see every problem in one
//!    pass.
//!
//! Only a document with zero issues is decoded into a [`WorkflowConfig`].

use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::issue::{Issue, IssueCode, PathSegment};
use super::schema::workflow_schema;
use super::types::{NodeType, WorkflowConfig};
use crate::path;

fn schema_validator() -> std::result::Result<&'static Validator, &'static str> {
    static VALIDATOR: OnceLock<std::result::Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| jsonschema::validator_for(&workflow_schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(String::as_str)
}

/// Validate the shape of a raw workflow document.
///
/// Returns the typed config, or every structural issue found. Issues are
/// sorted by path so identical input always yields identical output.
pub fn validate_structure(raw: &Value) -> std::result::Result<WorkflowConfig, Vec<Issue>> {
    let validator = match schema_validator() {
        Ok(validator) => validator,
        Err(e) => {
            return Err(vec![Issue::new(
                Vec::new(),
                IssueCode::InvalidValue,
                format!("Workflow schema could not be compiled: {}", e),
            )])
        }
    };

    let mut issues: Vec<Issue> = validator
        .iter_errors(raw)
        .map(|error| issue_from_schema_error(&error))
        .collect();

    refine_nodes(raw, &mut issues);

    issues.sort();
    issues.dedup();

    if !issues.is_empty() {
        return Err(issues);
    }

    WorkflowConfig::deserialize(&integral_floats_as_integers(raw)).map_err(|e| {
        vec![Issue::new(
            Vec::new(),
            IssueCode::InvalidType,
            format!("Workflow could not be decoded: {}", e),
        )]
    })
}

/// JSON Schema counts `1.0` as an integer; serde does not. Rewrite integral
/// floats so that every value the schema accepts also decodes.
fn integral_floats_as_integers(value: &Value) -> Value {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(f) if number.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(integral_floats_as_integers).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), integral_floats_as_integers(item)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn issue_from_schema_error(error: &ValidationError<'_>) -> Issue {
    let mut path = parse_pointer(&error.instance_path.to_string());

    let (code, message) = match &error.kind {
        ValidationErrorKind::Required { property } => {
            if let Some(name) = property.as_str() {
                path.push(PathSegment::Key(name.to_string()));
            }
            (IssueCode::MissingField, "Required".to_string())
        }
        ValidationErrorKind::Type { .. } => (IssueCode::InvalidType, error.to_string()),
        ValidationErrorKind::Enum { .. } | ValidationErrorKind::Constant { .. } => {
            (IssueCode::InvalidEnumValue, error.to_string())
        }
        ValidationErrorKind::MinLength { .. }
        | ValidationErrorKind::MinItems { .. }
        | ValidationErrorKind::Minimum { .. }
        | ValidationErrorKind::ExclusiveMinimum { .. } => (IssueCode::TooSmall, error.to_string()),
        ValidationErrorKind::MaxLength { .. }
        | ValidationErrorKind::MaxItems { .. }
        | ValidationErrorKind::Maximum { .. }
        | ValidationErrorKind::ExclusiveMaximum { .. } => (IssueCode::TooBig, error.to_string()),
        ValidationErrorKind::Pattern { .. } | ValidationErrorKind::Format { .. } => {
            (IssueCode::InvalidFormat, error.to_string())
        }
        ValidationErrorKind::AdditionalProperties { .. } => {
            (IssueCode::UnrecognizedKeys, error.to_string())
        }
        _ => (IssueCode::InvalidValue, error.to_string()),
    };

    Issue::new(path, code, message)
}

/// Split a JSON pointer (`/workflow/nodes/0/id`) into path segments.
fn parse_pointer(pointer: &str) -> Vec<PathSegment> {
    pointer
        .split('/')
        .skip(1)
        .map(|token| {
            let token = token.replace("~1", "/").replace("~0", "~");
            match token.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(token),
            }
        })
        .collect()
}

fn is_present(node: &Map<String, Value>, key: &str) -> bool {
    node.get(key).is_some_and(|v| !v.is_null())
}

fn refine_nodes(raw: &Value, issues: &mut Vec<Issue>) {
    let Some(nodes) = raw.pointer("/workflow/nodes").and_then(Value::as_array) else {
        return;
    };

    for (index, node) in nodes.iter().enumerate() {
        let Some(node) = node.as_object() else {
            continue;
        };
        let Some(node_type) = node
            .get("type")
            .and_then(Value::as_str)
            .and_then(NodeType::parse)
        else {
            continue;
        };

        match node_type {
            NodeType::Standard => refine_standard(index, node, issues),
            NodeType::RetrieveVariable => refine_retrieve_variable(index, node, issues),
            NodeType::EndCall => refine_end_call(index, node, issues),
            NodeType::AgentTransfer | NodeType::ApiCall => {}
        }
    }
}

fn refine_standard(index: usize, node: &Map<String, Value>, issues: &mut Vec<Issue>) {
    let prompt = is_present(node, "system_prompt");
    let text = is_present(node, "static_text");

    if prompt && text {
        issues.push(Issue::new(
            path!["workflow", "nodes", index],
            IssueCode::ConflictingFields,
            "Provide either system_prompt or static_text, not both",
        ));
    } else if !prompt && !text {
        issues.push(Issue::new(
            path!["workflow", "nodes", index],
            IssueCode::MissingAlternative,
            "Either system_prompt or static_text is required",
        ));
    }
}

fn refine_retrieve_variable(index: usize, node: &Map<String, Value>, issues: &mut Vec<Issue>) {
    let batch = is_present(node, "variables");
    let name = is_present(node, "variable_name");
    let prompt = is_present(node, "extraction_prompt");

    if batch && (name || prompt) {
        issues.push(Issue::new(
            path!["workflow", "nodes", index],
            IssueCode::ConflictingFields,
            "Use either a variables list or variable_name/extraction_prompt, not both",
        ));
        return;
    }

    if !batch && !name && !prompt {
        issues.push(Issue::new(
            path!["workflow", "nodes", index],
            IssueCode::MissingAlternative,
            "Either a variables list or variable_name with extraction_prompt is required",
        ));
        return;
    }

    if !batch {
        for (field, present) in [("variable_name", name), ("extraction_prompt", prompt)] {
            if !present {
                issues.push(Issue::new(
                    path!["workflow", "nodes", index, field],
                    IssueCode::MissingField,
                    "Required when extracting a single variable",
                ));
            }
        }
    }
}

fn refine_end_call(index: usize, node: &Map<String, Value>, issues: &mut Vec<Issue>) {
    let has_transitions = node
        .get("transitions")
        .and_then(Value::as_array)
        .is_some_and(|t| !t.is_empty());

    if has_transitions {
        issues.push(Issue::new(
            path!["workflow", "nodes", index, "transitions"],
            IssueCode::TerminalTransitions,
            "end_call nodes are terminal and cannot have transitions",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::NodeKind;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "agent": { "name": "Test" },
            "workflow": {
                "initial_node": "greeting",
                "nodes": [
                    {
                        "id": "greeting",
                        "type": "standard",
                        "system_prompt": "Hi",
                        "transitions": [{ "condition": "done", "target": "bye" }]
                    },
                    { "id": "bye", "type": "end_call" }
                ]
            }
        })
    }

    fn codes_at(issues: &[Issue], path: &str) -> Vec<IssueCode> {
        issues
            .iter()
            .filter(|i| i.path_string() == path)
            .map(|i| i.code)
            .collect()
    }

    #[test]
    fn test_minimal_workflow_is_valid() {
        let config = validate_structure(&minimal()).unwrap();
        assert_eq!(config.agent.name, "Test");
        assert_eq!(config.workflow.nodes.len(), 2);
        assert!(matches!(
            config.workflow.nodes[1].kind,
            NodeKind::EndCall(_)
        ));
    }

    #[test]
    fn test_standard_with_both_prompt_and_static_text() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][0]["static_text"] = json!("Hello there");

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0]"),
            vec![IssueCode::ConflictingFields]
        );
    }

    #[test]
    fn test_standard_with_neither_prompt_nor_static_text() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][0]
            .as_object_mut()
            .unwrap()
            .remove("system_prompt");

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0]"),
            vec![IssueCode::MissingAlternative]
        );
    }

    #[test]
    fn test_reports_all_independent_problems() {
        let raw = json!({
            "agent": { "name": "" },
            "workflow": {
                "initial_node": "greeting",
                "nodes": [
                    { "id": "greeting", "type": "standard" },
                    { "id": "ask", "type": "retrieve_variable" },
                    { "type": "end_call" },
                    { "id": "weird", "type": "teleport" },
                    {
                        "id": "lookup",
                        "type": "api_call",
                        "api_call": { "url": "ftp://example.com", "timeout_ms": 5 }
                    }
                ]
            }
        });

        let issues = validate_structure(&raw).unwrap_err();
        assert!(issues.len() >= 7, "got {:#?}", issues);

        assert_eq!(codes_at(&issues, "agent.name"), vec![IssueCode::TooSmall]);
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0]"),
            vec![IssueCode::MissingAlternative]
        );
        assert_eq!(
            codes_at(&issues, "workflow.nodes[1]"),
            vec![IssueCode::MissingAlternative]
        );
        assert_eq!(
            codes_at(&issues, "workflow.nodes[2].id"),
            vec![IssueCode::MissingField]
        );
        assert!(codes_at(&issues, "workflow.nodes[3].type").contains(&IssueCode::InvalidEnumValue));
        assert_eq!(
            codes_at(&issues, "workflow.nodes[4].api_call.url"),
            vec![IssueCode::InvalidFormat]
        );
        assert_eq!(
            codes_at(&issues, "workflow.nodes[4].api_call.timeout_ms"),
            vec![IssueCode::TooSmall]
        );
    }

    #[test]
    fn test_validation_is_idempotent() {
        let raw = json!({
            "agent": {},
            "workflow": { "initial_node": 3, "nodes": [{ "id": "x", "type": "standard" }] }
        });

        let first = validate_structure(&raw).unwrap_err();
        let second = validate_structure(&raw).unwrap_err();
        assert_eq!(first, second);
    }

    #[test]
    fn test_retrieve_variable_modes() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][0] = json!({
            "id": "greeting",
            "type": "retrieve_variable",
            "variables": [{ "variable_name": "email", "extraction_prompt": "Ask for email" }],
            "variable_name": "phone"
        });
        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0]"),
            vec![IssueCode::ConflictingFields]
        );

        raw["workflow"]["nodes"][0] = json!({
            "id": "greeting",
            "type": "retrieve_variable",
            "variable_name": "phone"
        });
        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0].extraction_prompt"),
            vec![IssueCode::MissingField]
        );

        raw["workflow"]["nodes"][0] = json!({
            "id": "greeting",
            "type": "retrieve_variable",
            "variables": []
        });
        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0].variables"),
            vec![IssueCode::TooSmall]
        );

        raw["workflow"]["nodes"][0] = json!({
            "id": "greeting",
            "type": "retrieve_variable",
            "variable_name": "phone",
            "extraction_prompt": "Ask for the caller's phone number",
            "transitions": [{ "condition": "captured", "target": "bye" }]
        });
        assert!(validate_structure(&raw).is_ok());
    }

    #[test]
    fn test_end_call_cannot_have_transitions() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][1]["transitions"] =
            json!([{ "condition": "again", "target": "greeting" }]);

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[1].transitions"),
            vec![IssueCode::TerminalTransitions]
        );
    }

    #[test]
    fn test_agent_transfer_requires_target() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][1] = json!({ "id": "bye", "type": "agent_transfer" });

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[1].target_agent_id"),
            vec![IssueCode::MissingField]
        );
    }

    #[test]
    fn test_missing_workflow_and_non_object_root() {
        let issues = validate_structure(&json!({ "agent": { "name": "x" } })).unwrap_err();
        assert_eq!(codes_at(&issues, "workflow"), vec![IssueCode::MissingField]);

        let issues = validate_structure(&json!("not a workflow")).unwrap_err();
        assert_eq!(codes_at(&issues, ""), vec![IssueCode::InvalidType]);
    }

    #[test]
    fn test_tuning_ranges() {
        let mut raw = minimal();
        raw["workflow"]["llm"] = json!({ "temperature": 3.5 });
        raw["workflow"]["nodes"][0]["rag"] = json!({ "top_k": 100 });

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.llm.temperature"),
            vec![IssueCode::TooBig]
        );
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0].rag.top_k"),
            vec![IssueCode::TooBig]
        );
    }

    #[test]
    fn test_integral_floats_decode() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][0]["transitions"][0]["priority"] = json!(2.0);
        raw["workflow"]["llm"] = json!({ "max_tokens": 512.0, "temperature": 1.0 });

        let config = validate_structure(&raw).unwrap();
        assert_eq!(config.workflow.nodes[0].transitions[0].priority, 2);
        let llm = config.workflow.llm.unwrap();
        assert_eq!(llm.max_tokens, Some(512));
        assert_eq!(llm.temperature, Some(1.0));
    }

    #[test]
    fn test_out_of_range_integers_are_reported_at_the_field() {
        let mut raw = minimal();
        raw["workflow"]["nodes"][0]["transitions"][0]["priority"] = json!(3_000_000_000u64);
        raw["workflow"]["llm"] = json!({ "max_tokens": 5_000_000_000u64 });
        raw["workflow"]["global_intents"] = json!({
            "human": { "description": "Operator", "target_node": "bye", "priority": -3_000_000_000i64 }
        });

        let issues = validate_structure(&raw).unwrap_err();
        assert_eq!(
            codes_at(&issues, "workflow.nodes[0].transitions[0].priority"),
            vec![IssueCode::TooBig]
        );
        assert_eq!(
            codes_at(&issues, "workflow.llm.max_tokens"),
            vec![IssueCode::TooBig]
        );
        assert_eq!(
            codes_at(&issues, "workflow.global_intents.human.priority"),
            vec![IssueCode::TooSmall]
        );
        assert!(codes_at(&issues, "").is_empty());
    }

    #[test]
    fn test_root_legacy_fields_pass_structure() {
        let mut raw = minimal();
        raw["tts"] = json!({ "enabled": true });
        raw["llm"] = json!({ "model": "gpt-4o" });

        let config = validate_structure(&raw).unwrap();
        assert_eq!(config.tts, Some(json!({ "enabled": true })));
        assert!(config.llm.is_some());
    }

    #[test]
    fn test_parse_pointer() {
        assert!(parse_pointer("").is_empty());
        assert_eq!(
            parse_pointer("/workflow/global_intents/a~1b/target_node"),
            vec![
                PathSegment::Key("workflow".into()),
                PathSegment::Key("global_intents".into()),
                PathSegment::Key("a/b".into()),
                PathSegment::Key("target_node".into()),
            ]
        );
        assert_eq!(parse_pointer("/nodes/2")[1], PathSegment::Index(2));
    }
}
