//! Workflow graph model, loading, and validation.
//!
//! Validation runs in two passes:
//! - Structural: shape, types, ranges and per-node field rules
//! - Semantic: graph invariants across nodes, intents and global intents
//!
//! The semantic pass only runs on documents that pass the structural one.

mod format;
mod issue;
mod parser;
mod schema;
mod semantic;
mod structure;
mod types;

use serde::Serialize;
use serde_json::Value;

pub use format::{
    format_node_summary, format_path, format_structural_issues, format_validation_errors,
};
pub use issue::{Issue, IssueCode, PathSegment, ValidationReport};
pub use parser::{parse_document, parse_document_file, DocumentFormat};
pub use schema::workflow_schema;
pub use semantic::validate_semantics;
pub use structure::validate_structure;
pub use types::*;

/// Result of running both validation passes.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// Typed config, present whenever the structural pass succeeded.
    #[serde(skip)]
    pub config: Option<WorkflowConfig>,
    #[serde(flatten)]
    pub report: ValidationReport,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.config.is_some() && self.report.is_valid()
    }

    /// The config, only if it may be saved or shipped.
    pub fn into_valid_config(self) -> Option<WorkflowConfig> {
        if self.report.is_valid() {
            self.config
        } else {
            None
        }
    }
}

/// Validate a raw workflow document end to end.
pub fn validate_workflow(raw: &Value) -> ValidationOutcome {
    match validate_structure(raw) {
        Ok(config) => {
            let report = validate_semantics(&config);
            ValidationOutcome {
                config: Some(config),
                report,
            }
        }
        Err(issues) => ValidationOutcome {
            config: None,
            report: ValidationReport::from_structural(issues),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_document_yields_config() {
        let raw = json!({
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
        });

        let outcome = validate_workflow(&raw);
        assert!(outcome.is_valid());
        let config = outcome.into_valid_config().unwrap();
        assert_eq!(config.workflow.nodes.len(), 2);
    }

    #[test]
    fn test_structural_failure_skips_semantics() {
        let raw = json!({
            "agent": { "name": "Test" },
            "workflow": {
                "initial_node": "missing",
                "nodes": [{ "id": "a", "type": "standard" }]
            }
        });

        let outcome = validate_workflow(&raw);
        assert!(outcome.config.is_none());
        assert!(outcome.report.has_code(IssueCode::MissingAlternative));
        assert!(!outcome.report.has_code(IssueCode::InvalidInitialNode));
    }

    #[test]
    fn test_semantic_errors_withhold_config() {
        let raw = json!({
            "agent": { "name": "Test" },
            "workflow": {
                "initial_node": "a",
                "nodes": [{ "id": "a", "type": "standard", "static_text": "x" }]
            }
        });

        let outcome = validate_workflow(&raw);
        assert!(outcome.config.is_some());
        assert!(!outcome.is_valid());
        assert!(outcome.into_valid_config().is_none());
    }

    #[test]
    fn test_outcome_serializes_report() {
        let raw = json!({ "agent": { "name": "x" } });
        let json = serde_json::to_value(validate_workflow(&raw)).unwrap();
        assert_eq!(json["errors"][0]["code"], "missing_field");
        assert_eq!(json["errors"][0]["path"], json!(["workflow"]));
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }
}
