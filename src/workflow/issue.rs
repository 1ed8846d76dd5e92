//! Validation issues and reports.

use serde::{Deserialize, Serialize};

/// One step in the path from the document root to an offending value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // Structural
    InvalidType,
    MissingField,
    InvalidEnumValue,
    TooSmall,
    TooBig,
    InvalidFormat,
    UnrecognizedKeys,
    InvalidValue,
    ConflictingFields,
    MissingAlternative,
    TerminalTransitions,

    // Semantic
    InvalidInitialNode,
    DuplicateNodeId,
    DanglingTransition,
    MissingEndCall,
    MissingIntents,
    InvalidGlobalIntentReference,
    DeprecatedRootField,
    LegacyRootTts,
    MissingChoices,
    SelfTransfer,
    IgnoredTransitions,
    UnreachableNode,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::InvalidType => "invalid_type",
            IssueCode::MissingField => "missing_field",
            IssueCode::InvalidEnumValue => "invalid_enum_value",
            IssueCode::TooSmall => "too_small",
            IssueCode::TooBig => "too_big",
            IssueCode::InvalidFormat => "invalid_format",
            IssueCode::UnrecognizedKeys => "unrecognized_keys",
            IssueCode::InvalidValue => "invalid_value",
            IssueCode::ConflictingFields => "conflicting_fields",
            IssueCode::MissingAlternative => "missing_alternative",
            IssueCode::TerminalTransitions => "terminal_transitions",
            IssueCode::InvalidInitialNode => "invalid_initial_node",
            IssueCode::DuplicateNodeId => "duplicate_node_id",
            IssueCode::DanglingTransition => "dangling_transition",
            IssueCode::MissingEndCall => "missing_end_call",
            IssueCode::MissingIntents => "missing_intents",
            IssueCode::InvalidGlobalIntentReference => "invalid_global_intent_reference",
            IssueCode::DeprecatedRootField => "deprecated_root_field",
            IssueCode::LegacyRootTts => "legacy_root_tts",
            IssueCode::MissingChoices => "missing_choices",
            IssueCode::SelfTransfer => "self_transfer",
            IssueCode::IgnoredTransitions => "ignored_transitions",
            IssueCode::UnreachableNode => "unreachable_node",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding, addressed by path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub message: String,
    pub code: IssueCode,
}

impl Issue {
    pub fn new(path: Vec<PathSegment>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            code,
        }
    }

    /// Dot/bracket form of the path, e.g. `workflow.nodes[0].system_prompt`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push_str(&format!("[{}]", index));
                }
            }
        }
        out
    }
}

/// Build a path from mixed keys and indices: `path!["workflow", "nodes", 2]`.
#[macro_export]
macro_rules! path {
    ($($segment:expr),* $(,)?) => {
        vec![$($crate::workflow::PathSegment::from($segment)),*]
    };
}

/// Errors block a save or activation; warnings never do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, path: Vec<PathSegment>, code: IssueCode, message: impl Into<String>) {
        self.errors.push(Issue::new(path, code, message));
    }

    pub fn warning(&mut self, path: Vec<PathSegment>, code: IssueCode, message: impl Into<String>) {
        self.warnings.push(Issue::new(path, code, message));
    }

    /// Report for a document that failed structural validation.
    pub fn from_structural(issues: Vec<Issue>) -> Self {
        Self {
            errors: issues,
            warnings: Vec::new(),
        }
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|issue| issue.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_string() {
        let issue = Issue::new(
            crate::path!["workflow", "nodes", 0usize, "system_prompt"],
            IssueCode::MissingField,
            "Required",
        );
        assert_eq!(issue.path_string(), "workflow.nodes[0].system_prompt");
    }

    #[test]
    fn test_issue_code_serializes_snake_case() {
        let json = serde_json::to_value(IssueCode::MissingIntents).unwrap();
        assert_eq!(json, "missing_intents");
        assert_eq!(IssueCode::MissingIntents.as_str(), "missing_intents");
    }

    #[test]
    fn test_path_serializes_mixed() {
        let issue = Issue::new(
            crate::path!["workflow", "nodes", 3usize],
            IssueCode::DuplicateNodeId,
            "dup",
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["path"], serde_json::json!(["workflow", "nodes", 3]));
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut report = ValidationReport::default();
        report.warning(crate::path!["tts"], IssueCode::LegacyRootTts, "deprecated");
        assert!(report.is_valid());

        report.error(crate::path!["workflow"], IssueCode::MissingEndCall, "no end");
        assert!(!report.is_valid());
    }
}
