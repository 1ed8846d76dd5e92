//! Workflow document loader.
//!
//! Documents are read into a raw [`Value`] rather than a [`WorkflowConfig`]
//! so that structural validation can report every problem, not just the first
//! one serde trips over.
//!
//! [`WorkflowConfig`]: super::types::WorkflowConfig

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Source format of a workflow document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from a file extension. Anything other than
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// Parse a workflow document into a raw JSON value.
pub fn parse_document(text: &str, format: DocumentFormat) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(Error::Parse("Empty workflow document".to_string()));
    }

    match format {
        DocumentFormat::Json => serde_json::from_str(text)
            .map_err(|e| Error::Parse(format!("Invalid JSON: {}", e))),
        DocumentFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|e| Error::Parse(format!("Invalid YAML: {}", e))),
    }
}

/// Read and parse a workflow document from disk.
pub fn parse_document_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    parse_document(&content, DocumentFormat::from_path(path)).map_err(|e| match e {
        Error::Parse(msg) => Error::Parse(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
