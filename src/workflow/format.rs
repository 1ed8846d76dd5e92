//! Human-readable rendering of validation results.
//!
//! Output is deterministic for identical input so it can be compared against
//! golden text.

use super::issue::{Issue, PathSegment, ValidationReport};
use super::types::{NodeKind, Workflow};

/// Render a full report, errors first.
pub fn format_validation_errors(report: &ValidationReport) -> String {
    if report.errors.is_empty() && report.warnings.is_empty() {
        return "Validation passed.".to_string();
    }

    let mut out = String::new();
    if report.errors.is_empty() {
        out.push_str(&format!(
            "Validation passed with {}:\n",
            plural(report.warnings.len(), "warning")
        ));
        push_issues(&mut out, &report.warnings);
        return out;
    }

    out.push_str(&format!(
        "Validation failed with {}:\n",
        plural(report.errors.len(), "error")
    ));
    push_issues(&mut out, &report.errors);

    if !report.warnings.is_empty() {
        out.push_str(&format!("\n{}:\n", capitalize(&plural(report.warnings.len(), "warning"))));
        push_issues(&mut out, &report.warnings);
    }
    out
}

/// Render issues from the structural pass alone.
pub fn format_structural_issues(issues: &[Issue]) -> String {
    format_validation_errors(&ValidationReport::from_structural(issues.to_vec()))
}

/// Label for a path, e.g. `Workflow > Nodes > item 1 > System Prompt`.
pub fn format_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "Document".to_string();
    }

    path.iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => friendly_key(key),
            PathSegment::Index(index) => format!("item {}", index + 1),
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

/// One line per node: marker, label, type and a short detail.
///
/// The initial node is marked with `*`.
pub fn format_node_summary(workflow: &Workflow) -> String {
    let mut out = String::new();
    for node in &workflow.nodes {
        let marker = if node.id == workflow.initial_node { '*' } else { ' ' };
        let detail = match &node.kind {
            NodeKind::RetrieveVariable(retrieve) => {
                let names: Vec<String> = retrieve
                    .extractions()
                    .into_iter()
                    .map(|e| e.variable_name)
                    .collect();
                format!("collects {}", names.join(", "))
            }
            NodeKind::ApiCall(api) => {
                format!("{} {}", api.api_call.method.as_str(), api.api_call.url)
            }
            NodeKind::AgentTransfer(transfer) => format!("to {}", transfer.target_agent_id),
            NodeKind::Standard(_) | NodeKind::EndCall(_) => {
                plural(node.transitions.len(), "transition")
            }
        };
        out.push_str(&format!(
            "{} {} [{}] {}\n",
            marker,
            node.label(),
            node.node_type(),
            detail
        ));
    }
    out
}

fn push_issues(out: &mut String, issues: &[Issue]) {
    for issue in issues {
        out.push_str(&format!("  - {}: {}\n", format_path(&issue.path), issue.message));
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn friendly_key(key: &str) -> String {
    let known = match key {
        "agent" => "Agent",
        "workflow" => "Workflow",
        "id" => "ID",
        "initial_node" => "Initial Node",
        "nodes" => "Nodes",
        "type" => "Node Type",
        "system_prompt" => "System Prompt",
        "static_text" => "Static Text",
        "variables" => "Variables",
        "variable_name" => "Variable Name",
        "extraction_prompt" => "Extraction Prompt",
        "target_agent_id" => "Target Agent",
        "transfer_message" => "Transfer Message",
        "api_call" => "API Call",
        "url" => "URL",
        "timeout_ms" => "Timeout (ms)",
        "transitions" => "Transitions",
        "target" => "Target Node",
        "intents" => "Intents",
        "global_intents" => "Global Intents",
        "target_node" => "Target Node",
        "llm" => "LLM",
        "tts" => "TTS",
        "stt" => "STT",
        "rag" => "RAG",
        "top_k" => "Top K",
        "post_call_analysis" => "Post-Call Analysis",
        "on_entry" => "On Entry Actions",
        "on_exit" => "On Exit Actions",
        _ => return title_case(key),
    };
    known.to_string()
}

/// `camelCase` and `snake_case` keys to `Title Case`.
fn title_case(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ")
}
