//! Workflow JSON Schema.
//!
//! Describes the base shape of a workflow config. The node union is resolved
//! with one `if/then` pair per `type` tag so that every failing field of a
//! node is reported separately. Rules spanning several fields (exactly one of
//! `system_prompt`/`static_text` and so on) are not expressed here; they live
//! in [`structure`](super::structure) as refinements.

use serde_json::{json, Value};

use super::types::NodeType;

/// JSON Schema for workflow configs.
pub fn workflow_schema() -> Value {
    let node_tags: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();

    let variant_rules: Vec<Value> = NodeType::ALL
        .iter()
        .map(|t| {
            json!({
                "if": {
                    "properties": { "type": { "const": t.as_str() } },
                    "required": ["type"]
                },
                "then": { "$ref": format!("#/$defs/{}_node", t.as_str()) }
            })
        })
        .collect();

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["agent", "workflow"],
        "properties": {
            "agent": { "$ref": "#/$defs/agent" },
            "workflow": { "$ref": "#/$defs/workflow" }
        },
        "$defs": {
            "priority": {
                "type": "integer",
                "minimum": i32::MIN,
                "maximum": i32::MAX
            },
            "agent": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "name": { "type": "string", "minLength": 1, "maxLength": 128 },
                    "version": { "type": "string" },
                    "description": { "type": "string", "maxLength": 2048 }
                }
            },
            "workflow": {
                "type": "object",
                "required": ["initial_node", "nodes"],
                "properties": {
                    "initial_node": { "type": "string", "minLength": 1 },
                    "nodes": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "$ref": "#/$defs/node" }
                    },
                    "global_intents": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/global_intent" }
                    },
                    "global_intent_config": { "$ref": "#/$defs/intent_config" },
                    "llm": { "$ref": "#/$defs/llm" },
                    "tts": { "$ref": "#/$defs/tts" },
                    "stt": { "$ref": "#/$defs/stt" },
                    "rag": { "$ref": "#/$defs/rag" },
                    "interruptions_enabled": { "type": "boolean" },
                    "post_call_analysis": { "$ref": "#/$defs/post_call_analysis" }
                }
            },
            "node": {
                "type": "object",
                "required": ["id", "type"],
                "properties": {
                    "id": { "type": "string", "minLength": 1, "maxLength": 128 },
                    "name": { "type": "string" },
                    "type": { "type": "string", "enum": node_tags },
                    "interruptions_enabled": { "type": ["boolean", "null"] },
                    "transitions": {
                        "type": "array",
                        "items": { "$ref": "#/$defs/transition" }
                    },
                    "actions": { "$ref": "#/$defs/actions" }
                },
                "allOf": variant_rules
            },
            "standard_node": {
                "properties": {
                    "system_prompt": { "type": "string", "minLength": 1 },
                    "static_text": { "type": "string", "minLength": 1 },
                    "rag": { "$ref": "#/$defs/rag" },
                    "llm": { "$ref": "#/$defs/llm" },
                    "intents": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/intent" }
                    },
                    "intent_config": { "$ref": "#/$defs/intent_config" }
                }
            },
            "retrieve_variable_node": {
                "properties": {
                    "variables": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "$ref": "#/$defs/variable_extraction" }
                    },
                    "variable_name": { "type": "string", "minLength": 1 },
                    "extraction_prompt": { "type": "string", "minLength": 1 }
                }
            },
            "end_call_node": {
                "properties": {
                    "transitions": { "type": "array" }
                }
            },
            "agent_transfer_node": {
                "required": ["target_agent_id"],
                "properties": {
                    "target_agent_id": { "type": "string", "minLength": 1 },
                    "transfer_context": { "type": "boolean" },
                    "transfer_message": { "type": "string" }
                }
            },
            "api_call_node": {
                "required": ["api_call"],
                "properties": {
                    "api_call": { "$ref": "#/$defs/api_call" },
                    "static_text": { "type": "string" }
                }
            },
            "transition": {
                "type": "object",
                "required": ["condition", "target"],
                "properties": {
                    "condition": { "type": "string", "minLength": 1 },
                    "target": { "type": "string", "minLength": 1 },
                    "priority": { "$ref": "#/$defs/priority" }
                }
            },
            "intent": {
                "type": "object",
                "required": ["description"],
                "properties": {
                    "description": { "type": "string", "minLength": 1 },
                    "examples": { "type": "array", "items": { "type": "string" } },
                    "priority": { "$ref": "#/$defs/priority" }
                }
            },
            "intent_config": {
                "type": "object",
                "properties": {
                    "confidence_threshold": { "type": "number", "minimum": 0, "maximum": 1 },
                    "context_turns": { "type": "integer", "minimum": 1, "maximum": 50 }
                }
            },
            "global_intent": {
                "type": "object",
                "required": ["description", "target_node"],
                "properties": {
                    "description": { "type": "string", "minLength": 1 },
                    "examples": { "type": "array", "items": { "type": "string" } },
                    "target_node": { "type": "string", "minLength": 1 },
                    "priority": { "$ref": "#/$defs/priority" },
                    "active_from_nodes": { "type": "array", "items": { "type": "string" } },
                    "excluded_from_nodes": { "type": "array", "items": { "type": "string" } }
                }
            },
            "variable_extraction": {
                "type": "object",
                "required": ["variable_name", "extraction_prompt"],
                "properties": {
                    "variable_name": {
                        "type": "string",
                        "pattern": "^[A-Za-z_][A-Za-z0-9_]*$"
                    },
                    "extraction_prompt": { "type": "string", "minLength": 1 },
                    "required": { "type": "boolean" }
                }
            },
            "api_call": {
                "type": "object",
                "required": ["url"],
                "properties": {
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                    },
                    "url": { "type": "string", "pattern": "^https?://" },
                    "headers": {
                        "type": "object",
                        "additionalProperties": { "type": "string" }
                    },
                    "body": {},
                    "timeout_ms": { "type": "integer", "minimum": 100, "maximum": 30000 },
                    "retry": {
                        "type": "object",
                        "properties": {
                            "max_attempts": { "type": "integer", "minimum": 0, "maximum": 5 },
                            "backoff_ms": { "type": "integer", "minimum": 0, "maximum": 10000 }
                        }
                    },
                    "response_extraction": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["variable_name", "path"],
                            "properties": {
                                "variable_name": { "type": "string", "minLength": 1 },
                                "path": { "type": "string", "minLength": 1 },
                                "default": {}
                            }
                        }
                    }
                }
            },
            "actions": {
                "type": "object",
                "properties": {
                    "on_entry": { "type": "array", "items": { "$ref": "#/$defs/action" } },
                    "on_exit": { "type": "array", "items": { "$ref": "#/$defs/action" } }
                }
            },
            "action": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 }
                }
            },
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "model": { "type": "string" },
                    "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                    "max_tokens": { "type": "integer", "minimum": 1, "maximum": u32::MAX }
                }
            },
            "tts": {
                "type": "object",
                "properties": {
                    "enabled": { "type": "boolean" },
                    "provider": { "type": "string" },
                    "voice_id": { "type": "string" },
                    "model": { "type": "string" },
                    "speed": { "type": "number", "minimum": 0.5, "maximum": 2 },
                    "stability": { "type": "number", "minimum": 0, "maximum": 1 },
                    "similarity_boost": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            },
            "stt": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "model": { "type": "string" },
                    "language": { "type": "string" },
                    "keywords": { "type": "array", "items": { "type": "string" } }
                }
            },
            "rag": {
                "type": "object",
                "properties": {
                    "enabled": { "type": "boolean" },
                    "collection": { "type": "string" },
                    "top_k": { "type": "integer", "minimum": 1, "maximum": 50 },
                    "similarity_threshold": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            },
            "post_call_analysis": {
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "type"],
                            "properties": {
                                "name": { "type": "string", "minLength": 1 },
                                "description": { "type": "string" },
                                "type": {
                                    "type": "string",
                                    "enum": ["string", "number", "boolean", "enum"]
                                },
                                "choices": { "type": "array", "items": { "type": "string" } }
                            }
                        }
                    }
                }
            }
        }
    })
}
