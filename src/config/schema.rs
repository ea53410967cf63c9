use serde_json::{json, Value};
use std::sync::LazyLock;

/// Structural schema for config.yaml. Unknown keys fail `additionalProperties`
/// and are reported as warnings by the parser.
pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "harbor": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "url": { "type": "string" },
                    "username": { "type": "string" },
                    "secret": { "type": "string" },
                    "credentials_file": { "type": "string" },
                    "credentials_base64": { "type": "string" },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "auth_timeout_secs": { "type": "integer", "minimum": 1 },
                    "page_size": { "type": "integer", "minimum": 1, "maximum": 100 }
                }
            },
            "logging": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "enabled": { "type": "boolean" },
                    "structured": { "type": "boolean" },
                    "level": { "type": "string" }
                }
            },
            "session": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "history_size": { "type": "integer", "minimum": 0 },
                    "call_log_capacity": { "type": "integer", "minimum": 1 }
                }
            }
        }
    })
});
