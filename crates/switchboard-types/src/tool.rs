//! Tool (function-calling) definitions.
//!
//! A tool is a function schema an assistant may invoke mid-call. The schema
//! is stored with the tool record and materialized into the speech session;
//! execution is either an outbound webhook or a fixed return value.

use serde::{Deserialize, Serialize};

/// How a tool invocation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionType {
    /// POST the call arguments to a configured URL and return the response.
    Webhook,
    /// Return a configured value, ignoring the arguments.
    StaticReturn,
}

impl ToolExecutionType {
    /// Returns the wire label for this execution type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::StaticReturn => "static_return",
        }
    }

    /// Attempts to parse a wire label into an execution type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(Self::Webhook),
            "static_return" => Some(Self::StaticReturn),
            _ => None,
        }
    }
}

/// JSON schema types allowed for tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Returns the JSON schema type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Attempts to parse a JSON schema type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }
}

/// One named parameter of a tool's function schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name as it appears in the schema properties.
    pub name: String,
    /// JSON schema type of the parameter.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Optional description surfaced to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter is listed in the schema's `required` array.
    #[serde(default)]
    pub required: bool,
    /// Optional closed set of allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

/// Validates a tool name: lowercase snake_case, starting with a letter or
/// underscore (`^[a-z_][a-z0-9_]*$`).
pub fn is_valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
