//! Session tool construction and execution.
//!
//! Stored tool definitions are turned into [`SessionTool`]s before a call
//! starts: the model-facing JSON schema is built once, and the execution
//! config is validated up front so a misconfigured tool fails the session
//! early instead of mid-conversation. Execution itself never fails the
//! call: every outcome, including transport errors, is reported back to
//! the model as a JSON payload it can speak about.

use serde_json::{json, Map, Value};
use std::time::Duration;
use switchboard_store::Tool;
use switchboard_types::ToolExecutionType;

use crate::error::AgentError;

/// Default timeout for webhook-backed tools.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// A tool ready to be offered to the model for one call session.
#[derive(Debug, Clone)]
pub struct SessionTool {
    /// Function name exposed to the model.
    pub name: String,
    /// Description surfaced to the model.
    pub description: String,
    /// OpenAI-style function schema for the session start payload.
    pub schema: Value,
    executor: Executor,
}

#[derive(Debug, Clone)]
enum Executor {
    Webhook {
        url: String,
        headers: Vec<(String, String)>,
        timeout_secs: u64,
    },
    Static {
        value: Value,
    },
}

/// Builds session tools from stored definitions.
///
/// # Errors
///
/// Returns [`AgentError::ToolConfig`] when a definition's execution config
/// is missing required fields (a webhook without a `url`, a static return
/// without a `value`).
pub fn build_session_tools(tools: &[Tool]) -> Result<Vec<SessionTool>, AgentError> {
    tools.iter().map(build_session_tool).collect()
}

fn build_session_tool(tool: &Tool) -> Result<SessionTool, AgentError> {
    let executor = match tool.execution_type {
        ToolExecutionType::Webhook => {
            let url = tool
                .execution_config
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::ToolConfig(format!(
                        "tool '{}' has webhook execution but no url",
                        tool.tool_name
                    ))
                })?
                .to_string();
            let headers = tool
                .execution_config
                .get("headers")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(name, value)| {
                            value.as_str().map(|v| (name.clone(), v.to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let timeout_secs = tool
                .execution_config
                .get("timeout_secs")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS);
            Executor::Webhook {
                url,
                headers,
                timeout_secs,
            }
        }
        ToolExecutionType::StaticReturn => {
            let value = tool.execution_config.get("value").cloned().ok_or_else(|| {
                AgentError::ToolConfig(format!(
                    "tool '{}' has static_return execution but no value",
                    tool.tool_name
                ))
            })?;
            Executor::Static { value }
        }
    };

    Ok(SessionTool {
        name: tool.tool_name.clone(),
        description: tool.tool_description.clone(),
        schema: function_schema(tool),
        executor,
    })
}

/// OpenAI-style function schema: parameter definitions become an object
/// schema with a `required` list, closed to extra properties.
fn function_schema(tool: &Tool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in &tool.parameters {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(param.param_type.as_str().into()));
        if let Some(description) = &param.description {
            prop.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(enum_values) = &param.enum_values {
            prop.insert("enum".into(), Value::Array(enum_values.clone()));
        }
        properties.insert(param.name.clone(), Value::Object(prop));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "function",
        "name": tool.tool_name,
        "description": tool.tool_description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        },
    })
}

impl SessionTool {
    /// Executes the tool with the model-provided arguments.
    ///
    /// Infallible by contract: failures come back as `{"error": ...}`
    /// payloads so the model can relay them to the caller.
    pub async fn execute(&self, http: &reqwest::Client, arguments: &Value) -> Value {
        match &self.executor {
            Executor::Static { value } => value.clone(),
            Executor::Webhook {
                url,
                headers,
                timeout_secs,
            } => {
                let mut request = http
                    .post(url)
                    .timeout(Duration::from_secs(*timeout_secs))
                    .json(arguments);
                for (name, value) in headers {
                    request = request.header(name, value);
                }
                match request.send().await {
                    Ok(response) => {
                        let status = response.status();
                        if !status.is_success() {
                            return json!({
                                "error": format!("Webhook returned status {}", status.as_u16()),
                            });
                        }
                        match response.json::<Value>().await {
                            Ok(body) => body,
                            Err(e) => json!({"error": format!("Webhook call failed: {e}")}),
                        }
                    }
                    Err(e) if e.is_timeout() => {
                        json!({"error": format!("Webhook timed out after {timeout_secs}s")})
                    }
                    Err(e) => json!({"error": format!("Webhook call failed: {e}")}),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::{ParamType, ToolParameter};

    fn stored_tool(execution_type: ToolExecutionType, config: Value) -> Tool {
        Tool {
            id: 1,
            tool_id: "tool-1".to_string(),
            tool_name: "lookup_order".to_string(),
            tool_description: "Look up an order by ID".to_string(),
            parameters: vec![
                ToolParameter {
                    name: "order_id".to_string(),
                    param_type: ParamType::String,
                    description: Some("The order identifier".to_string()),
                    required: true,
                    enum_values: None,
                },
                ToolParameter {
                    name: "include_items".to_string(),
                    param_type: ParamType::Boolean,
                    description: None,
                    required: false,
                    enum_values: None,
                },
            ],
            execution_type,
            execution_config: config,
            created_by_email: "ops@example.com".to_string(),
            updated_by_email: "ops@example.com".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn schema_has_function_shape() {
        let tool = stored_tool(
            ToolExecutionType::StaticReturn,
            json!({"value": {"status": "ok"}}),
        );
        let built = build_session_tools(std::slice::from_ref(&tool)).expect("build tools");
        let schema = &built[0].schema;

        assert_eq!(schema["type"], "function");
        assert_eq!(schema["name"], "lookup_order");
        assert_eq!(schema["parameters"]["type"], "object");
        assert_eq!(
            schema["parameters"]["properties"]["order_id"]["type"],
            "string"
        );
        assert_eq!(
            schema["parameters"]["properties"]["include_items"]["type"],
            "boolean"
        );
        assert_eq!(schema["parameters"]["required"], json!(["order_id"]));
        assert_eq!(schema["parameters"]["additionalProperties"], json!(false));
    }

    #[tokio::test]
    async fn static_return_ignores_arguments() {
        let tool = stored_tool(
            ToolExecutionType::StaticReturn,
            json!({"value": {"hours": "9am-5pm"}}),
        );
        let built = build_session_tool(&tool).expect("build tool");
        let http = reqwest::Client::new();

        let a = built.execute(&http, &json!({"order_id": "123"})).await;
        let b = built.execute(&http, &json!({})).await;
        assert_eq!(a, json!({"hours": "9am-5pm"}));
        assert_eq!(a, b);
    }

    #[test]
    fn webhook_without_url_is_rejected() {
        let tool = stored_tool(ToolExecutionType::Webhook, json!({"timeout_secs": 5}));
        let err = build_session_tool(&tool).expect_err("missing url");
        assert!(err.to_string().contains("no url"));
    }

    #[test]
    fn static_return_without_value_is_rejected() {
        let tool = stored_tool(ToolExecutionType::StaticReturn, json!({}));
        let err = build_session_tool(&tool).expect_err("missing value");
        assert!(err.to_string().contains("no value"));
    }

    #[test]
    fn webhook_config_defaults_timeout() {
        let tool = stored_tool(
            ToolExecutionType::Webhook,
            json!({"url": "http://example.com/hook", "headers": {"x-api-key": "k"}}),
        );
        let built = build_session_tool(&tool).expect("build tool");
        match built.executor {
            Executor::Webhook {
                url,
                headers,
                timeout_secs,
            } => {
                assert_eq!(url, "http://example.com/hook");
                assert_eq!(headers, vec![("x-api-key".to_string(), "k".to_string())]);
                assert_eq!(timeout_secs, DEFAULT_WEBHOOK_TIMEOUT_SECS);
            }
            Executor::Static { .. } => panic!("expected webhook executor"),
        }
    }
}
