//! Core data models for the tool-calling agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::error::AgentError;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Static display class of a tool, fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// Output is condensed by a second model call before the user sees it.
    Search,
    /// Output is printed verbatim.
    Code,
}

//
// ================= Message =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_name: Option<String>,
    #[serde(skip, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, tool_name: Option<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content, Some(tool_name.into()))
    }
}

//
// ================= Tool catalog =================
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Declarative description of a tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Required string parameters
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Function-calling schema entry as accepted by the chat endpoint.
    pub fn to_catalog_entry(&self) -> Value {
        let required: Vec<&str> = self.parameters.iter().map(|p| p.name).collect();
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({ "type": "string", "description": p.description }),
                )
            })
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "required": required,
                    "properties": properties,
                }
            }
        })
    }
}

//
// ================= Tool calls =================
//

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Parse one entry of a model's `tool_calls` array.
    ///
    /// Arguments may arrive as an object or as a string holding a JSON object.
    pub fn from_raw(raw: &Value) -> std::result::Result<Self, AgentError> {
        let function = raw
            .get("function")
            .ok_or_else(|| AgentError::MalformedToolCall(format!("missing 'function': {}", raw)))?;

        let name = function
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AgentError::MalformedToolCall(format!("missing 'name': {}", raw)))?;

        let arguments = match function.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(AgentError::MalformedToolCall(format!(
                        "arguments for '{}' are not a JSON object: {}",
                        name, text
                    )))
                }
            },
            _ => {
                return Err(AgentError::MalformedToolCall(format!(
                    "missing 'arguments' for '{}': {}",
                    name, raw
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            arguments,
        })
    }
}

/// Output of one executed tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub class: ToolClass,
    pub output: String,
    /// True when `output` is a rendered error rather than the tool's own text
    pub failed: bool,
}

//
// ================= Model handle =================
//

/// The model identifier chosen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle(String);

impl ModelHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
