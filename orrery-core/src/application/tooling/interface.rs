use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::error::ToolInvokeError;

/// The three-operation session contract the orchestrator depends on.
/// Implemented by the stdio transport in production and by stubs in tests.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn initialize(&self) -> Result<(), ToolInvokeError>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError>;
}

/// One entry of the tool catalogue, fetched once at session start and
/// immutable afterwards. Parameters keep their declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParamSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

/// Closed coercion table keyed by the declared schema type. Schema types
/// outside the known set fall back to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    Array,
    Text,
}

impl ParamKind {
    pub fn from_schema(declared: &str) -> Self {
        match declared {
            "integer" => ParamKind::Integer,
            "number" => ParamKind::Number,
            "array" => ParamKind::Array,
            _ => ParamKind::Text,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Array => "array",
            ParamKind::Text => "string",
        }
    }
}

impl ToolDescriptor {
    /// Build a descriptor from an MCP `inputSchema` object
    /// (`properties: name -> {type}`, plus an optional `required` array).
    pub fn from_input_schema(name: String, description: Option<String>, schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(param_name, info)| ParamSpec {
                        name: param_name.clone(),
                        kind: info
                            .get("type")
                            .and_then(Value::as_str)
                            .map(ParamKind::from_schema)
                            .unwrap_or(ParamKind::Text),
                        required: required.contains(&param_name.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            description,
            parameters,
        }
    }
}
