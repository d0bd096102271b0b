use serde_json::{Map as JsonMap, Value};
use tracing::{debug, info, warn};

use super::super::errors::AgentError;
use super::ToolRuntime;

pub(crate) struct ToolExecution {
    pub tool: String,
    pub result_text: String,
}

impl ToolRuntime {
    /// Dispatch one call through the transport and fold the result content
    /// into a single text form for the transcript.
    pub(crate) async fn execute(
        &self,
        tool: &str,
        arguments: JsonMap<String, Value>,
    ) -> Result<ToolExecution, AgentError> {
        debug!(tool = %tool, "Dispatching tool call");
        match self.transport.call_tool(tool, Value::Object(arguments)).await {
            Ok(result) => {
                let execution = ToolExecution {
                    tool: tool.to_string(),
                    result_text: render_result(&result),
                };
                info!(tool = %execution.tool, "Tool executed");
                Ok(execution)
            }
            Err(source) => {
                warn!(tool = %tool, %source, "Tool dispatch failed");
                Err(AgentError::Dispatch {
                    tool: tool.to_string(),
                    source,
                })
            }
        }
    }
}

/// Results usually arrive as `{content: [{type: "text", text}]}`; a single
/// text block becomes the bare text, several become a bracketed list.
/// Anything else is rendered as compact JSON.
fn render_result(result: &Value) -> String {
    if let Some(blocks) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        match texts.as_slice() {
            [] => {}
            [single] => return (*single).to_string(),
            many => return format!("[{}]", many.join(", ")),
        }
    }

    match result {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
