use crate::application::tooling::ToolInvokeError;
use crate::infrastructure::model::GeneratorError;
use thiserror::Error;

/// Everything that can stop a cycle. All variants are caught at the cycle
/// boundary inside the loop and turned into an error termination; none
/// escapes a run as a raw fault.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("text generation failed: {0}")]
    Generation(#[from] GeneratorError),
    #[error("no structured message found in model output")]
    NoStructuredMessage,
    #[error("malformed structured message: {0}")]
    MalformedMessage(String),
    #[error("unrecognised message type '{0}'")]
    UnknownMessageType(String),
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("missing parameter '{param}' for tool '{tool}'")]
    MissingParameter { tool: String, param: String },
    #[error("cannot coerce parameter '{param}' value {value} to {expected}")]
    TypeCoercion {
        param: String,
        value: String,
        expected: &'static str,
    },
    #[error("failed to dispatch tool '{tool}': {source}")]
    Dispatch {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}
