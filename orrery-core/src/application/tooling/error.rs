use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn tool server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool server transport error: {0}")]
    Transport(String),
    #[error("tool server message could not be encoded: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("tool server returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool server terminated unexpectedly")]
    Terminated,
    #[error("tool server request cancelled")]
    Cancelled,
}
