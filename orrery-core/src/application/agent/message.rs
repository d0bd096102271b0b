use serde_json::Value;

/// One structured message extracted from generator output, consumed once
/// per cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    FunctionCall { name: String, params: Value },
    FinalAnswer { result: Value },
}
