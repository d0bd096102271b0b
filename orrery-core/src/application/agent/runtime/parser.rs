use serde_json::Value;

use super::super::errors::AgentError;
use super::super::message::AgentMessage;

/// Extract the single structured message embedded in raw generator output.
/// The text may be wrapped in a code fence and surrounded by prose; the
/// first `{` to the last `}` is taken as the candidate object.
pub(crate) fn parse_message(raw: &str) -> Result<AgentMessage, AgentError> {
    let cleaned = strip_fences(raw);
    let candidate = extract_object(cleaned).ok_or(AgentError::NoStructuredMessage)?;

    let value: Value = serde_json::from_str(candidate)
        .map_err(|source| AgentError::MalformedMessage(source.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(AgentError::MalformedMessage(
            "expected a JSON object".to_string(),
        ));
    };

    match fields.get("message_type").and_then(Value::as_str) {
        Some("FUNCTION_CALL") => {
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::MalformedMessage("FUNCTION_CALL is missing its name field".into())
                })?
                .to_string();
            let params = fields.get("params").cloned().unwrap_or(Value::Null);
            Ok(AgentMessage::FunctionCall { name, params })
        }
        Some("FINAL_ANSWER") => {
            // Older transcripts carried the answer under `result`; both
            // spellings are accepted, `params` winning when both exist.
            let result = fields
                .get("params")
                .or_else(|| fields.get("result"))
                .cloned()
                .ok_or_else(|| {
                    AgentError::MalformedMessage(
                        "FINAL_ANSWER carries neither params nor result".into(),
                    )
                })?;
            Ok(AgentMessage::FinalAnswer { result })
        }
        Some(other) => Err(AgentError::UnknownMessageType(other.to_string())),
        None => Err(AgentError::UnknownMessageType("<missing>".to_string())),
    }
}

/// Remove one leading/trailing triple-backtick fence, tolerating an
/// optional language tag.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.trim_start();
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim_end(),
        None => rest,
    }
}

/// Greedy match from the first `{` to the last `}`. Ambiguous multi-object
/// strings deterministically yield that single span; this is a known
/// limitation.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}
