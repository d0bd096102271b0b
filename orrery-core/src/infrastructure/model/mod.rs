mod gemini;
mod guard;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use guard::GuardedGenerator;

/// Single-shot text generation seam. The orchestrator only ever sees this
/// trait; vendor wiring lives behind it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeneratorError>;
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("generation response contained no text")]
    EmptyResponse,
    #[error("generation task failed: {0}")]
    Task(String),
}
