use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{GeneratorError, TextGenerator};

/// Wraps a generator with a hard wall-clock timeout. The call runs as its
/// own task so a stalled provider can be abandoned; on timeout the task is
/// aborted and the caller sees `GeneratorError::Timeout`.
pub struct GuardedGenerator<G: ?Sized> {
    inner: Arc<G>,
    timeout: Duration,
}

impl<G: TextGenerator + 'static> GuardedGenerator<G> {
    pub fn new(generator: G, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(generator),
            timeout,
        }
    }

    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeneratorError> {
        let generator = Arc::clone(&self.inner);
        let model = model.to_owned();
        let prompt = prompt.to_owned();

        debug!("Starting guarded generation");
        let mut task = tokio::spawn(async move { generator.generate(&model, &prompt).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(GeneratorError::Task(join_error.to_string())),
            Err(_elapsed) => {
                warn!(timeout = ?self.timeout, "Generation timed out; aborting task");
                task.abort();
                Err(GeneratorError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct InstantGenerator;

    #[async_trait]
    impl TextGenerator for InstantGenerator {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GeneratorError> {
            Ok("hello".to_string())
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GeneratorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn passes_through_fast_responses() {
        let guard = GuardedGenerator::new(InstantGenerator, Duration::from_secs(10));
        let text = guard.generate("m", "p").await.expect("generation succeeds");
        assert_eq!(text, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_stalled_generation() {
        let guard = GuardedGenerator::new(StalledGenerator, Duration::from_secs(10));
        let error = guard.generate("m", "p").await.expect_err("must time out");
        assert!(matches!(error, GeneratorError::Timeout(_)));
    }
}
