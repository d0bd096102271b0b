use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::errors::AgentError;
use super::message::AgentMessage;
use super::runtime::{ToolRuntime, coerce_arguments, parse_message};
use super::session::{IterationRecord, RunReport, SessionState, Termination};
use crate::application::tooling::ToolTransport;
use crate::config::{AppConfig, FinalAnswerPolicy};
use crate::infrastructure::model::{GuardedGenerator, TextGenerator};

const DEFAULT_MAX_ITERATIONS: u32 = 14;
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_SENTINEL_TOOL: &str = "send_email";

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    pub max_iterations: u32,
    pub generation_timeout: Duration,
    pub sentinel_tool: String,
    pub final_answer_policy: FinalAnswerPolicy,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            sentinel_tool: DEFAULT_SENTINEL_TOOL.to_string(),
            final_answer_policy: FinalAnswerPolicy::default(),
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_iterations: config.max_iterations,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            sentinel_tool: config.sentinel_tool.clone(),
            final_answer_policy: config.final_answer_policy,
        }
    }
}

enum CycleOutcome {
    Continue,
    Final,
    Sentinel,
}

/// The orchestration loop. One `run` per session: establish the tool
/// session, fetch the catalogue once, then cycle through prompt-build →
/// guarded generation → parse → dispatch until a terminal state.
pub struct Agent<G: TextGenerator + 'static> {
    generator: GuardedGenerator<G>,
    transport: Arc<dyn ToolTransport>,
    options: AgentOptions,
}

impl<G: TextGenerator + 'static> Agent<G> {
    pub fn new(generator: G, transport: Arc<dyn ToolTransport>, options: AgentOptions) -> Self {
        Self {
            generator: GuardedGenerator::new(generator, options.generation_timeout),
            transport,
            options,
        }
    }

    /// Drive a full session. Every failure is caught at the cycle boundary
    /// and folded into the report; this never returns a raw fault.
    pub async fn run(&self, query: String) -> RunReport {
        info!("Agent run started");
        let mut state = SessionState::new(query);

        let runtime = match self.establish_runtime().await {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(%err, "Failed to establish tool session");
                return state.finish(
                    Termination::Error,
                    Some(format!("failed to establish tool session: {err}")),
                );
            }
        };
        let instructions = runtime.compose_system_instructions();

        loop {
            if state.iteration >= self.options.max_iterations {
                info!(
                    iterations = state.iteration,
                    "Iteration ceiling reached; stopping"
                );
                return state.finish(Termination::IterationLimit, None);
            }

            let cycle = state.iteration + 1;
            let prompt = format!("{instructions}\n\nQuery: {}", state.running_query);

            match self.step(&runtime, &mut state, &prompt).await {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::Final) => {
                    info!("Agent delivered final answer");
                    return state.finish(Termination::FinalAnswer, None);
                }
                Ok(CycleOutcome::Sentinel) => {
                    info!(tool = %self.options.sentinel_tool, "Sentinel tool fired");
                    return state.finish(Termination::SentinelTool, None);
                }
                Err(err) => {
                    warn!(cycle, %err, "Cycle failed; terminating run");
                    let note = format!("Error in iteration {cycle}: {err}");
                    state.transcript.push(IterationRecord {
                        index: cycle,
                        tool_name: None,
                        arguments: Value::Null,
                        outcome: note.clone(),
                    });
                    return state.finish(Termination::Error, Some(note));
                }
            }
        }
    }

    async fn establish_runtime(&self) -> Result<ToolRuntime, AgentError> {
        self.transport
            .initialize()
            .await
            .map_err(|source| AgentError::Dispatch {
                tool: "initialize".to_string(),
                source,
            })?;
        let tools = self
            .transport
            .list_tools()
            .await
            .map_err(|source| AgentError::Dispatch {
                tool: "list_tools".to_string(),
                source,
            })?;
        info!(tools = tools.len(), "Tool catalogue fetched");
        Ok(ToolRuntime::new(tools, Arc::clone(&self.transport)))
    }

    async fn step(
        &self,
        runtime: &ToolRuntime,
        state: &mut SessionState,
        prompt: &str,
    ) -> Result<CycleOutcome, AgentError> {
        debug!(cycle = state.iteration + 1, "Starting cycle");
        let raw = self
            .generator
            .generate(&self.options.model, prompt)
            .await?;

        match parse_message(&raw)? {
            AgentMessage::FunctionCall { name, params } => {
                let descriptor = runtime
                    .descriptor(&name)
                    .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;
                let tool_name = descriptor.name.clone();
                let arguments = coerce_arguments(&params, descriptor)?;

                let execution = runtime.execute(&tool_name, arguments.clone()).await?;

                let index = state.iteration + 1;
                let rendered_args = serde_json::to_string(&arguments).unwrap_or_default();
                let summary = format!(
                    "In the {index} iteration you called {tool_name} with {rendered_args} \
                     parameters, and the function returned {result}.",
                    result = execution.result_text,
                );

                state.transcript.push(IterationRecord {
                    index,
                    tool_name: Some(tool_name.clone()),
                    arguments: Value::Object(arguments),
                    outcome: execution.result_text.clone(),
                });
                state.last_result = Some(Value::String(execution.result_text));
                state.fold_summary(&summary);
                state.iteration += 1;

                if tool_name.eq_ignore_ascii_case(&self.options.sentinel_tool) {
                    return Ok(CycleOutcome::Sentinel);
                }
                Ok(CycleOutcome::Continue)
            }
            AgentMessage::FinalAnswer { result } => {
                info!("Final answer received");
                state.final_answer = Some(result.clone());
                state.last_result = Some(result.clone());
                state.iteration += 1;

                match self.options.final_answer_policy {
                    FinalAnswerPolicy::Stop => Ok(CycleOutcome::Final),
                    FinalAnswerPolicy::Continue => {
                        let summary = format!(
                            "You already produced the final answer {result}. Deliver it with \
                             the remaining tools, or repeat FINAL_ANSWER if nothing is left."
                        );
                        state.fold_summary(&summary);
                        Ok(CycleOutcome::Continue)
                    }
                }
            }
        }
    }
}
