use super::*;
use crate::application::tooling::{ToolDescriptor, ToolInvokeError, ToolTransport};
use crate::config::FinalAnswerPolicy;
use crate::infrastructure::model::{GeneratorError, TextGenerator};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Clone)]
struct ScriptedGenerator {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(String::from).collect(),
            )),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, GeneratorError> {
        self.prompts.lock().await.push(prompt.to_string());
        let mut responses = self.responses.lock().await;
        match responses.len() {
            0 => Err(GeneratorError::EmptyResponse),
            // The last response repeats so scripts can run out the ceiling.
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.remove(0)),
        }
    }
}

#[derive(Clone)]
struct StubTransport {
    tools: Vec<ToolDescriptor>,
    results: Arc<Mutex<Vec<Value>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    fail_calls: bool,
    fail_initialize: bool,
}

impl StubTransport {
    fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            results: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_calls: false,
            fail_initialize: false,
        }
    }

    fn with_results(self, results: Vec<Value>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            ..self
        }
    }

    fn failing_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolTransport for StubTransport {
    async fn initialize(&self) -> Result<(), ToolInvokeError> {
        if self.fail_initialize {
            return Err(ToolInvokeError::Terminated);
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        if self.fail_calls {
            return Err(ToolInvokeError::Rpc {
                code: -32000,
                message: "tool blew up".to_string(),
            });
        }
        self.calls
            .lock()
            .await
            .push((tool.to_string(), arguments));
        let mut results = self.results.lock().await;
        if results.is_empty() {
            Ok(json!({"content": [{"type": "text", "text": "ok"}]}))
        } else {
            Ok(results.remove(0))
        }
    }
}

fn add_tool() -> ToolDescriptor {
    ToolDescriptor::from_input_schema(
        "add".to_string(),
        Some("Add two numbers".to_string()),
        &json!({
            "properties": {
                "a": { "type": "integer" },
                "b": { "type": "integer" }
            },
            "required": ["a", "b"]
        }),
    )
}

fn send_email_tool() -> ToolDescriptor {
    ToolDescriptor::from_input_schema(
        "send_email".to_string(),
        Some("Send the final answer by email".to_string()),
        &json!({
            "properties": {
                "message": { "type": "string" }
            }
        }),
    )
}

fn options(max_iterations: u32) -> AgentOptions {
    AgentOptions {
        max_iterations,
        generation_timeout: Duration::from_secs(5),
        ..AgentOptions::default()
    }
}

fn text_result(text: &str) -> Value {
    json!({"content": [{"type": "text", "text": text}]})
}

#[tokio::test]
async fn end_to_end_add_query() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"add","params":{"a":5,"b":3}}"#,
        r#"{"message_type":"FINAL_ANSWER","params":"8"}"#,
    ]);
    let transport =
        Arc::new(StubTransport::new(vec![add_tool()]).with_results(vec![text_result("8")]));
    let agent = Agent::new(generator.clone(), transport.clone(), options(14));

    let report = agent.run("add 5 and 3".to_string()).await;

    assert_eq!(report.termination, Termination::FinalAnswer);
    assert_eq!(report.iterations, 2);
    assert_eq!(report.final_answer, Some(json!("8")));
    assert!(report.failure.is_none());

    assert_eq!(report.transcript.len(), 1);
    let record = &report.transcript[0];
    assert_eq!(record.index, 1);
    assert_eq!(record.tool_name.as_deref(), Some("add"));
    assert_eq!(record.arguments, json!({"a": 5, "b": 3}));
    assert_eq!(record.outcome, "8");

    let calls = transport.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "add");
    assert_eq!(calls[0].1, json!({"a": 5, "b": 3}));

    let prompts = generator.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("add(a: integer, b: integer)"));
    assert!(prompts[0].contains("Query: add 5 and 3"));
    assert!(prompts[1].contains("returned 8"));
    assert!(prompts[1].contains("What should I do next?"));
}

#[tokio::test]
async fn sentinel_tool_terminates_on_the_same_cycle() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"send_email","params":{"message":"42"}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool(), send_email_tool()]));
    let agent = Agent::new(generator, transport.clone(), options(14));

    let report = agent.run("mail me the answer".to_string()).await;

    assert_eq!(report.termination, Termination::SentinelTool);
    assert_eq!(report.iterations, 1);
    assert_eq!(report.transcript.len(), 1);
    assert_eq!(report.transcript[0].tool_name.as_deref(), Some("send_email"));
    assert_eq!(transport.calls().await.len(), 1);
}

#[tokio::test]
async fn never_exceeds_the_iteration_ceiling() {
    // One repeating FUNCTION_CALL: the run can only end at the ceiling.
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"add","params":{"a":1,"b":1}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator.clone(), transport.clone(), options(5));

    let report = agent.run("keep adding".to_string()).await;

    assert_eq!(report.termination, Termination::IterationLimit);
    assert_eq!(report.iterations, 5);
    assert_eq!(report.transcript.len(), 5);
    assert_eq!(transport.calls().await.len(), 5);
    assert_eq!(generator.prompts().await.len(), 5);
}

#[tokio::test]
async fn unknown_tool_terminates_with_error() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"frobnicate","params":{}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator, transport.clone(), options(14));

    let report = agent.run("do something odd".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert_eq!(report.iterations, 0);
    let failure = report.failure.expect("failure note");
    assert!(failure.contains("unknown tool"));
    assert!(failure.contains("iteration 1"));
    assert_eq!(report.transcript.len(), 1);
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn coercion_failure_terminates_with_error() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"add","params":{"a":"five","b":3}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator, transport.clone(), options(14));

    let report = agent.run("add badly".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert!(report.failure.expect("failure note").contains("cannot coerce"));
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn dispatch_failure_appends_error_record() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FUNCTION_CALL","name":"add","params":{"a":1,"b":2}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]).failing_calls());
    let agent = Agent::new(generator, transport, options(14));

    let report = agent.run("add 1 and 2".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert_eq!(report.transcript.len(), 1);
    assert!(report.transcript[0].outcome.contains("failed to dispatch"));
    assert!(report.transcript[0].outcome.contains("tool blew up"));
}

struct StalledGenerator;

#[async_trait]
impl TextGenerator for StalledGenerator {
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GeneratorError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn generation_failure_terminates_with_error() {
    // An empty script makes every generate call fail.
    let generator = ScriptedGenerator::new(vec![]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator, transport.clone(), options(14));

    let report = agent.run("add 1 and 2".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert_eq!(report.iterations, 0);
    let failure = report.failure.expect("failure note");
    assert!(failure.contains("text generation failed"));
    assert!(failure.contains("iteration 1"));
    assert_eq!(report.transcript.len(), 1);
    assert!(transport.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_terminates_with_error() {
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(StalledGenerator, transport.clone(), options(14));

    let report = agent.run("add 1 and 2".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    let failure = report.failure.expect("failure note");
    assert!(failure.contains("text generation failed"));
    assert!(failure.contains("timed out"));
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn unparseable_response_terminates_with_error() {
    let generator = ScriptedGenerator::new(vec!["I have no idea what to do next."]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator, transport, options(14));

    let report = agent.run("add 1 and 2".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert!(
        report
            .failure
            .expect("failure note")
            .contains("no structured message")
    );
}

#[tokio::test]
async fn session_setup_failure_is_reported() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FINAL_ANSWER","params":"unreached"}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]).failing_initialize());
    let agent = Agent::new(generator.clone(), transport, options(14));

    let report = agent.run("anything".to_string()).await;

    assert_eq!(report.termination, Termination::Error);
    assert!(
        report
            .failure
            .expect("failure note")
            .contains("failed to establish tool session")
    );
    assert!(generator.prompts().await.is_empty());
}

#[tokio::test]
async fn continue_policy_runs_past_the_final_answer() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FINAL_ANSWER","params":"8"}"#,
        r#"{"message_type":"FUNCTION_CALL","name":"send_email","params":{"message":"8"}}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool(), send_email_tool()]));
    let mut opts = options(14);
    opts.final_answer_policy = FinalAnswerPolicy::Continue;
    let agent = Agent::new(generator.clone(), transport.clone(), opts);

    let report = agent.run("add then mail".to_string()).await;

    assert_eq!(report.termination, Termination::SentinelTool);
    assert_eq!(report.iterations, 2);
    assert_eq!(report.final_answer, Some(json!("8")));
    assert_eq!(transport.calls().await.len(), 1);

    let prompts = generator.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("already produced the final answer"));
}

#[tokio::test]
async fn stop_policy_ends_on_the_final_answer_cycle() {
    let generator = ScriptedGenerator::new(vec![
        r#"{"message_type":"FINAL_ANSWER","params":"done"}"#,
    ]);
    let transport = Arc::new(StubTransport::new(vec![add_tool()]));
    let agent = Agent::new(generator, transport.clone(), options(14));

    let report = agent.run("just answer".to_string()).await;

    assert_eq!(report.termination, Termination::FinalAnswer);
    assert_eq!(report.iterations, 1);
    assert_eq!(report.final_answer, Some(json!("done")));
    assert!(report.transcript.is_empty());
    assert!(transport.calls().await.is_empty());
}
