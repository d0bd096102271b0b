use serde::Serialize;
use serde_json::Value;

/// Append-only record of one completed cycle; the ordered sequence forms
/// the transcript folded into later prompts.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub index: u32,
    pub tool_name: Option<String>,
    pub arguments: Value,
    pub outcome: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    FinalAnswer,
    IterationLimit,
    SentinelTool,
    Error,
}

/// What a run leaves behind. The transcript survives on every path,
/// including error terminations, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub termination: Termination,
    pub iterations: u32,
    pub final_answer: Option<Value>,
    pub last_result: Option<Value>,
    pub failure: Option<String>,
    pub transcript: Vec<IterationRecord>,
}

/// Mutable run state owned by a single loop instance. Created at session
/// start and consumed into a `RunReport` at the terminal state, so there is
/// nothing left over to reset between runs.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub iteration: u32,
    pub last_result: Option<Value>,
    pub final_answer: Option<Value>,
    pub transcript: Vec<IterationRecord>,
    pub running_query: String,
}

impl SessionState {
    pub(crate) fn new(query: String) -> Self {
        Self {
            iteration: 0,
            last_result: None,
            final_answer: None,
            transcript: Vec::new(),
            running_query: query,
        }
    }

    /// Extend the running query with the latest cycle summary and ask for
    /// the next step.
    pub(crate) fn fold_summary(&mut self, summary: &str) {
        self.running_query.push_str("\n\n");
        self.running_query.push_str(summary);
        self.running_query.push_str("  What should I do next?");
    }

    pub(crate) fn finish(self, termination: Termination, failure: Option<String>) -> RunReport {
        RunReport {
            termination,
            iterations: self.iteration,
            final_answer: self.final_answer,
            last_result: self.last_result,
            failure,
            transcript: self.transcript,
        }
    }
}
