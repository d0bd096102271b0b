mod errors;
mod message;
mod runner;
mod runtime;
mod session;

#[cfg(test)]
mod tests;

pub use errors::AgentError;
pub use message::AgentMessage;
pub use runner::{Agent, AgentOptions};
pub use session::{IterationRecord, RunReport, Termination};
