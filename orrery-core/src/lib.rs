mod application;
mod config;
mod infrastructure;

pub use application::{agent, tooling};
pub use config::{AppConfig, ConfigError, FinalAnswerPolicy, ServerConfig};
pub use infrastructure::model;
