use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_CONFIG_PATH: &str = "config/orrery.toml";
const DEFAULT_MAX_ITERATIONS: u32 = 14;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SENTINEL_TOOL: &str = "send_email";
const DEFAULT_QUERY: &str = "Find the ASCII values of the characters in INDIA, \
return the sum of squares of those values, verify the calculation, and finally \
send me the result as email.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub query: String,
    pub max_iterations: u32,
    pub generation_timeout_secs: u64,
    pub sentinel_tool: String,
    pub final_answer_policy: FinalAnswerPolicy,
    pub server: ServerConfig,
}

/// What the loop does when the model emits FINAL_ANSWER: stop on the spot,
/// or record the answer and keep iterating until the sentinel tool fires or
/// the ceiling is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalAnswerPolicy {
    #[default]
    Stop,
    Continue,
}

/// Command line of the tool server child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "python".to_string(),
            args: vec!["math_mcp_server.py".to_string()],
            workdir: None,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    query: Option<String>,
    max_iterations: Option<u32>,
    generation_timeout_secs: Option<u64>,
    sentinel_tool: Option<String>,
    final_answer_policy: Option<FinalAnswerPolicy>,
    server: Option<ServerConfig>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            query: DEFAULT_QUERY.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            sentinel_tool: DEFAULT_SENTINEL_TOOL.to_string(),
            final_answer_policy: FinalAnswerPolicy::Stop,
            server: ServerConfig::default(),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        query: parsed.query.unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        max_iterations: parsed.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        generation_timeout_secs: parsed
            .generation_timeout_secs
            .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
        sentinel_tool: parsed
            .sentinel_tool
            .unwrap_or_else(|| DEFAULT_SENTINEL_TOOL.to_string()),
        final_answer_policy: parsed.final_answer_policy.unwrap_or_default(),
        server: parsed.server.unwrap_or_default(),
    })
}
