use clap::Parser;
use orrery_core::AppConfig;
use orrery_core::agent::{Agent, AgentOptions, Termination};
use orrery_core::model::GeminiClient;
use orrery_core::tooling::StdioToolServer;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "orrery",
    version,
    about = "Tool-calling agent that solves a task through an MCP-style tool server"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    query_file: Option<String>,
    #[arg(long)]
    max_iterations: Option<u32>,
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();
    info!("Starting orrery");

    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(Path::new);
    let config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration using default path or defaults");
    }

    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| "GEMINI_API_KEY must be set (environment or .env)")?;

    let query = resolve_query(&cli, &config)?;
    debug!(query = %query, "Resolved task query");

    let mut options = AgentOptions::from_config(&config);
    if let Some(limit) = cli.max_iterations {
        options.max_iterations = limit;
    }

    let transport = Arc::new(StdioToolServer::new(config.server.clone()));
    let generator = GeminiClient::new(api_key);
    let agent = Agent::new(generator, transport.clone(), options);

    let report = agent.run(query).await;
    transport.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(termination = ?report.termination, "Run finished");

    if report.termination == Termination::Error {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn resolve_query(cli: &Cli, config: &AppConfig) -> Result<String, Box<dyn Error>> {
    if !cli.query.is_empty() {
        return Ok(cli.query.join(" ").trim().to_string());
    }

    if let Some(path) = &cli.query_file {
        info!(path = %path, "Loading query from file");
        let content = fs::read_to_string(path)?;
        return Ok(content.trim().to_string());
    }

    Ok(config.query.clone())
}
