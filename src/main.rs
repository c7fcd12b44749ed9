//! Bot-trust evaluation service for Zentinel
//!
//! Serves soft-scoring and hard-gate endpoints over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_bot_trust::{server, AppState, BotTrustConfig, InMemorySubmissionStore, TrustEvaluator};

#[derive(Parser, Debug)]
#[command(name = "zentinel-bot-trust")]
#[command(author, version, about = "Bot-trust evaluation service for Zentinel")]
struct Args {
    /// Path to configuration file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.host` and `server.port`
    #[arg(short, long)]
    listen: Option<String>,

    /// Challenge verification secret
    #[arg(long, env = "TURNSTILE_SECRET_KEY", hide_env_values = true)]
    verification_secret: Option<String>,

    /// Risk assessment API key
    #[arg(long, env = "RECAPTCHA_API_KEY", hide_env_values = true)]
    assessment_api_key: Option<String>,

    /// Risk assessment project
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT_ID")]
    assessment_project: Option<String>,

    /// Risk assessment site key
    #[arg(long, env = "RECAPTCHA_SITE_KEY")]
    assessment_site_key: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Apply command-line and environment overrides on top of the file config.
    fn apply(&self, config: &mut BotTrustConfig) {
        if let Some(secret) = &self.verification_secret {
            config.verification.secret = Some(secret.clone());
        }
        if let Some(key) = &self.assessment_api_key {
            config.assessment.api_key = key.clone();
        }
        if let Some(project) = &self.assessment_project {
            config.assessment.project_id = project.clone();
        }
        if let Some(site_key) = &self.assessment_site_key {
            config.assessment.site_key = site_key.clone();
        }
    }

    fn listen_address(&self, config: &BotTrustConfig) -> String {
        self.listen
            .clone()
            .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port))
    }
}

fn init_logging(json: bool, level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BotTrustConfig> {
    let Some(path) = path else {
        return Ok(BotTrustConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, &args.log_level);

    let mut config = load_config(args.config.as_ref())?;
    args.apply(&mut config);
    let address = args.listen_address(&config);

    let evaluator = TrustEvaluator::from_config(config).context("invalid configuration")?;
    let state = AppState {
        evaluator: Arc::new(evaluator),
        store: Arc::new(InMemorySubmissionStore::new()),
    };

    info!(address = %address, "Starting bot-trust service");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    server::serve(listener, state).await?;

    Ok(())
}
