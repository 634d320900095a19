//! phpsess CLI - inspect and edit shared PHP sessions
//!
//! Every command prints JSON on stdout; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use phpsess_core::{init_logging, LoggingConfig, PhpValue, SessionConfig, SessionId, SessionSettings};
use phpsess_manager::{RedisBackend, SessionError, SessionManager};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "phpsess")]
#[command(about = "Inspect and edit PHP sessions stored in Redis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Session settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Redis URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a session, or one field of it
    Get {
        /// Session id
        id: SessionId,

        /// Only this field
        field: Option<String>,
    },

    /// Set one field while holding the session lock
    Set {
        /// Session id
        id: SessionId,

        /// Field name
        field: String,

        /// New value as JSON; anything that is not JSON is stored as a string
        value: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: SessionId,
    },

    /// Check whether a session exists
    Exists {
        /// Session id
        id: SessionId,
    },

    /// Inspect the session settings
    Config {
        /// Show the effective settings as TOML
        #[arg(long)]
        show: bool,

        /// Only check that the settings are valid
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig {
            level: "warn".to_string(),
            filter_directives: Vec::new(),
            ..LoggingConfig::default()
        }
    };
    init_logging(&logging_config).context("Failed to initialize logging")?;

    info!("Starting phpsess CLI v{}", env!("CARGO_PKG_VERSION"));

    let config = SessionConfig::load(cli.config.as_deref()).context("Invalid session settings")?;

    let output = match cli.command {
        Commands::Config { show, validate } => handle_config(&config, show, validate)?,
        command => {
            let backend = RedisBackend::connect(&cli.redis_url)
                .await
                .context("Failed to connect to Redis")?;
            let manager = SessionManager::new(Arc::new(backend), config);
            run(&manager, command).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute a session command and build its JSON output
async fn run(manager: &SessionManager, command: Commands) -> anyhow::Result<Value> {
    let output = match command {
        Commands::Get { id, field: None } => {
            serde_json::to_value(manager.require(Some(&id)).await?)?
        }
        Commands::Get {
            id,
            field: Some(field),
        } => {
            let value = manager.get_field(&field, Some(&id)).await?;
            serde_json::to_value(value)?
        }
        Commands::Set { id, field, value } => {
            let value = parse_value(&value);
            let record = manager
                .lock(Some(&id), move |session| {
                    Box::pin(async move {
                        session.insert(field, value);
                        Ok::<_, SessionError>(session.clone())
                    })
                })
                .await?;
            serde_json::to_value(record)?
        }
        Commands::Delete { id } => json!({ "deleted": manager.delete(Some(&id)).await? }),
        Commands::Exists { id } => json!({ "exists": manager.exists(Some(&id)).await? }),
        Commands::Config { .. } => anyhow::bail!("config does not need a session store"),
    };
    Ok(output)
}

fn handle_config(config: &SessionConfig, show: bool, validate: bool) -> anyhow::Result<Value> {
    if validate && !show {
        return Ok(json!({ "valid": true }));
    }
    let toml = SessionSettings::from(config).to_toml_string()?;
    Ok(json!({ "valid": true, "settings": toml }))
}

fn parse_value(raw: &str) -> PhpValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => PhpValue::from(value),
        Err(_) => PhpValue::String(raw.to_string()),
    }
}
