//! phpsess Web Server
//!
//! Serves the shared PHP session over HTTP.

use anyhow::Context;
use clap::Parser;
use phpsess_core::{init_logging, LoggingConfig, SessionConfig};
use phpsess_web::{AppState, PhpSessServer, WebConfig, WebError};
use std::path::PathBuf;

/// phpsess Web Server - PHP sessions for Rust handlers
#[derive(Parser)]
#[command(name = "phpsess-web")]
#[command(about = "Serve shared PHP sessions over HTTP")]
#[command(version)]
struct Args {
    /// Server host to bind to (default from PHPSESS_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on (default from PHPSESS_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Redis URL (default from REDIS_URL)
    #[arg(long)]
    redis_url: Option<String>,

    /// Session cookie name (default from PHPSESS_COOKIE_NAME)
    #[arg(long)]
    cookie_name: Option<String>,

    /// Session settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&LoggingConfig {
        level: args.log_level.clone(),
        filter_directives: vec![
            format!("phpsess_web={}", args.log_level),
            format!("phpsess_manager={}", args.log_level),
            "tower_http=debug".to_string(),
        ],
        ..LoggingConfig::default()
    })?;

    // Command line arguments override the environment
    let mut config = WebConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(redis_url) = args.redis_url {
        config.redis_url = redis_url;
    }
    if let Some(cookie_name) = args.cookie_name {
        config.cookie_name = cookie_name;
    }
    if config.cookie_name.trim().is_empty() {
        return Err(WebError::Config("cookie name must not be empty".to_string()).into());
    }

    let session_config =
        SessionConfig::load(args.config.as_deref()).context("Failed to load session settings")?;

    let state = AppState::connect(config, session_config)
        .await
        .context("Failed to connect to the session store")?;

    PhpSessServer::new(state).start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["phpsess-web"]);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert_eq!(args.log_level, "info");

        let args = Args::parse_from([
            "phpsess-web",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--cookie-name",
            "SID",
            "--config",
            "phpsess.toml",
        ]);
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(3000));
        assert_eq!(args.cookie_name.as_deref(), Some("SID"));
        assert_eq!(args.config, Some(PathBuf::from("phpsess.toml")));
    }
}
