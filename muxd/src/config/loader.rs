//! Configuration loading and parsing.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file,
//! environment variables (`MUXD_` prefix), command-line arguments.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use super::ServerConfig;

/// Command-line interface for the server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, short = 'c', default_value = "muxd.toml")]
    pub config: String,

    /// Host address to bind to (overrides config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Number of connection worker threads (overrides config file)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Print default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,
}

/// Load and validate the server configuration.
pub fn load_config() -> Result<ServerConfig> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print_default_config()?;
        std::process::exit(0);
    }

    let mut config = load_config_file(&cli.config)?;
    apply_env_overrides(&mut config);
    apply_cli_overrides(&mut config, &cli);

    config.validate().map_err(|errors| {
        anyhow::anyhow!("configuration validation failed:\n{}", errors.join("\n"))
    })?;

    if cli.validate {
        println!("configuration is valid");
        std::process::exit(0);
    }

    Ok(config)
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file does not exist.
fn load_config_file(path: &str) -> Result<ServerConfig> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        tracing::warn!(config_path = %path, "configuration file not found, using defaults");
        return Ok(ServerConfig::default());
    }

    let config_str = std::fs::read_to_string(path_obj)
        .with_context(|| format!("failed to read config file: {}", path))?;

    toml::from_str(&config_str).with_context(|| format!("failed to parse TOML config: {}", path))
}

/// Apply `MUXD_`-prefixed environment variable overrides.
fn apply_env_overrides(config: &mut ServerConfig) {
    if let Ok(host) = std::env::var("MUXD_HOST") {
        config.network.host = host;
    }
    if let Ok(port) = std::env::var("MUXD_PORT") {
        match port.parse() {
            Ok(port) => config.network.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring invalid MUXD_PORT"),
        }
    }
    if let Ok(server_id) = std::env::var("MUXD_SERVER_ID") {
        config.demux.server_id = server_id;
    }
}

/// Apply command-line argument overrides.
fn apply_cli_overrides(config: &mut ServerConfig, cli: &CliArgs) {
    if let Some(ref host) = cli.host {
        config.network.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(workers) = cli.workers {
        config.demux.workers = workers;
    }
}

/// Print the default configuration in TOML format.
fn print_default_config() -> Result<()> {
    let default_config = ServerConfig::default();
    let toml_str =
        toml::to_string_pretty(&default_config).context("failed to serialize default config")?;
    println!("{}", toml_str);
    Ok(())
}
