pub mod chat;
pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

use cb_domain::config::Config;
use cb_domain::Platform;

/// chatbridge: a chat bot bridged to completion and streaming back ends.
#[derive(Debug, Parser)]
#[command(name = "chatbridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat REPL.
    Chat {
        /// User key the conversation belongs to.
        #[arg(long, default_value = "cli")]
        user: String,
        /// Back-end platform (chatgpt or xunfei). Defaults to the configured one.
        #[arg(long)]
        platform: Option<Platform>,
        /// Treat input as group-chat messages.
        #[arg(long)]
        group: bool,
    },
    /// Send a single message and print the reply.
    Run {
        /// The message to send.
        message: String,
        #[arg(long, default_value = "cli:run")]
        user: String,
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        group: bool,
        /// Print the reply as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (defaults and env overrides applied) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `CB_CONFIG` (or `config.toml`)
/// and apply environment overrides. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CB_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let mut config = load_config_from(&config_path)?;
    config.apply_env_overrides();
    Ok((config, config_path))
}

/// Parse the TOML file at `config_path`. A missing file yields the defaults.
pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        tracing::debug!(path = %config_path, "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.history.max_context_tokens, 3000);
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history]\ndefault_platform = \"xunfei\"\n\n[bot]\ntemperature = 0.2").unwrap();
        let config = load_config_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.history.default_platform, Platform::XunFei);
        assert!((config.bot.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history\nbroken").unwrap();
        let err = load_config_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }

    #[test]
    fn cli_parses_platform_names() {
        let cli = Cli::try_parse_from(["chatbridge", "run", "hi", "--platform", "spark"]).unwrap();
        match cli.command {
            Command::Run { platform, message, .. } => {
                assert_eq!(platform, Some(Platform::XunFei));
                assert_eq!(message, "hi");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["chatbridge", "chat", "--platform", "claude"]).is_err());
    }
}
