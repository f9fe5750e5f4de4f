use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cb_bot::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Chat { user, platform, group } => {
            init_cli_tracing();
            let (config, _) = cb_bot::cli::load_config()?;
            cb_bot::cli::chat::chat(Arc::new(config), user, platform, group).await
        }
        Command::Run { message, user, platform, group, json } => {
            init_cli_tracing();
            let (config, _) = cb_bot::cli::load_config()?;
            cb_bot::cli::run::run(Arc::new(config), message, user, platform, group, json).await
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cb_bot::cli::load_config()?;
            if !cb_bot::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cb_bot::cli::load_config()?;
            cb_bot::cli::config::show(&config)
        }
        Command::Version => {
            println!("chatbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Compact stderr-only tracing for CLI commands.
///
/// Defaults to `warn` so diagnostics stay off stdout; `RUST_LOG=info`
/// shows the `cb_event` trace events.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
