//! CLI parser and config loading.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::BotConfig;

#[derive(Parser)]
#[command(name = "botgen")]
#[command(about = "Botgen bot server", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server (config from env; flags override PORT and ADAPTER).
    Run {
        #[arg(short, long)]
        port: Option<u16>,
        /// web, slack or telegram
        #[arg(short, long)]
        adapter: Option<String>,
    },
}

/// Load BotConfig from environment, applying the CLI overrides.
pub fn load_config(port: Option<u16>, adapter: Option<String>) -> Result<BotConfig> {
    BotConfig::load(port, adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from(["botgen", "run", "--port", "8080", "-a", "slack"]).unwrap();
        let Commands::Run { port, adapter } = cli.command;
        assert_eq!(port, Some(8080));
        assert_eq!(adapter.as_deref(), Some("slack"));
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["botgen", "run"]).unwrap();
        let Commands::Run { port, adapter } = cli.command;
        assert!(port.is_none());
        assert!(adapter.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["botgen", "run", "--port", "http"]).is_err());
    }
}
