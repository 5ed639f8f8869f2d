//! Wires config into a running controller: logging, storage, adapter, webhook server.

use anyhow::Result;
use botgen_core::init_tracing;
use tracing::{info, instrument};

use crate::bot::Bot;
use crate::config::BotConfig;

/// Builds the controller described by `config`: storage and adapter included, handlers not.
pub async fn build_bot(config: &BotConfig) -> Result<Bot> {
    let storage = config.build_storage().await?;
    let adapter = config.build_adapter()?;
    let bot = Bot::new(config.bot_options(adapter, storage))?;
    Ok(bot)
}

/// Main entry: validate config, init logging, build the controller, let `setup` register
/// triggers and dialogs, then serve the webhook until Ctrl-C.
#[instrument(skip(config, setup))]
pub async fn run_bot<F>(config: BotConfig, setup: F) -> Result<()>
where
    F: FnOnce(&Bot) -> Result<()>,
{
    config.validate()?;
    init_tracing(config.log_file())?;

    info!(
        adapter = %config.adapter_kind(),
        storage_type = %config.storage_type(),
        port = config.port(),
        "Initializing bot"
    );

    let bot = build_bot(&config).await?;
    setup(&bot)?;

    if bot.disable_webserver() {
        info!("Webserver disabled, nothing to serve");
        return Ok(());
    }
    bot.start().await?;
    Ok(())
}
