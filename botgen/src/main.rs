//! Demo bot: greets, says goodbye, and answers a custom predicate.

use anyhow::Result;
use botgen::{load_config, run_bot, BotMessage, BotWorker, Cli, Commands, Pattern};
use clap::Parser;

async fn is_func(message: BotMessage) -> bool {
    message.text.as_deref() == Some("func")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { port, adapter } => {
            let config = load_config(port, adapter)?;
            run_bot(config, |bot| {
                bot.hears("hello", "message", |bot: BotWorker, message: BotMessage| async move {
                    let user = message.user.clone().unwrap_or_default();
                    bot.say(format!("hello: {}", user)).await?;
                    Ok(())
                });
                bot.hears(
                    vec!["bye", "goodbye", "tchau", "see you"],
                    "message",
                    |bot: BotWorker, message: BotMessage| async move {
                        let user = message.user.clone().unwrap_or_default();
                        bot.reply(&message, format!("bye, {}", user)).await?;
                        Ok(())
                    },
                );
                bot.hears(
                    Pattern::predicate(is_func),
                    "message",
                    |bot: BotWorker, message: BotMessage| async move {
                        let user = message.user.clone().unwrap_or_default();
                        bot.reply(&message, format!("resp to func, {}", user)).await?;
                        Ok(())
                    },
                );
                Ok(())
            })
            .await
        }
    }
}
