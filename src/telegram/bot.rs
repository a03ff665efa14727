//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command registration in the Telegram UI

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::AppError;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "What I can do:")]
pub enum Command {
    #[command(description = "show the main menu")]
    Start,
    #[command(description = "claim your daily reward")]
    Daily,
    #[command(description = "show your coins, streak and invite code")]
    Balance,
    #[command(description = "invite friends and earn coins")]
    Invite,
    #[command(description = "active raffles")]
    Raffles,
    #[command(description = "the coin shop")]
    Shop,
    #[command(description = "recent coin history")]
    History,
    #[command(description = "export your full coin history")]
    Export,
    #[command(description = "how the bot works")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(AppError::Config)` - No token configured or invalid BOT_API_URL
pub fn create_bot() -> Result<Bot, AppError> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(AppError::Config(
            "BOT_TOKEN (or TELOXIDE_TOKEN) is not set".to_string(),
        ));
    }

    let bot = if let Some(ref bot_api_url) = *config::BOT_API_URL {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(bot_api_url)
            .map_err(|e| AppError::Config(format!("Invalid BOT_API_URL: {}", e)))?;
        Bot::new(token).set_api_url(url)
    } else {
        Bot::new(token)
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// Hidden admin commands are intentionally not registered here.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "show the main menu"),
        BotCommand::new("daily", "claim your daily reward"),
        BotCommand::new("balance", "show your coins, streak and invite code"),
        BotCommand::new("invite", "invite friends and earn coins"),
        BotCommand::new("raffles", "active raffles"),
        BotCommand::new("shop", "the coin shop"),
        BotCommand::new("history", "recent coin history"),
        BotCommand::new("export", "export your full coin history"),
        BotCommand::new("help", "how the bot works"),
    ])
    .await?;

    Ok(())
}
