//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_menu_callback;
use super::commands::{
    handle_balance_command, handle_daily_command, handle_export_command, handle_help_command,
    handle_history_command, handle_invite_command, handle_raffles_command, handle_shop_command,
    handle_start_command,
};
use super::messages::handle_text_message;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::admin::{
    handle_additem_command, handle_addraffle_command, handle_broadcast_command, handle_grant_command,
};
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. The same schema is used in production and in integration
/// tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_broadcast = deps.clone();
    let deps_grant = deps.clone();
    let deps_addraffle = deps.clone();
    let deps_additem = deps.clone();
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Hidden admin commands (not in Command enum)
        .branch(broadcast_handler(deps_broadcast))
        .branch(grant_handler(deps_grant))
        .branch(addraffle_handler(deps_addraffle))
        .branch(additem_handler(deps_additem))
        // Command handler
        .branch(command_handler(deps_commands))
        // Free-text handler (conversation state, numbered selection)
        .branch(message_handler(deps_messages))
        // Callback query handler
        .branch(callback_handler(deps_callback))
}

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(0)
}

/// Handler for /broadcast admin command (hidden, not in Command enum)
fn broadcast_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| text.starts_with("/broadcast"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let message_text = msg.text().unwrap_or_default();

                if let Err(e) =
                    handle_broadcast_command(&bot, msg.chat.id, user_id, message_text, deps.db_pool.clone()).await
                {
                    log::error!("/broadcast handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

/// Handler for /grant admin command (hidden, not in Command enum)
fn grant_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| text.starts_with("/grant")).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let message_text = msg.text().unwrap_or_default();

                if let Err(e) = handle_grant_command(&bot, msg.chat.id, user_id, message_text, &deps).await {
                    log::error!("/grant handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

/// Handler for /addraffle admin command (hidden, not in Command enum)
fn addraffle_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text()
                .map(|text| text.starts_with("/addraffle"))
                .unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let message_text = msg.text().unwrap_or_default();

                if let Err(e) =
                    handle_addraffle_command(&bot, msg.chat.id, user_id, message_text, deps.db_pool.clone()).await
                {
                    log::error!("/addraffle handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

/// Handler for /additem admin command (hidden, not in Command enum)
fn additem_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| text.starts_with("/additem")).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let message_text = msg.text().unwrap_or_default();

                if let Err(e) =
                    handle_additem_command(&bot, msg.chat.id, user_id, message_text, deps.db_pool.clone()).await
                {
                    log::error!("/additem handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

/// Handler for bot commands (/start, /daily, /balance, etc.)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                let result = match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Daily => handle_daily_command(&bot, &msg, &deps).await,
                    Command::Balance => handle_balance_command(&bot, &msg, &deps).await,
                    Command::Invite => handle_invite_command(&bot, &msg, &deps).await,
                    Command::Raffles => handle_raffles_command(&bot, &msg, &deps).await,
                    Command::Shop => handle_shop_command(&bot, &msg, &deps).await,
                    Command::History => handle_history_command(&bot, &msg, &deps).await,
                    Command::Export => handle_export_command(&bot, &msg, &deps).await,
                    Command::Help => handle_help_command(&bot, &msg, &deps).await,
                };

                if let Err(e) = result {
                    log::error!("Command {:?} failed for chat {}: {}", cmd, msg.chat.id, e);
                }
                Ok(())
            }
        },
    ))
}

/// Handler for regular text messages (invite codes, numbered selections)
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_text_message(&bot, &msg, &deps).await {
                    log::error!("Error handling message from chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_menu_callback(bot, q, deps).await {
                log::error!("Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}
