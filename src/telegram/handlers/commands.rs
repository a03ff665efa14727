//! Slash-command endpoints.

use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;

use super::messages::redeem_invite_code;
use super::types::{run_user_op, EngineOutcome, HandlerDeps, HandlerError, GENERIC_APOLOGY};
use crate::core::config;
use crate::engine;
use crate::storage::{get_connection, settings, transactions, users};
use crate::telegram::bot::Command;
use crate::telegram::menu;
use crate::telegram::state::PendingInput;

/// `/start [invite_code]`: greet, optionally redeem a deep-link referral
/// code, and show the main menu.
pub async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = super::types::ensure_user_from_message(deps, msg);

    let payload = msg
        .text()
        .and_then(|text| text.strip_prefix("/start"))
        .map(str::trim)
        .unwrap_or("");
    if user.is_some() && !payload.is_empty() {
        redeem_invite_code(bot, msg.chat.id, deps, payload).await?;
    }

    menu::show_main_menu(bot, msg.chat.id, deps.db_pool.clone()).await?;
    Ok(())
}

/// `/daily`: claim the daily reward.
pub async fn handle_daily_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let _ = super::types::ensure_user_from_message(deps, msg);
    let user_id = msg.chat.id.0;

    match run_user_op(deps, user_id, |conn| engine::claim_daily(conn, user_id)).await {
        EngineOutcome::Ok(reward) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "🎁 Daily reward claimed: +{} coins!\n🔥 Streak: {} day(s)\n💰 Balance: {} coins",
                    reward.amount, reward.streak, reward.coins
                ),
            )
            .await?;
        }
        EngineOutcome::Rejected(rejection) => {
            bot.send_message(msg.chat.id, rejection.user_message()).await?;
        }
        EngineOutcome::Failed => {
            bot.send_message(msg.chat.id, GENERIC_APOLOGY).await?;
            return Ok(());
        }
    }

    menu::show_main_menu(bot, msg.chat.id, deps.db_pool.clone()).await?;
    Ok(())
}

/// `/balance`: coins, streak, last claim, invite code.
pub async fn handle_balance_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = super::types::ensure_user_from_message(deps, msg) else {
        bot.send_message(msg.chat.id, GENERIC_APOLOGY).await?;
        return Ok(());
    };

    let (text, keyboard) = menu::balance_view(&user);
    bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// `/invite`: show the user's code and the enter-code entry point.
pub async fn handle_invite_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = super::types::ensure_user_from_message(deps, msg) else {
        bot.send_message(msg.chat.id, GENERIC_APOLOGY).await?;
        return Ok(());
    };

    let reward_amount = match get_connection(&deps.db_pool) {
        Ok(conn) => settings::get_setting_i64(
            &conn,
            config::rewards::REFERRAL_AMOUNT_KEY,
            *config::rewards::REFERRAL_AMOUNT_DEFAULT,
        )
        .unwrap_or(*config::rewards::REFERRAL_AMOUNT_DEFAULT),
        Err(_) => *config::rewards::REFERRAL_AMOUNT_DEFAULT,
    };

    let (text, keyboard) = menu::invite_view(&user, reward_amount);
    bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// `/raffles`: the live raffle list.
pub async fn handle_raffles_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let _ = super::types::ensure_user_from_message(deps, msg);
    menu::show_raffles(bot, msg.chat.id, deps.db_pool.clone()).await?;
    Ok(())
}

/// `/shop`: the live shop list.
pub async fn handle_shop_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let _ = super::types::ensure_user_from_message(deps, msg);
    menu::show_shop(bot, msg.chat.id, deps.db_pool.clone()).await?;
    Ok(())
}

/// `/history`: recent ledger entries.
pub async fn handle_history_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = super::types::ensure_user_from_message(deps, msg) else {
        bot.send_message(msg.chat.id, GENERIC_APOLOGY).await?;
        return Ok(());
    };

    let conn = get_connection(&deps.db_pool)?;
    let recent = transactions::recent_transactions(&conn, user.telegram_id, 10)?;
    let (text, keyboard) = menu::history_view(&user, &recent);
    bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// `/export`: the full ledger as a JSON document.
pub async fn handle_export_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = super::types::ensure_user_from_message(deps, msg) else {
        bot.send_message(msg.chat.id, GENERIC_APOLOGY).await?;
        return Ok(());
    };

    let conn = get_connection(&deps.db_pool)?;
    let history = transactions::all_transactions(&conn, user.telegram_id)?;
    if history.is_empty() {
        bot.send_message(msg.chat.id, "Nothing to export yet.").await?;
        return Ok(());
    }

    let json = serde_json::to_vec_pretty(&history)?;
    let file = InputFile::memory(json).file_name("coin_history.json");
    bot.send_document(msg.chat.id, file).await?;
    Ok(())
}

/// `/help`: command overview.
pub async fn handle_help_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let _ = super::types::ensure_user_from_message(deps, msg);

    let text = format!(
        "🪙 Earn coins with daily check-ins and referrals, then spend them \
         on raffles and shop items.\n\n{}",
        Command::descriptions()
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Invite-code button flows shared with the callback router.
pub async fn prompt_for_invite_code(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    deps.conversation.set(chat_id, PendingInput::AwaitingInviteCode).await;
    let keyboard = teloxide::types::InlineKeyboardMarkup::new(vec![vec![crate::telegram::cb(
        "✖️ Cancel",
        "menu:cancel_code",
    )]]);
    bot.send_message(chat_id, "Send me the invite code you received:")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Make sure a user row exists for a bare chat id (callback flows).
pub fn ensure_user_by_id(deps: &HandlerDeps, chat_id: ChatId) -> Option<users::User> {
    let conn = match get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection: {}", e);
            return None;
        }
    };
    match users::get_user(&conn, chat_id.0) {
        Ok(Some(user)) => Some(user),
        Ok(None) => users::create_user(&conn, chat_id.0, None, None)
            .map_err(|e| log::error!("Failed to create user {}: {}", chat_id.0, e))
            .ok(),
        Err(e) => {
            log::error!("Failed to load user {}: {}", chat_id.0, e);
            None
        }
    }
}
