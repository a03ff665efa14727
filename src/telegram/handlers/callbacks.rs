//! Callback-query routing for the inline menus.

use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};

use super::commands::{ensure_user_by_id, prompt_for_invite_code};
use super::types::{run_user_op, EngineOutcome, HandlerDeps, HandlerError, GENERIC_APOLOGY};
use crate::engine;
use crate::telegram::menu;

/// Handles callback queries from the menu inline keyboards.
///
/// Tags are opaque: `menu:<action>` switches views or starts flows, and the
/// compound `raffle_<id>` / `shop_<id>` tags carry the target's numeric id.
/// Every state-changing press re-renders the message so the balance shown
/// is the post-operation one.
pub async fn handle_menu_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let callback_id = q.id.clone();
    let Some(data) = q.data else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let message_id = q.message.as_ref().map(|m| m.id());
    let (Some(chat_id), Some(message_id)) = (chat_id, message_id) else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    let _ = ensure_user_by_id(&deps, chat_id);

    if let Some(action) = data.strip_prefix("menu:") {
        match action {
            "main" => {
                let _ = bot.answer_callback_query(callback_id).await;
                menu::edit_main_menu(&bot, chat_id, message_id, deps.db_pool.clone()).await?;
            }
            "daily" => {
                handle_daily_callback(&bot, &deps, chat_id, message_id, callback_id).await?;
            }
            "balance" => {
                let _ = bot.answer_callback_query(callback_id).await;
                if let Some(user) = ensure_user_by_id(&deps, chat_id) {
                    let (text, keyboard) = menu::balance_view(&user);
                    let _ = bot
                        .edit_message_text(chat_id, message_id, text)
                        .reply_markup(keyboard)
                        .await;
                }
            }
            "invite" => {
                let _ = bot.answer_callback_query(callback_id).await;
                if let Some(user) = ensure_user_by_id(&deps, chat_id) {
                    let amount = invite_reward_amount(&deps);
                    let (text, keyboard) = menu::invite_view(&user, amount);
                    let _ = bot
                        .edit_message_text(chat_id, message_id, text)
                        .reply_markup(keyboard)
                        .await;
                }
            }
            "enter_code" => {
                let _ = bot.answer_callback_query(callback_id).await;
                prompt_for_invite_code(&bot, chat_id, &deps).await?;
            }
            "cancel_code" => {
                deps.conversation.clear(chat_id).await;
                let _ = bot.answer_callback_query(callback_id).text("Cancelled").await;
                let _ = bot.delete_message(chat_id, message_id).await;
            }
            "raffles" => {
                let _ = bot.answer_callback_query(callback_id).await;
                menu::edit_raffles(&bot, chat_id, message_id, deps.db_pool.clone()).await?;
            }
            "shop" => {
                let _ = bot.answer_callback_query(callback_id).await;
                menu::edit_shop(&bot, chat_id, message_id, deps.db_pool.clone()).await?;
            }
            "history" => {
                let _ = bot.answer_callback_query(callback_id).await;
                show_history_callback(&bot, &deps, chat_id, message_id).await?;
            }
            _ => {
                let _ = bot.answer_callback_query(callback_id).await;
            }
        }
        return Ok(());
    }

    if let Some(id_str) = data.strip_prefix("raffle_") {
        if let Ok(raffle_id) = id_str.parse::<i64>() {
            handle_raffle_entry_callback(&bot, &deps, chat_id, message_id, callback_id, raffle_id).await?;
        } else {
            let _ = bot.answer_callback_query(callback_id).await;
        }
        return Ok(());
    }

    if let Some(id_str) = data.strip_prefix("shop_") {
        if let Ok(item_id) = id_str.parse::<i64>() {
            handle_purchase_callback(&bot, &deps, chat_id, message_id, callback_id, item_id).await?;
        } else {
            let _ = bot.answer_callback_query(callback_id).await;
        }
        return Ok(());
    }

    log::debug!("Unknown callback tag: {}", data);
    let _ = bot.answer_callback_query(callback_id).await;
    Ok(())
}

fn invite_reward_amount(deps: &HandlerDeps) -> i64 {
    use crate::core::config;
    use crate::storage::{get_connection, settings};

    match get_connection(&deps.db_pool) {
        Ok(conn) => settings::get_setting_i64(
            &conn,
            config::rewards::REFERRAL_AMOUNT_KEY,
            *config::rewards::REFERRAL_AMOUNT_DEFAULT,
        )
        .unwrap_or(*config::rewards::REFERRAL_AMOUNT_DEFAULT),
        Err(_) => *config::rewards::REFERRAL_AMOUNT_DEFAULT,
    }
}

async fn handle_daily_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    callback_id: teloxide::types::CallbackQueryId,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    match run_user_op(deps, user_id, |conn| engine::claim_daily(conn, user_id)).await {
        EngineOutcome::Ok(reward) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(format!("🎁 +{} coins! Streak: {}", reward.amount, reward.streak))
                .await;
        }
        EngineOutcome::Rejected(rejection) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(rejection.user_message())
                .show_alert(true)
                .await;
        }
        EngineOutcome::Failed => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(GENERIC_APOLOGY)
                .show_alert(true)
                .await;
        }
    }
    // Refresh the menu either way; the balance line must match the ledger.
    menu::edit_main_menu(bot, chat_id, message_id, deps.db_pool.clone()).await?;
    Ok(())
}

async fn handle_raffle_entry_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    callback_id: teloxide::types::CallbackQueryId,
    raffle_id: i64,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    match run_user_op(deps, user_id, move |conn| {
        engine::enter_raffle(conn, user_id, raffle_id)
    })
    .await
    {
        EngineOutcome::Ok(receipt) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(format!("🎟 You're in! -{} coins", receipt.cost))
                .await;
        }
        EngineOutcome::Rejected(rejection) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(rejection.user_message())
                .show_alert(true)
                .await;
        }
        EngineOutcome::Failed => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(GENERIC_APOLOGY)
                .show_alert(true)
                .await;
        }
    }
    menu::edit_raffles(bot, chat_id, message_id, deps.db_pool.clone()).await?;
    Ok(())
}

async fn handle_purchase_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    callback_id: teloxide::types::CallbackQueryId,
    item_id: i64,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    match run_user_op(deps, user_id, move |conn| {
        engine::purchase_item(conn, user_id, item_id)
    })
    .await
    {
        EngineOutcome::Ok(receipt) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(format!("🛍 Bought {}! -{} coins", receipt.title, receipt.cost))
                .await;
        }
        EngineOutcome::Rejected(rejection) => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(rejection.user_message())
                .show_alert(true)
                .await;
        }
        EngineOutcome::Failed => {
            let _ = bot
                .answer_callback_query(callback_id)
                .text(GENERIC_APOLOGY)
                .show_alert(true)
                .await;
        }
    }
    menu::edit_shop(bot, chat_id, message_id, deps.db_pool.clone()).await?;
    Ok(())
}

async fn show_history_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<(), HandlerError> {
    use crate::storage::{get_connection, transactions};

    let Some(user) = ensure_user_by_id(deps, chat_id) else {
        return Ok(());
    };
    let conn = get_connection(&deps.db_pool)?;
    let recent = transactions::recent_transactions(&conn, user.telegram_id, 10)?;
    let (text, keyboard) = menu::history_view(&user, &recent);
    let _ = bot
        .edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await;
    Ok(())
}
