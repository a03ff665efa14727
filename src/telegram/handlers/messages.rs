//! Free-text message routing.
//!
//! Precedence for a plain text message:
//! 1. a pending conversation state is consumed and handled as structured
//!    input (the invite code flow);
//! 2. a bare integer is a numbered selection against the live lists,
//!    raffles first, then shop items;
//! 3. anything else is ignored.

use teloxide::prelude::*;

use super::types::{run_user_op, EngineOutcome, HandlerDeps, HandlerError, GENERIC_APOLOGY};
use crate::engine;
use crate::storage::raffles::Raffle;
use crate::storage::shop::ShopItem;
use crate::storage::{get_connection, raffles, shop};
use crate::telegram::menu;
use crate::telegram::state::PendingInput;

/// What a bare-number reply resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberedSelection {
    Raffle(i64),
    Item(i64),
}

/// Resolve a 1-based position against the raffle list first, then the shop
/// list. Out-of-range numbers resolve to nothing: the lists may have
/// changed since they were presented, and a stale index must not buy
/// something else.
pub(crate) fn resolve_numbered_selection(
    number: i64,
    active_raffles: &[Raffle],
    active_items: &[ShopItem],
) -> Option<NumberedSelection> {
    if number < 1 {
        return None;
    }
    let idx = (number - 1) as usize;
    if let Some(raffle) = active_raffles.get(idx) {
        return Some(NumberedSelection::Raffle(raffle.id));
    }
    if let Some(item) = active_items.get(idx) {
        return Some(NumberedSelection::Item(item.id));
    }
    None
}

/// Entry point for non-command text messages.
pub async fn handle_text_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    // Unknown slash commands fall through to here; they are not input.
    if text.starts_with('/') {
        return Ok(());
    }

    let _ = super::types::ensure_user_from_message(deps, msg);

    // A pending prompt is consumed whether or not the lookup succeeds.
    if let Some(PendingInput::AwaitingInviteCode) = deps.conversation.take(msg.chat.id).await {
        redeem_invite_code(bot, msg.chat.id, deps, text.trim()).await?;
        return Ok(());
    }

    if let Ok(number) = text.trim().parse::<i64>() {
        return handle_numbered_selection(bot, msg.chat.id, deps, number).await;
    }

    Ok(())
}

/// Redeem an invite code for the sender, crediting both sides.
pub async fn redeem_invite_code(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    code: &str,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    let code = code.to_string();

    match run_user_op(deps, user_id, move |conn| {
        engine::award_referral(conn, user_id, &code)
    })
    .await
    {
        EngineOutcome::Ok(reward) => {
            bot.send_message(
                chat_id,
                format!(
                    "🎉 Invite code accepted: +{} coins!\n💰 Balance: {} coins",
                    reward.amount, reward.referee_coins
                ),
            )
            .await?;

            // Tell the inviter; their confirmation is best-effort.
            let inviter = ChatId(reward.referrer_id);
            if let Err(e) = bot
                .send_message(
                    inviter,
                    format!("👥 Someone joined with your invite code: +{} coins!", reward.amount),
                )
                .await
            {
                log::warn!("Failed to notify referrer {}: {}", reward.referrer_id, e);
            }
        }
        EngineOutcome::Rejected(rejection) => {
            bot.send_message(chat_id, rejection.user_message()).await?;
        }
        EngineOutcome::Failed => {
            bot.send_message(chat_id, GENERIC_APOLOGY).await?;
        }
    }
    Ok(())
}

/// Act on a bare-number reply. Out-of-range numbers are silently ignored.
async fn handle_numbered_selection(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    number: i64,
) -> Result<(), HandlerError> {
    let selection = {
        let conn = match get_connection(&deps.db_pool) {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("Failed to get DB connection: {}", e);
                return Ok(());
            }
        };
        let active_raffles = raffles::list_active_raffles(&conn)?;
        let active_items = shop::list_active_items(&conn)?;
        resolve_numbered_selection(number, &active_raffles, &active_items)
    };

    let user_id = chat_id.0;
    let outcome = match selection {
        Some(NumberedSelection::Raffle(raffle_id)) => {
            run_user_op(deps, user_id, move |conn| {
                engine::enter_raffle(conn, user_id, raffle_id)
            })
            .await
        }
        Some(NumberedSelection::Item(item_id)) => {
            run_user_op(deps, user_id, move |conn| {
                engine::purchase_item(conn, user_id, item_id)
            })
            .await
        }
        None => return Ok(()),
    };

    match outcome {
        EngineOutcome::Ok(receipt) => {
            bot.send_message(
                chat_id,
                format!(
                    "✅ {}: -{} coins\n💰 Balance: {} coins",
                    receipt.title, receipt.cost, receipt.balance
                ),
            )
            .await?;
            menu::show_main_menu(bot, chat_id, deps.db_pool.clone()).await?;
        }
        EngineOutcome::Rejected(rejection) => {
            bot.send_message(chat_id, rejection.user_message()).await?;
        }
        EngineOutcome::Failed => {
            bot.send_message(chat_id, GENERIC_APOLOGY).await?;
        }
    }
    Ok(())
}
