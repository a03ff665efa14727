//! Hidden admin commands: broadcast, coin grants, raffle and item creation.
//!
//! None of these are registered in the Telegram command list; they only
//! work for the configured ADMIN_USER_ID and are silently ignored for
//! everyone else.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use teloxide::prelude::*;
use tokio::time::sleep;

use crate::core::config;
use crate::storage::db::DbPool;
use crate::storage::transactions::{append_transaction, TransactionKind};
use crate::storage::{get_connection, raffles, shop, users};
use crate::telegram::handlers::types::{run_user_op, EngineOutcome, HandlerDeps, HandlerError};

/// Whether a sender may use the hidden admin commands.
pub fn is_admin(user_id: i64) -> bool {
    let admin_id = *config::admin::ADMIN_USER_ID;
    admin_id != 0 && user_id == admin_id
}

/// `/broadcast <text>`: send a message to every known user.
///
/// Sends are paced so the whole batch stays under the Bot API rate limits,
/// and per-recipient failures (blocked bot, deleted account) are counted
/// without aborting the rest of the batch.
pub async fn handle_broadcast_command(
    bot: &Bot,
    chat_id: ChatId,
    sender_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<(), HandlerError> {
    if !is_admin(sender_id) {
        log::warn!("Ignoring /broadcast from non-admin user {}", sender_id);
        return Ok(());
    }

    let body = message_text.strip_prefix("/broadcast").unwrap_or("").trim();
    if body.is_empty() {
        bot.send_message(chat_id, "Usage: /broadcast <text>").await?;
        return Ok(());
    }

    let user_ids = {
        let conn = get_connection(&db_pool)?;
        users::list_user_ids(&conn)?
    };

    let total = user_ids.len();
    let mut sent = 0usize;
    let mut failed = 0usize;
    log::info!("Broadcast to {} user(s) started", total);

    for user_id in user_ids {
        match bot.send_message(ChatId(user_id), body).await {
            Ok(_) => sent += 1,
            Err(e) => {
                failed += 1;
                log::warn!("Broadcast to {} failed: {}", user_id, e);
            }
        }
        sleep(config::broadcast::pace()).await;
    }

    log::info!("Broadcast finished: {} sent, {} failed", sent, failed);
    bot.send_message(
        chat_id,
        format!("📣 Broadcast finished: {} sent, {} failed (of {}).", sent, failed, total),
    )
    .await?;
    Ok(())
}

/// `/grant <user_id> <amount> [note]`: credit coins out of band.
///
/// Goes through the ledger like every other balance change, so the
/// transaction-sum invariant keeps holding.
pub async fn handle_grant_command(
    bot: &Bot,
    chat_id: ChatId,
    sender_id: i64,
    message_text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !is_admin(sender_id) {
        log::warn!("Ignoring /grant from non-admin user {}", sender_id);
        return Ok(());
    }

    let args = message_text.strip_prefix("/grant").unwrap_or("").trim();
    let mut parts = args.splitn(3, char::is_whitespace);
    let target = parts.next().and_then(|s| s.parse::<i64>().ok());
    let amount = parts.next().and_then(|s| s.parse::<i64>().ok());
    let note = parts.next().unwrap_or("Coins granted by admin").trim().to_string();

    let (Some(target), Some(amount)) = (target, amount) else {
        bot.send_message(chat_id, "Usage: /grant <user_id> <amount> [note]").await?;
        return Ok(());
    };
    if amount <= 0 {
        bot.send_message(chat_id, "Amount must be positive.").await?;
        return Ok(());
    }

    let outcome = run_user_op(deps, target, move |conn| {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        if users::get_user(&tx, target)?.is_none() {
            return Err(crate::core::error::ValidationError::NotFound.into());
        }
        users::credit_coins(&tx, target, amount)?;
        append_transaction(&tx, target, TransactionKind::AdminGrant, amount, &note)?;
        tx.commit()?;
        Ok(())
    })
    .await;

    match outcome {
        EngineOutcome::Ok(()) => {
            bot.send_message(chat_id, format!("✅ Granted {} coins to {}.", amount, target))
                .await?;
        }
        EngineOutcome::Rejected(_) => {
            bot.send_message(chat_id, format!("User {} is not known to the bot.", target))
                .await?;
        }
        EngineOutcome::Failed => {
            bot.send_message(chat_id, "Grant failed, see logs.").await?;
        }
    }
    Ok(())
}

/// `/addraffle Title | Prize | entry_cost | hours [| max_entries]`
pub async fn handle_addraffle_command(
    bot: &Bot,
    chat_id: ChatId,
    sender_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<(), HandlerError> {
    if !is_admin(sender_id) {
        log::warn!("Ignoring /addraffle from non-admin user {}", sender_id);
        return Ok(());
    }

    const USAGE: &str = "Usage: /addraffle Title | Prize | entry_cost | hours [| max_entries]";
    let args = message_text.strip_prefix("/addraffle").unwrap_or("").trim();
    let parts: Vec<&str> = args.split('|').map(str::trim).collect();
    if parts.len() < 4 {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    }

    let title = parts[0];
    let prize = parts[1];
    let entry_cost = parts[2].parse::<i64>().ok();
    let hours = parts[3].parse::<i64>().ok();
    let max_entries = parts.get(4).and_then(|s| s.parse::<i64>().ok());

    let (Some(entry_cost), Some(hours)) = (entry_cost, hours) else {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    };
    if title.is_empty() || entry_cost < 0 || hours <= 0 {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    }

    let ends_at = (Utc::now() + ChronoDuration::hours(hours)).to_rfc3339();
    let conn = get_connection(&db_pool)?;
    let raffle_id = raffles::create_raffle(&conn, title, prize, entry_cost, max_entries, &ends_at)?;

    log::info!("Admin created raffle {} ({})", raffle_id, title);
    bot.send_message(
        chat_id,
        format!("🎟 Raffle #{} created: {} (ends {}).", raffle_id, title, ends_at),
    )
    .await?;
    Ok(())
}

/// `/additem Name | cost [| stock [| description]]`
pub async fn handle_additem_command(
    bot: &Bot,
    chat_id: ChatId,
    sender_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<(), HandlerError> {
    if !is_admin(sender_id) {
        log::warn!("Ignoring /additem from non-admin user {}", sender_id);
        return Ok(());
    }

    const USAGE: &str = "Usage: /additem Name | cost [| stock [| description]]";
    let args = message_text.strip_prefix("/additem").unwrap_or("").trim();
    let parts: Vec<&str> = args.split('|').map(str::trim).collect();
    if parts.len() < 2 {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    }

    let name = parts[0];
    let cost = parts[1].parse::<i64>().ok();
    let stock = parts.get(2).and_then(|s| s.parse::<i64>().ok());
    let description = parts.get(3).filter(|s| !s.is_empty()).copied();

    let Some(cost) = cost else {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    };
    if name.is_empty() || cost < 0 {
        bot.send_message(chat_id, USAGE).await?;
        return Ok(());
    }

    let conn = get_connection(&db_pool)?;
    let item_id = shop::create_item(&conn, name, description, cost, stock)?;

    log::info!("Admin created shop item {} ({})", item_id, name);
    bot.send_message(chat_id, format!("🛍 Shop item #{} created: {}.", item_id, name))
        .await?;
    Ok(())
}
