//! Menu and list rendering.
//!
//! Every view re-reads the user row before rendering so the balance shown
//! is never a stale copy from an earlier event.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use teloxide::RequestError;

use crate::storage::db::DbPool;
use crate::storage::{get_connection, raffles, shop, transactions, users};
use crate::telegram::cb;

/// Map pool/database failures into the transport error type the menu
/// functions return.
fn storage_err(e: impl std::fmt::Display) -> RequestError {
    RequestError::from(std::sync::Arc::new(std::io::Error::other(e.to_string())))
}

fn load_user(conn: &rusqlite::Connection, chat_id: ChatId) -> Result<users::User, RequestError> {
    match users::get_user(conn, chat_id.0).map_err(storage_err)? {
        Some(user) => Ok(user),
        None => users::create_user(conn, chat_id.0, None, None).map_err(storage_err),
    }
}

/// Main menu text + keyboard for a user.
pub(crate) fn main_menu_view(user: &users::User) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "🪙 Welcome to the coin bot!\n\n\
         💰 Balance: {} coins\n\
         🔥 Streak: {} day(s)\n\n\
         Check in daily, invite friends, enter raffles and spend your coins in the shop.",
        user.coins, user.streak
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            cb("🎁 Daily reward", "menu:daily"),
            cb("💰 Balance", "menu:balance"),
        ],
        vec![cb("🎟 Raffles", "menu:raffles"), cb("🛍 Shop", "menu:shop")],
        vec![
            cb("👥 Invite friends", "menu:invite"),
            cb("📜 History", "menu:history"),
        ],
    ]);

    (text, keyboard)
}

/// Shows the main menu as a new message.
pub async fn show_main_menu(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<Message> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let (text, keyboard) = main_menu_view(&user);

    bot.send_message(chat_id, text).reply_markup(keyboard).await
}

/// Edits an existing message into the main menu (fresh balance).
pub async fn edit_main_menu(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let (text, keyboard) = main_menu_view(&user);

    bot.edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Raffle list text + keyboard.
pub(crate) fn raffles_view(
    user: &users::User,
    active: &[raffles::Raffle],
) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("🎟 Active raffles\n\n💰 Your balance: {} coins\n\n", user.coins);
    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();

    if active.is_empty() {
        text.push_str("No raffles are running right now. Check back later!");
    } else {
        for (idx, raffle) in active.iter().enumerate() {
            let cap = raffle
                .max_entries
                .map(|max| format!("{}/{}", raffle.current_entries, max))
                .unwrap_or_else(|| raffle.current_entries.to_string());
            text.push_str(&format!(
                "{}. {} — {}\n   🎫 {} coins per entry, entries: {}\n",
                idx + 1,
                raffle.title,
                raffle.prize,
                raffle.entry_cost,
                cap
            ));
            rows.push(vec![cb(
                format!("🎟 Enter: {} ({} coins)", raffle.title, raffle.entry_cost),
                format!("raffle_{}", raffle.id),
            )]);
        }
        text.push_str("\nTap a button or reply with the raffle number to enter.");
    }

    rows.push(vec![cb("⬅️ Back", "menu:main")]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Shows the raffle list as a new message.
pub async fn show_raffles(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<Message> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let active = raffles::list_active_raffles(&conn).map_err(storage_err)?;
    let (text, keyboard) = raffles_view(&user, &active);

    bot.send_message(chat_id, text).reply_markup(keyboard).await
}

/// Edits an existing message into the raffle list.
pub async fn edit_raffles(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let active = raffles::list_active_raffles(&conn).map_err(storage_err)?;
    let (text, keyboard) = raffles_view(&user, &active);

    bot.edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Shop list text + keyboard.
pub(crate) fn shop_view(user: &users::User, items: &[shop::ShopItem]) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("🛍 Coin shop\n\n💰 Your balance: {} coins\n\n", user.coins);
    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();

    if items.is_empty() {
        text.push_str("The shop is empty right now. Check back later!");
    } else {
        for (idx, item) in items.iter().enumerate() {
            let stock = match item.stock {
                Some(0) => " (sold out)".to_string(),
                Some(n) => format!(" ({} left)", n),
                None => String::new(),
            };
            text.push_str(&format!("{}. {} — {} coins{}\n", idx + 1, item.name, item.cost, stock));
            if let Some(ref description) = item.description {
                text.push_str(&format!("   {}\n", description));
            }
            rows.push(vec![cb(
                format!("🛍 Buy: {} ({} coins)", item.name, item.cost),
                format!("shop_{}", item.id),
            )]);
        }
        text.push_str("\nTap a button or reply with the item number to buy.");
    }

    rows.push(vec![cb("⬅️ Back", "menu:main")]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Shows the shop as a new message.
pub async fn show_shop(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<Message> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let items = shop::list_active_items(&conn).map_err(storage_err)?;
    let (text, keyboard) = shop_view(&user, &items);

    bot.send_message(chat_id, text).reply_markup(keyboard).await
}

/// Edits an existing message into the shop list.
pub async fn edit_shop(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let conn = get_connection(&db_pool).map_err(storage_err)?;
    let user = load_user(&conn, chat_id)?;
    let items = shop::list_active_items(&conn).map_err(storage_err)?;
    let (text, keyboard) = shop_view(&user, &items);

    bot.edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Balance detail text + keyboard.
pub(crate) fn balance_view(user: &users::User) -> (String, InlineKeyboardMarkup) {
    let last_claim = user
        .last_daily_reward
        .as_deref()
        .map(|s| s.split('T').next().unwrap_or(s).to_string())
        .unwrap_or_else(|| "never".to_string());
    let text = format!(
        "💰 Balance: {} coins\n\
         🔥 Streak: {} day(s)\n\
         🎁 Last daily claim: {}\n\
         🔑 Your invite code: {}",
        user.coins, user.streak, last_claim, user.referral_code
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![cb("👥 Invite friends", "menu:invite")],
        vec![cb("⬅️ Back", "menu:main")],
    ]);
    (text, keyboard)
}

/// Invite view: the user's code plus the enter-code entry point.
pub(crate) fn invite_view(user: &users::User, reward_amount: i64) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "👥 Invite friends, earn coins!\n\n\
         Share your invite code: {}\n\n\
         When a friend redeems it, you both get {} coins.\n\
         Got a code from a friend? Enter it below.",
        user.referral_code, reward_amount
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![cb("⌨️ Enter an invite code", "menu:enter_code")],
        vec![cb("⬅️ Back", "menu:main")],
    ]);
    (text, keyboard)
}

/// Recent-history view.
pub(crate) fn history_view(
    user: &users::User,
    recent: &[transactions::Transaction],
) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("📜 Recent coin history\n\n💰 Balance: {} coins\n\n", user.coins);
    if recent.is_empty() {
        text.push_str("Nothing here yet. Claim your daily reward to get started!");
    } else {
        for entry in recent {
            let date = entry.created_at.split('T').next().unwrap_or(&entry.created_at);
            text.push_str(&format!(
                "{:+} — {} ({})\n",
                entry.amount,
                entry.description,
                date
            ));
        }
    }

    let keyboard = InlineKeyboardMarkup::new(vec![vec![cb("⬅️ Back", "menu:main")]]);
    (text, keyboard)
}
