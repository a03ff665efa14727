//! Telegram bot integration and handlers

pub mod admin;
pub mod bot;
pub mod handlers;
pub mod menu;
pub mod state;

use teloxide::types::InlineKeyboardButton;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use menu::show_main_menu;
pub use state::{ConversationTracker, PendingInput};

pub use teloxide::Bot;

/// Shorthand for an inline callback button.
pub fn cb<T: Into<String>, D: Into<String>>(text: T, data: D) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.into())
}
