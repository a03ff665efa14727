//! Grosh - Telegram bot with coin-reward mechanics
//!
//! This library provides all the functionality for the Grosh bot:
//! daily check-in rewards, referrals, raffles, a virtual shop, and the
//! ledger that keeps every balance auditable.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, and logging
//! - `storage`: Database pool, migrations, and row-level queries
//! - `engine`: Atomic reward / raffle / shop state transitions
//! - `telegram`: Bot integration, menus, and handlers

pub mod cli;
pub mod core;
pub mod engine;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError, AppResult, ValidationError};
pub use self::engine::UserLocks;
pub use self::storage::{create_pool, get_connection, DbConnection, DbPool};
pub use self::telegram::{create_bot, schema, show_main_menu, ConversationTracker, HandlerDeps};
