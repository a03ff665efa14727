//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::types::Message;

use crate::core::error::{AppError, ValidationError};
use crate::engine::UserLocks;
use crate::storage::db::DbPool;
use crate::storage::{get_connection, users};
use crate::telegram::state::ConversationTracker;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Generic apology sent when storage fails mid-event. No state was
/// mutated in that case; the transaction rolled back.
pub const GENERIC_APOLOGY: &str = "Something went wrong on my side. Please try again in a moment.";

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub user_locks: Arc<UserLocks>,
    pub conversation: Arc<ConversationTracker>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<DbPool>,
        user_locks: Arc<UserLocks>,
        conversation: Arc<ConversationTracker>,
    ) -> Self {
        Self {
            db_pool,
            user_locks,
            conversation,
        }
    }
}

/// Outcome of an engine operation run on behalf of a user event.
pub enum EngineOutcome<T> {
    /// The operation landed; the value describes the result
    Ok(T),
    /// A business rule rejected the operation; show the specific message
    Rejected(ValidationError),
    /// Storage failed; already logged, show the generic apology
    Failed,
}

/// Run a ledger operation serialized on the user's lock.
///
/// The lock is held only for the database work, never across outbound
/// sends. Storage failures are logged here so callers only decide what to
/// show the user.
pub async fn run_user_op<T, F>(deps: &HandlerDeps, user_id: i64, op: F) -> EngineOutcome<T>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, AppError>,
{
    let _guard = deps.user_locks.acquire(user_id).await;
    let mut conn = match get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for user {}: {}", user_id, e);
            return EngineOutcome::Failed;
        }
    };
    match op(&mut conn) {
        Ok(value) => EngineOutcome::Ok(value),
        Err(AppError::Validation(rejection)) => EngineOutcome::Rejected(rejection),
        Err(e) => {
            log::error!("Ledger operation failed for user {}: {}", user_id, e);
            EngineOutcome::Failed
        }
    }
}

/// Ensure the sender exists in the users table, refreshing display fields.
/// Returns `None` when storage is unavailable (already logged).
pub fn ensure_user_from_message(deps: &HandlerDeps, msg: &Message) -> Option<users::User> {
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());

    let conn = match get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection: {}", e);
            return None;
        }
    };
    match users::get_or_create_user(&conn, msg.chat.id.0, username, first_name) {
        Ok(user) => Some(user),
        Err(e) => {
            log::error!("Failed to ensure user {}: {}", msg.chat.id.0, e);
            None
        }
    }
}
