use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Missing or invalid configuration; fatal to bot startup only
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Business-rule rejections, always user-visible
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

/// Rejections of a user action by the reward or raffle/shop engines.
///
/// These are expected outcomes, not failures: each maps to a specific
/// message shown to the user and is never escalated or logged as an error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("item out of stock")]
    OutOfStock,

    #[error("raffle is closed")]
    RaffleClosed,

    #[error("cannot redeem own referral code")]
    SelfReferral,

    #[error("already referred by another code")]
    AlreadyReferred,

    #[error("daily reward already claimed today")]
    AlreadyClaimedToday,

    #[error("unknown referral code")]
    UnknownCode,

    #[error("not found")]
    NotFound,
}

impl ValidationError {
    /// Message shown to the user when the action is rejected.
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::InsufficientBalance => "You don't have enough coins for that.",
            ValidationError::OutOfStock => "Sorry, that item is out of stock.",
            ValidationError::RaffleClosed => "That raffle is closed.",
            ValidationError::SelfReferral => "You can't redeem your own invite code.",
            ValidationError::AlreadyReferred => "You have already used an invite code.",
            ValidationError::AlreadyClaimedToday => {
                "You already claimed your daily reward today. Come back tomorrow!"
            }
            ValidationError::UnknownCode => "That invite code doesn't exist. Check it and try again.",
            ValidationError::NotFound => "That one doesn't exist anymore.",
        }
    }
}
