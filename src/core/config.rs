use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: grosh.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "grosh.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: grosh.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "grosh.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
/// Empty when neither is set; the bot transport is skipped in that case
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (optional)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Reward configuration
///
/// Amounts are defaults only: the live values are read through the
/// `bot_settings` table, so the admin panel can retune them without a
/// redeploy. Missing keys fall back to these constants.
pub mod rewards {
    use super::Lazy;
    use std::env;

    /// `bot_settings` key for the daily check-in amount
    pub const DAILY_AMOUNT_KEY: &str = "daily_reward_amount";

    /// Default coins credited per daily check-in
    /// Read from DAILY_REWARD_AMOUNT environment variable
    pub static DAILY_AMOUNT_DEFAULT: Lazy<i64> = Lazy::new(|| {
        env::var("DAILY_REWARD_AMOUNT")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(10)
    });

    /// `bot_settings` key for the referral bonus amount
    pub const REFERRAL_AMOUNT_KEY: &str = "referral_reward_amount";

    /// Default coins credited to each side of a referral
    /// Read from REFERRAL_REWARD_AMOUNT environment variable
    pub static REFERRAL_AMOUNT_DEFAULT: Lazy<i64> = Lazy::new(|| {
        env::var("REFERRAL_REWARD_AMOUNT")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(5)
    });

    /// Civil-day boundary offset west of UTC, in hours.
    ///
    /// "Today" for daily-claim eligibility is midnight-to-midnight at
    /// UTC-8, always -8 (never -7): real PST/PDT daylight-saving shifts
    /// are intentionally ignored.
    pub const DAY_BOUNDARY_OFFSET_HOURS: i32 = 8;
}

/// Conversation state configuration
pub mod conversation {
    use super::Duration;

    /// How long a pending free-text prompt (e.g. "enter invite code")
    /// stays valid before it is swept (in seconds)
    pub const TTL_SECS: u64 = 600;

    /// Interval between expired-state sweeps (in seconds)
    pub const CLEANUP_INTERVAL_SECS: u64 = 300;

    /// Pending-input time-to-live duration
    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }

    /// Sweep interval duration
    pub fn cleanup_interval() -> Duration {
        Duration::from_secs(CLEANUP_INTERVAL_SECS)
    }
}

/// Broadcast configuration
pub mod broadcast {
    use super::Duration;

    /// Pacing delay between individual broadcast sends (in milliseconds)
    /// Keeps the send rate under the Bot API per-second limits
    pub const PACE_MS: u64 = 50;

    /// Pacing delay duration
    pub fn pace() -> Duration {
        Duration::from_millis(PACE_MS)
    }
}

/// Maintenance configuration
pub mod maintenance {
    use super::Duration;

    /// Interval between raffle expiry sweeps (in seconds)
    pub const RAFFLE_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

    /// Raffle sweep interval duration
    pub fn raffle_sweep_interval() -> Duration {
        Duration::from_secs(RAFFLE_SWEEP_INTERVAL_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }

    /// Base for exponential backoff calculation
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
}

/// Admin configuration
pub mod admin {
    use super::Lazy;
    use std::env;

    /// Telegram user id allowed to run hidden admin commands
    /// Read from ADMIN_USER_ID environment variable; 0 disables them
    pub static ADMIN_USER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_USER_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
    });
}
