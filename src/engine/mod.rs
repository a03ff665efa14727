//! Validated, atomic state transitions over the user ledger.
//!
//! Each operation runs inside one SQLite transaction with guarded
//! single-statement updates, and callers additionally serialize operations
//! per user via [`locks::UserLocks`], so concurrent events for the same
//! user are equivalent to some serial ordering of them.

pub mod locks;
pub mod market;
pub mod rewards;

pub use locks::UserLocks;
pub use market::{enter_raffle, purchase_item, Receipt};
pub use rewards::{award_referral, claim_daily, DailyReward, ReferralReward};
