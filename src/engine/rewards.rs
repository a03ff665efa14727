//! Daily check-in and referral rewards.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rusqlite::Connection;

use crate::core::config;
use crate::core::error::{AppResult, ValidationError};
use crate::storage::transactions::{append_transaction, TransactionKind};
use crate::storage::{settings, users};

/// Fixed reference offset for the "one claim per day" window.
/// Always UTC-8; daylight saving in real PST/PDT is intentionally ignored,
/// so the boundary never moves during the year.
static DAY_BOUNDARY: Lazy<FixedOffset> = Lazy::new(|| {
    FixedOffset::west_opt(config::rewards::DAY_BOUNDARY_OFFSET_HOURS * 3600)
        .expect("day boundary offset is a valid fixed offset")
});

/// Civil day a timestamp falls on, in the fixed reference offset.
pub fn civil_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&*DAY_BOUNDARY).date_naive()
}

fn stored_civil_day(stored: Option<&str>) -> Option<NaiveDate> {
    stored
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| civil_day(dt.with_timezone(&Utc)))
}

/// Outcome of a successful daily claim.
#[derive(Debug, Clone, Copy)]
pub struct DailyReward {
    /// Coins credited by this claim
    pub amount: i64,
    /// Balance after the claim
    pub coins: i64,
    /// Streak after the claim
    pub streak: i64,
}

/// Outcome of a successful referral redemption.
#[derive(Debug, Clone)]
pub struct ReferralReward {
    /// Coins credited to each side
    pub amount: i64,
    /// The user who owns the redeemed code
    pub referrer_id: i64,
    /// Referee balance after the credit
    pub referee_coins: i64,
}

/// Claim the daily reward for a user.
pub fn claim_daily(conn: &mut Connection, user_id: i64) -> AppResult<DailyReward> {
    claim_daily_at(conn, user_id, Utc::now())
}

/// Claim the daily reward as of `now`.
///
/// Eligibility compares civil days in the fixed UTC-8 offset: a claim at
/// 23:59 and one at 00:01 the next civil day are one day apart no matter
/// how few wall-clock seconds separate them. The streak continues only
/// when the previous claim was exactly one civil day ago; otherwise it
/// restarts at 1.
///
/// The whole claim is one SQLite transaction, and the balance/streak
/// update is a compare-and-swap on `last_daily_reward`, so two concurrent
/// claims can never both be credited.
pub fn claim_daily_at(conn: &mut Connection, user_id: i64, now: DateTime<Utc>) -> AppResult<DailyReward> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let user = users::get_user(&tx, user_id)?.ok_or(ValidationError::NotFound)?;
    let today = civil_day(now);
    let previous_day = stored_civil_day(user.last_daily_reward.as_deref());

    if previous_day == Some(today) {
        return Err(ValidationError::AlreadyClaimedToday.into());
    }

    let streak = match previous_day {
        Some(day) if (today - day).num_days() == 1 => user.streak + 1,
        _ => 1,
    };
    let amount = settings::get_setting_i64(
        &tx,
        config::rewards::DAILY_AMOUNT_KEY,
        *config::rewards::DAILY_AMOUNT_DEFAULT,
    )?;

    let claimed_at = now.to_rfc3339();
    let landed = users::record_daily_claim(
        &tx,
        user_id,
        user.last_daily_reward.as_deref(),
        &claimed_at,
        streak,
        amount,
    )?;
    if !landed {
        // A concurrent claim moved the timestamp after we read it.
        return Err(ValidationError::AlreadyClaimedToday.into());
    }

    append_transaction(
        &tx,
        user_id,
        TransactionKind::DailyReward,
        amount,
        &format!("Daily check-in (day {} of streak)", streak),
    )?;
    tx.commit()?;

    log::info!(
        "Daily claim: user {} +{} coins (streak {})",
        user_id,
        amount,
        streak
    );
    Ok(DailyReward {
        amount,
        coins: user.coins + amount,
        streak,
    })
}

/// Redeem a referral code for a user, crediting both sides once.
///
/// `referred_by` is written exactly once behind a guard, so a repeated or
/// racing redemption surfaces as `AlreadyReferred` and no double credit is
/// possible.
pub fn award_referral(conn: &mut Connection, referee_id: i64, code: &str) -> AppResult<ReferralReward> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let referee = users::get_user(&tx, referee_id)?.ok_or(ValidationError::NotFound)?;
    let referrer =
        users::get_user_by_referral_code(&tx, code)?.ok_or(ValidationError::UnknownCode)?;
    if referrer.telegram_id == referee.telegram_id {
        return Err(ValidationError::SelfReferral.into());
    }
    if referee.referred_by.is_some() {
        return Err(ValidationError::AlreadyReferred.into());
    }

    let amount = settings::get_setting_i64(
        &tx,
        config::rewards::REFERRAL_AMOUNT_KEY,
        *config::rewards::REFERRAL_AMOUNT_DEFAULT,
    )?;

    if !users::set_referred_by(&tx, referee_id, &referrer.referral_code)? {
        return Err(ValidationError::AlreadyReferred.into());
    }

    let referee_name = referee
        .username
        .clone()
        .or(referee.first_name.clone())
        .unwrap_or_else(|| referee.telegram_id.to_string());
    users::credit_coins(&tx, referrer.telegram_id, amount)?;
    append_transaction(
        &tx,
        referrer.telegram_id,
        TransactionKind::Referral,
        amount,
        &format!("Invited {}", referee_name),
    )?;
    users::credit_coins(&tx, referee_id, amount)?;
    append_transaction(
        &tx,
        referee_id,
        TransactionKind::Referral,
        amount,
        "Joined with an invite code",
    )?;
    tx.commit()?;

    log::info!(
        "Referral: user {} redeemed code of user {} (+{} each)",
        referee_id,
        referrer.telegram_id,
        amount
    );
    Ok(ReferralReward {
        amount,
        referrer_id: referrer.telegram_id,
        referee_coins: referee.coins + amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::storage::testutil::memory_conn;
    use crate::storage::transactions::transaction_sum;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn assert_rejected(result: AppResult<impl std::fmt::Debug>, expected: ValidationError) {
        match result {
            Err(AppError::Validation(v)) => assert_eq!(v, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    // ── civil day boundary ───────────────────────────────────────────────

    #[test]
    fn civil_day_uses_fixed_utc_minus_8() {
        // 07:59 UTC is 23:59 of the previous day at UTC-8.
        assert_eq!(
            civil_day(utc("2026-03-10T07:59:00+00:00")),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
        assert_eq!(
            civil_day(utc("2026-03-10T08:01:00+00:00")),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
    }

    #[test]
    fn boundary_ignores_daylight_saving() {
        // July 1 (PDT in the real zone): the boundary stays 08:00 UTC,
        // always -8, never -7.
        assert_eq!(
            civil_day(utc("2026-07-01T07:59:00+00:00")),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
        );
        assert_eq!(
            civil_day(utc("2026-07-01T08:00:00+00:00")),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
        );
    }

    // ── claim_daily ──────────────────────────────────────────────────────

    #[test]
    fn first_claim_credits_and_starts_streak() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();

        let reward = claim_daily_at(&mut conn, 1, utc("2026-03-10T12:00:00+00:00")).unwrap();
        assert_eq!(reward.amount, 10);
        assert_eq!(reward.coins, 10);
        assert_eq!(reward.streak, 1);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 10);
    }

    #[test]
    fn second_claim_same_civil_day_is_rejected() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();

        claim_daily_at(&mut conn, 1, utc("2026-03-10T12:00:00+00:00")).unwrap();
        assert_rejected(
            claim_daily_at(&mut conn, 1, utc("2026-03-10T23:00:00+00:00")),
            ValidationError::AlreadyClaimedToday,
        );

        let user = users::get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.coins, 10);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 10);
    }

    #[test]
    fn consecutive_civil_days_extend_the_streak() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();

        // 07:50 UTC and 08:10 UTC straddle the UTC-8 midnight: different
        // civil days even though only 20 minutes apart.
        let first = claim_daily_at(&mut conn, 1, utc("2026-03-10T07:50:00+00:00")).unwrap();
        let second = claim_daily_at(&mut conn, 1, utc("2026-03-10T08:10:00+00:00")).unwrap();
        assert_eq!(first.streak, 1);
        assert_eq!(second.streak, 2);
        assert_eq!(second.coins, 20);
    }

    #[test]
    fn skipping_a_day_resets_the_streak() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();

        claim_daily_at(&mut conn, 1, utc("2026-03-10T12:00:00+00:00")).unwrap();
        claim_daily_at(&mut conn, 1, utc("2026-03-11T12:00:00+00:00")).unwrap();
        let after_gap = claim_daily_at(&mut conn, 1, utc("2026-03-14T12:00:00+00:00")).unwrap();
        assert_eq!(after_gap.streak, 1);
        assert_eq!(after_gap.coins, 30);
    }

    #[test]
    fn claim_amount_reads_settings_table() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();
        settings::set_setting(&conn, config::rewards::DAILY_AMOUNT_KEY, "25").unwrap();

        let reward = claim_daily_at(&mut conn, 1, utc("2026-03-10T12:00:00+00:00")).unwrap();
        assert_eq!(reward.amount, 25);
        assert_eq!(reward.coins, 25);
    }

    // ── award_referral ───────────────────────────────────────────────────

    #[test]
    fn referral_credits_both_sides_once() {
        let mut conn = memory_conn();
        let referrer = users::create_user(&conn, 10, Some("ref"), None).unwrap();
        users::create_user(&conn, 20, Some("new"), None).unwrap();
        users::credit_coins(&conn, 10, 10).unwrap();

        let reward = award_referral(&mut conn, 20, &referrer.referral_code).unwrap();
        assert_eq!(reward.amount, 5);
        assert_eq!(reward.referrer_id, 10);
        assert_eq!(reward.referee_coins, 5);

        assert_eq!(users::get_user(&conn, 10).unwrap().unwrap().coins, 15);
        let referee = users::get_user(&conn, 20).unwrap().unwrap();
        assert_eq!(referee.coins, 5);
        assert_eq!(referee.referred_by.as_deref(), Some(referrer.referral_code.as_str()));

        // Second attempt with any code leaves both balances unchanged.
        let other = users::create_user(&conn, 30, None, None).unwrap();
        assert_rejected(
            award_referral(&mut conn, 20, &other.referral_code),
            ValidationError::AlreadyReferred,
        );
        assert_eq!(users::get_user(&conn, 10).unwrap().unwrap().coins, 15);
        assert_eq!(users::get_user(&conn, 20).unwrap().unwrap().coins, 5);
    }

    #[test]
    fn self_referral_is_rejected() {
        let mut conn = memory_conn();
        let user = users::create_user(&conn, 1, None, None).unwrap();

        assert_rejected(
            award_referral(&mut conn, 1, &user.referral_code),
            ValidationError::SelfReferral,
        );
        assert_eq!(users::get_user(&conn, 1).unwrap().unwrap().coins, 0);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let mut conn = memory_conn();
        users::create_user(&conn, 1, None, None).unwrap();

        assert_rejected(
            award_referral(&mut conn, 1, "ZZZZ9999"),
            ValidationError::UnknownCode,
        );
    }

    #[test]
    fn referral_amount_reads_settings_table() {
        let mut conn = memory_conn();
        let referrer = users::create_user(&conn, 10, None, None).unwrap();
        users::create_user(&conn, 20, None, None).unwrap();
        settings::set_setting(&conn, config::rewards::REFERRAL_AMOUNT_KEY, "8").unwrap();

        let reward = award_referral(&mut conn, 20, &referrer.referral_code).unwrap();
        assert_eq!(reward.amount, 8);
        assert_eq!(users::get_user(&conn, 10).unwrap().unwrap().coins, 8);
    }
}
