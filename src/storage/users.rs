//! User ledger: identity, referral codes, and guarded balance mutations.
//!
//! All balance changes go through conditional single-statement updates so
//! that two concurrent operations on the same row can never both pass a
//! stale balance or eligibility check.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// A user row from the database.
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram id of the user
    pub telegram_id: i64,
    /// Telegram username, if available
    pub username: Option<String>,
    /// First name shown in chats
    pub first_name: Option<String>,
    /// Unique code other users redeem to credit this user
    pub referral_code: String,
    /// Current coin balance; never negative
    pub coins: i64,
    /// Consecutive daily-claim count
    pub streak: i64,
    /// Timestamp of the last daily claim (RFC 3339 UTC)
    pub last_daily_reward: Option<String>,
    /// Referral code this user signed up with; write-once
    pub referred_by: Option<String>,
    pub created_at: String,
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        referral_code: row.get(3)?,
        coins: row.get(4)?,
        streak: row.get(5)?,
        last_daily_reward: row.get(6)?,
        referred_by: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const USER_COLUMNS: &str = "telegram_id, username, first_name, referral_code, coins, streak, \
                            last_daily_reward, referred_by, created_at";

/// How many fresh codes we try before giving up on a duplicate collision.
const CODE_ATTEMPTS: usize = 5;

fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Create a new user with a freshly generated unique referral code.
///
/// Retries code generation on a UNIQUE collision; any other database error
/// is returned as-is.
pub fn create_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<User> {
    let mut last_err: Option<rusqlite::Error> = None;
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_referral_code();
        match conn.execute(
            "INSERT INTO users (telegram_id, username, first_name, referral_code) VALUES (?1, ?2, ?3, ?4)",
            params![telegram_id, username, first_name, code],
        ) {
            Ok(_) => {
                return conn.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"),
                    params![telegram_id],
                    parse_row,
                );
            }
            Err(e) if is_referral_code_collision(&e) => {
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(rusqlite::Error::QueryReturnedNoRows))
}

fn is_referral_code_collision(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("referral_code")
    )
}

/// Get a user by Telegram id.
pub fn get_user(conn: &Connection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"),
        params![telegram_id],
        parse_row,
    )
    .optional()
}

/// Get a user by their referral code.
pub fn get_user_by_referral_code(conn: &Connection, code: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?1"),
        params![code],
        parse_row,
    )
    .optional()
}

/// Get an existing user or create a fresh one from the event's identity.
/// Display fields are refreshed on every call so profiles don't go stale.
pub fn get_or_create_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<User> {
    if let Some(user) = get_user(conn, telegram_id)? {
        if user.username.as_deref() != username || user.first_name.as_deref() != first_name {
            conn.execute(
                "UPDATE users SET username = ?2, first_name = ?3 WHERE telegram_id = ?1",
                params![telegram_id, username, first_name],
            )?;
        }
        return Ok(User {
            username: username.map(str::to_string),
            first_name: first_name.map(str::to_string),
            ..user
        });
    }
    create_user(conn, telegram_id, username, first_name)
}

/// All user ids, for broadcasts.
pub fn list_user_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM users ORDER BY telegram_id")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Unconditionally credit coins to a user.
pub fn credit_coins(conn: &Connection, telegram_id: i64, amount: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET coins = coins + ?2 WHERE telegram_id = ?1",
        params![telegram_id, amount],
    )?;
    Ok(())
}

/// Debit coins only when the balance covers the amount.
///
/// Returns `false` when the guard fails (insufficient balance); the row is
/// untouched in that case. The check and the write are one SQL statement,
/// so a concurrent debit cannot slip between them.
pub fn try_debit_coins(conn: &Connection, telegram_id: i64, amount: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET coins = coins - ?2 WHERE telegram_id = ?1 AND coins >= ?2",
        params![telegram_id, amount],
    )?;
    Ok(updated > 0)
}

/// Record a daily claim: credit coins, bump the streak, stamp the claim time.
///
/// Compare-and-swap on `last_daily_reward`: the update only lands when the
/// stored value still equals `previous_claim` (the value the eligibility
/// check saw). Returns `false` when a concurrent claim won the race.
pub fn record_daily_claim(
    conn: &Connection,
    telegram_id: i64,
    previous_claim: Option<&str>,
    claimed_at: &str,
    new_streak: i64,
    amount: i64,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET coins = coins + ?2, streak = ?3, last_daily_reward = ?4
         WHERE telegram_id = ?1 AND last_daily_reward IS ?5",
        params![telegram_id, amount, new_streak, claimed_at, previous_claim],
    )?;
    Ok(updated > 0)
}

/// Set `referred_by` exactly once.
///
/// Returns `false` when the column is already set; the guard makes a second
/// redemption (including a racing one) a no-op.
pub fn set_referred_by(conn: &Connection, telegram_id: i64, code: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET referred_by = ?2 WHERE telegram_id = ?1 AND referred_by IS NULL",
        params![telegram_id, code],
    )?;
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::memory_conn;

    #[test]
    fn create_user_generates_unique_codes() {
        let conn = memory_conn();
        let a = create_user(&conn, 1, Some("alice"), Some("Alice")).unwrap();
        let b = create_user(&conn, 2, Some("bob"), None).unwrap();
        assert_eq!(a.referral_code.len(), 8);
        assert_ne!(a.referral_code, b.referral_code);
        assert_eq!(a.coins, 0);
        assert_eq!(a.streak, 0);
        assert!(a.last_daily_reward.is_none());
    }

    #[test]
    fn get_or_create_refreshes_identity() {
        let conn = memory_conn();
        create_user(&conn, 1, Some("old"), Some("Old")).unwrap();
        let user = get_or_create_user(&conn, 1, Some("new"), Some("New")).unwrap();
        assert_eq!(user.username.as_deref(), Some("new"));

        let reread = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(reread.username.as_deref(), Some("new"));
        assert_eq!(reread.first_name.as_deref(), Some("New"));
    }

    #[test]
    fn get_user_by_referral_code_roundtrip() {
        let conn = memory_conn();
        let user = create_user(&conn, 7, None, None).unwrap();
        let found = get_user_by_referral_code(&conn, &user.referral_code)
            .unwrap()
            .unwrap();
        assert_eq!(found.telegram_id, 7);
        assert!(get_user_by_referral_code(&conn, "NOPE1234").unwrap().is_none());
    }

    #[test]
    fn try_debit_respects_balance_guard() {
        let conn = memory_conn();
        create_user(&conn, 1, None, None).unwrap();
        credit_coins(&conn, 1, 10).unwrap();

        assert!(try_debit_coins(&conn, 1, 10).unwrap());
        assert!(!try_debit_coins(&conn, 1, 1).unwrap());
        assert_eq!(get_user(&conn, 1).unwrap().unwrap().coins, 0);
    }

    #[test]
    fn record_daily_claim_is_compare_and_swap() {
        let conn = memory_conn();
        create_user(&conn, 1, None, None).unwrap();

        assert!(record_daily_claim(&conn, 1, None, "2026-01-01T10:00:00+00:00", 1, 10).unwrap());
        // Stale previous value: the first claim already moved the timestamp.
        assert!(!record_daily_claim(&conn, 1, None, "2026-01-01T10:00:05+00:00", 2, 10).unwrap());

        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.coins, 10);
        assert_eq!(user.streak, 1);
    }

    #[test]
    fn set_referred_by_is_write_once() {
        let conn = memory_conn();
        create_user(&conn, 1, None, None).unwrap();
        assert!(set_referred_by(&conn, 1, "AAAA1111").unwrap());
        assert!(!set_referred_by(&conn, 1, "BBBB2222").unwrap());
        assert_eq!(
            get_user(&conn, 1).unwrap().unwrap().referred_by.as_deref(),
            Some("AAAA1111")
        );
    }
}
