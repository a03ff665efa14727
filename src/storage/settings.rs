//! Key/value bot settings with read-through defaults.
//!
//! The admin panel writes these rows; the bot only reads them. A missing
//! or unparsable value falls back to the compiled-in default.

use rusqlite::{params, Connection, OptionalExtension, Result};

/// Get a raw setting value by key.
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM bot_settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Insert or replace a setting.
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO bot_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = ?2",
        params![key, value],
    )?;
    Ok(())
}

/// Get an integer setting, falling back to `default` when the key is
/// missing or does not parse.
pub fn get_setting_i64(conn: &Connection, key: &str, default: i64) -> Result<i64> {
    let value = get_setting(conn, key)?;
    Ok(value.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::memory_conn;

    #[test]
    fn missing_key_falls_back_to_default() {
        let conn = memory_conn();
        assert_eq!(get_setting_i64(&conn, "daily_reward_amount", 10).unwrap(), 10);
    }

    #[test]
    fn stored_value_overrides_default() {
        let conn = memory_conn();
        set_setting(&conn, "daily_reward_amount", "25").unwrap();
        assert_eq!(get_setting_i64(&conn, "daily_reward_amount", 10).unwrap(), 25);

        set_setting(&conn, "daily_reward_amount", "40").unwrap();
        assert_eq!(get_setting_i64(&conn, "daily_reward_amount", 10).unwrap(), 40);
    }

    #[test]
    fn garbage_value_falls_back_to_default() {
        let conn = memory_conn();
        set_setting(&conn, "referral_reward_amount", "lots").unwrap();
        assert_eq!(get_setting_i64(&conn, "referral_reward_amount", 5).unwrap(), 5);
    }
}
