//! Raffle rows and guarded entry-counter updates.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

/// A raffle row from the database.
#[derive(Debug, Clone)]
pub struct Raffle {
    pub id: i64,
    pub title: String,
    pub prize: String,
    pub entry_cost: i64,
    /// Monotonically non-decreasing while the raffle is active
    pub current_entries: i64,
    pub max_entries: Option<i64>,
    /// RFC 3339 UTC timestamp
    pub ends_at: String,
    pub active: bool,
    pub created_at: String,
}

impl Raffle {
    /// Whether the raffle accepts entries at `now`.
    /// An unparsable `ends_at` counts as ended.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(max) = self.max_entries {
            if self.current_entries >= max {
                return false;
            }
        }
        match DateTime::parse_from_rfc3339(&self.ends_at) {
            Ok(ends) => now < ends.with_timezone(&Utc),
            Err(_) => false,
        }
    }
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raffle> {
    Ok(Raffle {
        id: row.get(0)?,
        title: row.get(1)?,
        prize: row.get(2)?,
        entry_cost: row.get(3)?,
        current_entries: row.get(4)?,
        max_entries: row.get(5)?,
        ends_at: row.get(6)?,
        active: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
    })
}

const RAFFLE_COLUMNS: &str =
    "id, title, prize, entry_cost, current_entries, max_entries, ends_at, active, created_at";

/// Create a raffle. Returns its id.
pub fn create_raffle(
    conn: &Connection,
    title: &str,
    prize: &str,
    entry_cost: i64,
    max_entries: Option<i64>,
    ends_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO raffles (title, prize, entry_cost, max_entries, ends_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, prize, entry_cost, max_entries, ends_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a raffle by id.
pub fn get_raffle(conn: &Connection, id: i64) -> Result<Option<Raffle>> {
    conn.query_row(
        &format!("SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = ?1"),
        params![id],
        parse_row,
    )
    .optional()
}

/// Active raffles in id order.
///
/// This ordering is what numbered selection indexes into, so it must be
/// stable between the list the user saw and the reply they send.
pub fn list_active_raffles(conn: &Connection) -> Result<Vec<Raffle>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {RAFFLE_COLUMNS} FROM raffles WHERE active = 1 ORDER BY id"))?;
    let rows = stmt.query_map([], parse_row)?;

    let mut raffles = Vec::new();
    for row in rows {
        raffles.push(row?);
    }
    Ok(raffles)
}

/// Bump the entry counter, guarded against a full or inactive raffle.
/// Returns `false` when the guard fails.
pub fn try_increment_entries(conn: &Connection, id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE raffles SET current_entries = current_entries + 1
         WHERE id = ?1 AND active = 1
           AND (max_entries IS NULL OR current_entries < max_entries)",
        params![id],
    )?;
    Ok(updated > 0)
}

/// Create or bump the per-user entry row for a raffle.
pub fn upsert_raffle_entry(conn: &Connection, raffle_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO raffle_entries (raffle_id, user_id, entries) VALUES (?1, ?2, 1)
         ON CONFLICT(raffle_id, user_id) DO UPDATE SET entries = entries + 1",
        params![raffle_id, user_id],
    )?;
    Ok(())
}

/// How many entries a user holds in a raffle.
pub fn user_entry_count(conn: &Connection, raffle_id: i64, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT entries FROM raffle_entries WHERE raffle_id = ?1 AND user_id = ?2",
        params![raffle_id, user_id],
        |row| row.get(0),
    )
    .optional()
    .map(|v| v.unwrap_or(0))
}

/// Deactivate raffles whose end time has passed or that reached their
/// entry cap. Returns how many rows were flipped.
pub fn deactivate_ended_raffles(conn: &Connection, now: &str) -> Result<usize> {
    let count = conn.execute(
        "UPDATE raffles SET active = 0
         WHERE active = 1
           AND (ends_at <= ?1
                OR (max_entries IS NOT NULL AND current_entries >= max_entries))",
        params![now],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::memory_conn;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn is_open_respects_flag_cap_and_end_time() {
        let raffle = Raffle {
            id: 1,
            title: "Weekly".into(),
            prize: "Sticker pack".into(),
            entry_cost: 4,
            current_entries: 2,
            max_entries: Some(3),
            ends_at: "2026-03-01T00:00:00+00:00".into(),
            active: true,
            created_at: String::new(),
        };
        assert!(raffle.is_open(utc("2026-02-28T23:59:00+00:00")));
        assert!(!raffle.is_open(utc("2026-03-01T00:00:00+00:00")));

        let full = Raffle {
            current_entries: 3,
            ..raffle.clone()
        };
        assert!(!full.is_open(utc("2026-02-28T23:59:00+00:00")));

        let inactive = Raffle {
            active: false,
            ..raffle
        };
        assert!(!inactive.is_open(utc("2026-02-28T23:59:00+00:00")));
    }

    #[test]
    fn increment_stops_at_max_entries() {
        let conn = memory_conn();
        let id = create_raffle(&conn, "Weekly", "Mug", 4, Some(2), "2026-03-01T00:00:00+00:00").unwrap();

        assert!(try_increment_entries(&conn, id).unwrap());
        assert!(try_increment_entries(&conn, id).unwrap());
        assert!(!try_increment_entries(&conn, id).unwrap());
        assert_eq!(get_raffle(&conn, id).unwrap().unwrap().current_entries, 2);
    }

    #[test]
    fn upsert_entry_accumulates_per_user() {
        let conn = memory_conn();
        let id = create_raffle(&conn, "Weekly", "Mug", 4, None, "2026-03-01T00:00:00+00:00").unwrap();

        upsert_raffle_entry(&conn, id, 100).unwrap();
        upsert_raffle_entry(&conn, id, 100).unwrap();
        upsert_raffle_entry(&conn, id, 200).unwrap();

        assert_eq!(user_entry_count(&conn, id, 100).unwrap(), 2);
        assert_eq!(user_entry_count(&conn, id, 200).unwrap(), 1);
        assert_eq!(user_entry_count(&conn, id, 300).unwrap(), 0);
    }

    #[test]
    fn sweep_deactivates_ended_and_full_raffles() {
        let conn = memory_conn();
        let ended = create_raffle(&conn, "Old", "Mug", 4, None, "2026-01-01T00:00:00+00:00").unwrap();
        let full = create_raffle(&conn, "Full", "Mug", 4, Some(1), "2026-12-01T00:00:00+00:00").unwrap();
        let open = create_raffle(&conn, "Open", "Mug", 4, None, "2026-12-01T00:00:00+00:00").unwrap();
        try_increment_entries(&conn, full).unwrap();

        let flipped = deactivate_ended_raffles(&conn, "2026-06-01T00:00:00+00:00").unwrap();
        assert_eq!(flipped, 2);
        assert!(!get_raffle(&conn, ended).unwrap().unwrap().active);
        assert!(!get_raffle(&conn, full).unwrap().unwrap().active);
        assert!(get_raffle(&conn, open).unwrap().unwrap().active);

        let active = list_active_raffles(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open);
    }
}
