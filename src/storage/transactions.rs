//! Append-only ledger of balance changes.
//!
//! Rows are never updated or deleted: the sum of a user's transaction
//! amounts always equals their current coin balance.

use rusqlite::{params, Connection, Result};
use serde::Serialize;

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    DailyReward,
    Referral,
    RaffleEntry,
    ShopPurchase,
    AdminGrant,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::DailyReward => "daily_reward",
            TransactionKind::Referral => "referral",
            TransactionKind::RaffleEntry => "raffle_entry",
            TransactionKind::ShopPurchase => "shop_purchase",
            TransactionKind::AdminGrant => "admin_grant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily_reward" => Some(TransactionKind::DailyReward),
            "referral" => Some(TransactionKind::Referral),
            "raffle_entry" => Some(TransactionKind::RaffleEntry),
            "shop_purchase" => Some(TransactionKind::ShopPurchase),
            "admin_grant" => Some(TransactionKind::AdminGrant),
            _ => None,
        }
    }
}

/// A ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub created_at: String,
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let kind_str: String = row.get(2)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: TransactionKind::from_str(&kind_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown transaction kind: {kind_str}").into(),
            )
        })?,
        amount: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Append a transaction to the ledger.
pub fn append_transaction(
    conn: &Connection,
    user_id: i64,
    kind: TransactionKind,
    amount: i64,
    description: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (user_id, kind, amount, description) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, kind.as_str(), amount, description],
    )?;
    Ok(())
}

/// Most recent transactions for a user, newest first.
pub fn recent_transactions(conn: &Connection, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, amount, description, created_at FROM transactions
         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], parse_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Full transaction history for a user, oldest first (for export).
pub fn all_transactions(conn: &Connection, user_id: i64) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, amount, description, created_at FROM transactions
         WHERE user_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![user_id], parse_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Sum of all transaction amounts for a user.
///
/// Equals the user's coin balance whenever no operation is in flight.
pub fn transaction_sum(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}
