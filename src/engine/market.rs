//! Raffle entries and shop purchases: validated debit plus side effect.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::core::error::{AppResult, ValidationError};
use crate::storage::transactions::{append_transaction, TransactionKind};
use crate::storage::{raffles, shop, users};

/// Outcome of a successful raffle entry or purchase.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Coins debited
    pub cost: i64,
    /// Balance after the debit
    pub balance: i64,
    /// Title of the raffle or name of the item
    pub title: String,
}

/// Enter a raffle, debiting the entry cost.
pub fn enter_raffle(conn: &mut Connection, user_id: i64, raffle_id: i64) -> AppResult<Receipt> {
    enter_raffle_at(conn, user_id, raffle_id, Utc::now())
}

/// Enter a raffle as of `now`.
///
/// Debit, entry-counter bump, per-user entry row, and ledger append are one
/// SQLite transaction: a failed guard anywhere rolls everything back, so no
/// partial effect is ever observable.
pub fn enter_raffle_at(
    conn: &mut Connection,
    user_id: i64,
    raffle_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Receipt> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let raffle = raffles::get_raffle(&tx, raffle_id)?.ok_or(ValidationError::NotFound)?;
    if !raffle.is_open(now) {
        return Err(ValidationError::RaffleClosed.into());
    }
    let user = users::get_user(&tx, user_id)?.ok_or(ValidationError::NotFound)?;
    if user.coins < raffle.entry_cost {
        return Err(ValidationError::InsufficientBalance.into());
    }

    if !users::try_debit_coins(&tx, user_id, raffle.entry_cost)? {
        // The balance moved between the read and the guarded write.
        return Err(ValidationError::InsufficientBalance.into());
    }
    if !raffles::try_increment_entries(&tx, raffle_id)? {
        return Err(ValidationError::RaffleClosed.into());
    }
    raffles::upsert_raffle_entry(&tx, raffle_id, user_id)?;
    append_transaction(
        &tx,
        user_id,
        TransactionKind::RaffleEntry,
        -raffle.entry_cost,
        &format!("Entered raffle: {}", raffle.title),
    )?;
    tx.commit()?;

    log::info!(
        "Raffle entry: user {} paid {} for raffle {}",
        user_id,
        raffle.entry_cost,
        raffle_id
    );
    Ok(Receipt {
        cost: raffle.entry_cost,
        balance: user.coins - raffle.entry_cost,
        title: raffle.title,
    })
}

/// Buy one unit of a shop item.
///
/// Stock is checked before balance, so a broke user still sees "out of
/// stock" for a sold-out item. Debit, stock decrement, purchase row, and
/// ledger append are one SQLite transaction.
pub fn purchase_item(conn: &mut Connection, user_id: i64, item_id: i64) -> AppResult<Receipt> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let item = shop::get_item(&tx, item_id)?.ok_or(ValidationError::NotFound)?;
    if !item.active {
        return Err(ValidationError::NotFound.into());
    }
    if !item.in_stock() {
        return Err(ValidationError::OutOfStock.into());
    }
    let user = users::get_user(&tx, user_id)?.ok_or(ValidationError::NotFound)?;
    if user.coins < item.cost {
        return Err(ValidationError::InsufficientBalance.into());
    }

    if !users::try_debit_coins(&tx, user_id, item.cost)? {
        return Err(ValidationError::InsufficientBalance.into());
    }
    if !shop::try_decrement_stock(&tx, item_id)? {
        return Err(ValidationError::OutOfStock.into());
    }
    shop::create_purchase(&tx, item_id, user_id, 1, item.cost)?;
    append_transaction(
        &tx,
        user_id,
        TransactionKind::ShopPurchase,
        -item.cost,
        &format!("Bought: {}", item.name),
    )?;
    tx.commit()?;

    log::info!("Purchase: user {} paid {} for item {}", user_id, item.cost, item_id);
    Ok(Receipt {
        cost: item.cost,
        balance: user.coins - item.cost,
        title: item.name,
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

    fn assert_rejected(result: AppResult<Receipt>, expected: ValidationError) {
        match result {
            Err(AppError::Validation(v)) => assert_eq!(v, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    const OPEN: &str = "2026-03-10T12:00:00+00:00";

    fn seed_user(conn: &rusqlite::Connection, id: i64, coins: i64) {
        users::create_user(conn, id, None, None).unwrap();
        if coins > 0 {
            users::credit_coins(conn, id, coins).unwrap();
        }
    }

    // ── enter_raffle ─────────────────────────────────────────────────────

    #[test]
    fn entry_debits_and_records_everything() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 10);
        let raffle_id =
            raffles::create_raffle(&conn, "Weekly", "Mug", 4, None, "2026-03-20T00:00:00+00:00").unwrap();

        let receipt = enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)).unwrap();
        assert_eq!(receipt.cost, 4);
        assert_eq!(receipt.balance, 6);

        assert_eq!(users::get_user(&conn, 1).unwrap().unwrap().coins, 6);
        assert_eq!(raffles::get_raffle(&conn, raffle_id).unwrap().unwrap().current_entries, 1);
        assert_eq!(raffles::user_entry_count(&conn, raffle_id, 1).unwrap(), 1);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 6);
    }

    #[test]
    fn insufficient_balance_leaves_no_trace() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 3);
        let raffle_id =
            raffles::create_raffle(&conn, "Weekly", "Mug", 4, None, "2026-03-20T00:00:00+00:00").unwrap();

        assert_rejected(
            enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)),
            ValidationError::InsufficientBalance,
        );

        assert_eq!(users::get_user(&conn, 1).unwrap().unwrap().coins, 3);
        assert_eq!(raffles::get_raffle(&conn, raffle_id).unwrap().unwrap().current_entries, 0);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn closed_and_ended_raffles_reject_entries() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 100);
        let ended =
            raffles::create_raffle(&conn, "Old", "Mug", 4, None, "2026-01-01T00:00:00+00:00").unwrap();
        assert_rejected(
            enter_raffle_at(&mut conn, 1, ended, utc(OPEN)),
            ValidationError::RaffleClosed,
        );

        let capped =
            raffles::create_raffle(&conn, "Small", "Mug", 4, Some(1), "2026-03-20T00:00:00+00:00").unwrap();
        seed_user(&conn, 3, 10);
        enter_raffle_at(&mut conn, 3, capped, utc(OPEN)).unwrap();
        assert_rejected(
            enter_raffle_at(&mut conn, 1, capped, utc(OPEN)),
            ValidationError::RaffleClosed,
        );

        assert_rejected(
            enter_raffle_at(&mut conn, 1, 999, utc(OPEN)),
            ValidationError::NotFound,
        );
    }

    #[test]
    fn repeat_entries_accumulate() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 12);
        let raffle_id =
            raffles::create_raffle(&conn, "Weekly", "Mug", 4, None, "2026-03-20T00:00:00+00:00").unwrap();

        enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)).unwrap();
        enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)).unwrap();
        enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)).unwrap();
        assert_rejected(
            enter_raffle_at(&mut conn, 1, raffle_id, utc(OPEN)),
            ValidationError::InsufficientBalance,
        );

        assert_eq!(raffles::user_entry_count(&conn, raffle_id, 1).unwrap(), 3);
        assert_eq!(users::get_user(&conn, 1).unwrap().unwrap().coins, 0);
    }

    // ── purchase_item ────────────────────────────────────────────────────

    #[test]
    fn purchase_debits_decrements_and_records() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 25);
        let item_id = shop::create_item(&conn, "Mug", None, 20, Some(3)).unwrap();

        let receipt = purchase_item(&mut conn, 1, item_id).unwrap();
        assert_eq!(receipt.cost, 20);
        assert_eq!(receipt.balance, 5);

        assert_eq!(shop::get_item(&conn, item_id).unwrap().unwrap().stock, Some(2));
        assert_eq!(shop::user_purchases(&conn, 1, 10).unwrap().len(), 1);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 5);
    }

    #[test]
    fn out_of_stock_wins_over_balance() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 1000);
        let item_id = shop::create_item(&conn, "Mug", None, 20, Some(0)).unwrap();

        assert_rejected(purchase_item(&mut conn, 1, item_id), ValidationError::OutOfStock);
        assert_eq!(users::get_user(&conn, 1).unwrap().unwrap().coins, 1000);
    }

    #[test]
    fn broke_user_cannot_buy() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 19);
        let item_id = shop::create_item(&conn, "Mug", None, 20, None).unwrap();

        assert_rejected(purchase_item(&mut conn, 1, item_id), ValidationError::InsufficientBalance);
        assert_eq!(transaction_sum(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn inactive_item_reads_as_missing() {
        let mut conn = memory_conn();
        seed_user(&conn, 1, 100);
        let item_id = shop::create_item(&conn, "Mug", None, 20, None).unwrap();
        conn.execute("UPDATE shop_items SET active = 0 WHERE id = ?1", rusqlite::params![item_id])
            .unwrap();

        assert_rejected(purchase_item(&mut conn, 1, item_id), ValidationError::NotFound);
    }
}
