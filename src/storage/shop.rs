//! Shop items, guarded stock decrements, and purchase records.

use rusqlite::{params, Connection, OptionalExtension, Result};

/// A shop item row from the database.
#[derive(Debug, Clone)]
pub struct ShopItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cost: i64,
    /// None = unlimited; monotonically non-increasing otherwise
    pub stock: Option<i64>,
    pub active: bool,
    pub created_at: String,
}

impl ShopItem {
    /// Whether at least one unit can still be sold.
    pub fn in_stock(&self) -> bool {
        self.stock.map_or(true, |s| s > 0)
    }
}

/// A purchase row.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub quantity: i64,
    pub total_cost: i64,
    pub status: String,
    pub created_at: String,
}

fn parse_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShopItem> {
    Ok(ShopItem {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        cost: row.get(3)?,
        stock: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

const ITEM_COLUMNS: &str = "id, name, description, cost, stock, active, created_at";

/// Create a shop item. Returns its id.
pub fn create_item(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    cost: i64,
    stock: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO shop_items (name, description, cost, stock) VALUES (?1, ?2, ?3, ?4)",
        params![name, description, cost, stock],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get an item by id.
pub fn get_item(conn: &Connection, id: i64) -> Result<Option<ShopItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM shop_items WHERE id = ?1"),
        params![id],
        parse_item_row,
    )
    .optional()
}

/// Active items in id order (the numbered-selection ordering).
pub fn list_active_items(conn: &Connection) -> Result<Vec<ShopItem>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM shop_items WHERE active = 1 ORDER BY id"))?;
    let rows = stmt.query_map([], parse_item_row)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Decrement tracked stock by one, guarded against selling out.
///
/// Untracked stock (NULL) stays NULL: `NULL - 1` is NULL in SQLite, so
/// unlimited items pass the guard and keep unlimited stock. Returns
/// `false` when the item is inactive or sold out.
pub fn try_decrement_stock(conn: &Connection, id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE shop_items SET stock = stock - 1
         WHERE id = ?1 AND active = 1 AND (stock IS NULL OR stock > 0)",
        params![id],
    )?;
    Ok(updated > 0)
}

/// Record a completed purchase. Returns its id.
pub fn create_purchase(
    conn: &Connection,
    item_id: i64,
    user_id: i64,
    quantity: i64,
    total_cost: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO purchases (item_id, user_id, quantity, total_cost, status)
         VALUES (?1, ?2, ?3, ?4, 'completed')",
        params![item_id, user_id, quantity, total_cost],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Purchases made by a user, newest first.
pub fn user_purchases(conn: &Connection, user_id: i64, limit: i64) -> Result<Vec<Purchase>> {
    let mut stmt = conn.prepare(
        "SELECT id, item_id, user_id, quantity, total_cost, status, created_at
         FROM purchases WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], |row| {
        Ok(Purchase {
            id: row.get(0)?,
            item_id: row.get(1)?,
            user_id: row.get(2)?,
            quantity: row.get(3)?,
            total_cost: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut purchases = Vec::new();
    for row in rows {
        purchases.push(row?);
    }
    Ok(purchases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::memory_conn;

    #[test]
    fn tracked_stock_decrements_and_sells_out() {
        let conn = memory_conn();
        let id = create_item(&conn, "Mug", None, 20, Some(2)).unwrap();

        assert!(try_decrement_stock(&conn, id).unwrap());
        assert!(try_decrement_stock(&conn, id).unwrap());
        assert!(!try_decrement_stock(&conn, id).unwrap());

        let item = get_item(&conn, id).unwrap().unwrap();
        assert_eq!(item.stock, Some(0));
        assert!(!item.in_stock());
    }

    #[test]
    fn unlimited_stock_stays_unlimited() {
        let conn = memory_conn();
        let id = create_item(&conn, "Wallpaper", Some("Digital"), 5, None).unwrap();

        for _ in 0..10 {
            assert!(try_decrement_stock(&conn, id).unwrap());
        }
        let item = get_item(&conn, id).unwrap().unwrap();
        assert_eq!(item.stock, None);
        assert!(item.in_stock());
    }

    #[test]
    fn list_active_skips_inactive_items() {
        let conn = memory_conn();
        let a = create_item(&conn, "A", None, 1, None).unwrap();
        let b = create_item(&conn, "B", None, 2, None).unwrap();
        conn.execute("UPDATE shop_items SET active = 0 WHERE id = ?1", params![a])
            .unwrap();

        let items = list_active_items(&conn).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, b);
    }

    #[test]
    fn purchases_are_recorded_completed() {
        let conn = memory_conn();
        crate::storage::users::create_user(&conn, 1, None, None).unwrap();
        let item = create_item(&conn, "Mug", None, 20, Some(5)).unwrap();

        create_purchase(&conn, item, 1, 1, 20).unwrap();
        let purchases = user_purchases(&conn, 1, 10).unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].status, "completed");
        assert_eq!(purchases[0].total_cost, 20);
    }
}
