use anyhow::Result;
use rusqlite::params;

use super::OptionalExt;
use crate::Database;
use crate::models::{ReportRow, TransactionRow};

impl Database {
    // -- Transactions --

    pub fn insert_transaction(&self, tx_row: &TransactionRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transactions (id, item_id, buyer_id, seller_id, item_title,
                    item_image, price, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tx_row.id,
                    tx_row.item_id,
                    tx_row.buyer_id,
                    tx_row.seller_id,
                    tx_row.item_title,
                    tx_row.item_image,
                    tx_row.price,
                    tx_row.status,
                    tx_row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Purchases made by `buyer_id`, newest first.
    pub fn list_purchases(&self, buyer_id: &str) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, item_id, buyer_id, seller_id, item_title, item_image, price,
                        status, created_at
                 FROM transactions
                 WHERE buyer_id = ?1
                 ORDER BY created_at DESC, id",
            )?;
            let rows = stmt
                .query_map([buyer_id], |row| {
                    Ok(TransactionRow {
                        id: row.get(0)?,
                        item_id: row.get(1)?,
                        buyer_id: row.get(2)?,
                        seller_id: row.get(3)?,
                        item_title: row.get(4)?,
                        item_image: row.get(5)?,
                        price: row.get(6)?,
                        status: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reports --

    /// Store a report or review. A review with a star rating also refreshes
    /// the listing's rating to the mean of its rated reviews, in the same
    /// transaction. Returns the new listing rating when it changed.
    pub fn insert_report(&self, report: &ReportRow) -> Result<Option<f64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO reports (id, item_id, reporter_id, rating, review, reason,
                    details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    report.id,
                    report.item_id,
                    report.reporter_id,
                    report.rating,
                    report.review,
                    report.reason,
                    report.details,
                    report.created_at,
                ],
            )?;

            let rating = if report.rating > 0 {
                tx.execute(
                    "UPDATE items SET rating =
                        (SELECT AVG(rating) FROM reports WHERE item_id = ?1 AND rating > 0)
                     WHERE id = ?1",
                    [&report.item_id],
                )?;
                tx.query_row("SELECT rating FROM items WHERE id = ?1", [&report.item_id], |r| {
                    r.get::<_, Option<f64>>(0)
                })
                .optional()?
                .flatten()
            } else {
                None
            };
            tx.commit()?;
            Ok(rating)
        })
    }
}
