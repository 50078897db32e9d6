use anyhow::Result;
use rusqlite::params;

use crate::Database;
use crate::listing_query::{listing_from_row, select_listings_with};
use crate::models::{FavoriteRow, ListingRow};

impl Database {
    /// Add a favorite. Returns false if the pair was already there.
    pub fn add_favorite(&self, id: &str, user_id: &str, item_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO favorites (id, user_id, item_id, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, item_id) DO NOTHING",
                params![id, user_id, item_id, crate::now()],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Remove a favorite. Returns false if there was nothing to remove.
    pub fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND item_id = ?2",
                [user_id, item_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// The user's favorites, most recently liked first, with their listings.
    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<(FavoriteRow, ListingRow)>> {
        self.with_conn(|conn| {
            let mut params: Vec<rusqlite::types::Value> = Vec::new();
            let mut sql = select_listings_with(
                Some(user_id),
                ", fv.id, fv.user_id, fv.item_id, fv.created_at",
                " JOIN favorites fv ON fv.item_id = i.id",
                &mut params,
            );
            sql.push_str(" WHERE fv.user_id = ? ORDER BY fv.created_at DESC, fv.id");
            params.push(rusqlite::types::Value::Text(user_id.to_string()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    let listing = listing_from_row(row)?;
                    let favorite = FavoriteRow {
                        id: row.get(17)?,
                        user_id: row.get(18)?,
                        item_id: row.get(19)?,
                        created_at: row.get(20)?,
                    };
                    Ok((favorite, listing))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
