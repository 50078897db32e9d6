use anyhow::Result;
use rusqlite::{Connection, params, params_from_iter};
use segora_types::filters::ListingFilters;

use super::OptionalExt;
use crate::Database;
use crate::listing_query::{self, listing_from_row, select_listings};
use crate::models::{CategoryRow, ListingPatch, ListingRow, NewListing, OwnerWrite};

impl Database {
    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, icon, color_bg, color_text FROM categories ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        icon: row.get(2)?,
                        color_bg: row.get(3)?,
                        color_text: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn category_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM categories WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Listings --

    pub fn insert_listing(&self, listing: &NewListing) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO items (id, title, description, price, image_url, category_id,
                    seller_id, seller_name, seller_avatar, seller_major, campus, offer_type,
                    rating, created_at, title_folded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    listing.id,
                    listing.title,
                    listing.description,
                    listing.price,
                    listing.image_url,
                    listing.category_id,
                    listing.seller_id,
                    listing.seller_name,
                    listing.seller_avatar,
                    listing.seller_major,
                    listing.campus,
                    listing.offer_type,
                    listing.rating,
                    listing.created_at,
                    listing.title.to_lowercase(),
                ],
            )?;
            Ok(())
        })
    }

    /// Run the faceted listing query. `viewer` annotates each row with the
    /// viewer's favorite flag.
    pub fn query_listings(
        &self,
        filters: &ListingFilters,
        viewer: Option<&str>,
    ) -> Result<Vec<ListingRow>> {
        let query = listing_query::build(filters, viewer);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let rows = stmt
                .query_map(params_from_iter(query.params.iter()), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_listing(&self, id: &str, viewer: Option<&str>) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| query_listing(conn, id, viewer))
    }

    /// Count a detail view and return the listing as it is afterwards.
    pub fn view_listing(&self, id: &str, viewer: Option<&str>) -> Result<Option<ListingRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("UPDATE items SET views = views + 1 WHERE id = ?1", [id])?;
            if changed == 0 {
                return Ok(None);
            }
            query_listing(conn, id, viewer)
        })
    }

    /// Edit a listing on behalf of `seller_id`. Only the owner may edit.
    pub fn update_listing(
        &self,
        id: &str,
        seller_id: &str,
        patch: &ListingPatch,
    ) -> Result<(OwnerWrite, Option<ListingRow>)> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE items SET
                    title        = COALESCE(?3, title),
                    title_folded = COALESCE(?9, title_folded),
                    description  = COALESCE(?4, description),
                    price        = COALESCE(?5, price),
                    category_id  = COALESCE(?6, category_id),
                    offer_type   = COALESCE(?7, offer_type),
                    image_url    = COALESCE(?8, image_url)
                 WHERE id = ?1 AND seller_id = ?2",
                params![
                    id,
                    seller_id,
                    patch.title,
                    patch.description,
                    patch.price,
                    patch.category_id,
                    patch.offer_type,
                    patch.image_url,
                    patch.title.as_deref().map(str::to_lowercase),
                ],
            )?;
            if changed == 0 {
                return Ok((owner_miss(conn, id)?, None));
            }
            Ok((OwnerWrite::Done, query_listing(conn, id, None)?))
        })
    }

    /// Delete a listing on behalf of `seller_id`. Favorites cascade.
    pub fn delete_listing(&self, id: &str, seller_id: &str) -> Result<OwnerWrite> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM items WHERE id = ?1 AND seller_id = ?2",
                [id, seller_id],
            )?;
            if changed == 0 {
                return owner_miss(conn, id);
            }
            Ok(OwnerWrite::Done)
        })
    }
}

/// Tell "no such listing" apart from "someone else's listing".
fn owner_miss(conn: &Connection, id: &str) -> Result<OwnerWrite> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM items WHERE id = ?1", [id], |r| r.get(0))
        .optional()?;
    Ok(if exists.is_some() {
        OwnerWrite::NotOwner
    } else {
        OwnerWrite::NotFound
    })
}

pub(crate) fn query_listing(
    conn: &Connection,
    id: &str,
    viewer: Option<&str>,
) -> Result<Option<ListingRow>> {
    let mut params: Vec<rusqlite::types::Value> = Vec::new();
    let mut sql = select_listings(viewer, &mut params);
    sql.push_str(" WHERE i.id = ?");
    params.push(rusqlite::types::Value::Text(id.to_string()));

    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(params_from_iter(params.iter()), listing_from_row)
        .optional()?;
    Ok(row)
}
