//! Listing query builder.
//!
//! Turns a set of [`ListingFilters`] into one `SELECT` against `items`: every
//! present facet becomes one `AND`ed predicate, exactly one primary sort key is
//! applied, and the page is capped with `LIMIT`/`OFFSET`.

use rusqlite::Row;
use rusqlite::types::Value;
use segora_types::filters::{ListingFilters, SortOrder};

use crate::models::ListingRow;

/// Columns shared by every listing read. `{favorite}` is filled with either an
/// `EXISTS` on `favorites` or `NULL`; the `extra_*` slots let a caller append columns and
/// joins after the listing columns.
const LISTING_SELECT: &str = "SELECT i.id, i.title, i.description, i.price, i.image_url,
        i.category_id, c.name, i.seller_id, i.seller_name, i.seller_avatar,
        i.seller_major, i.campus, i.offer_type, i.rating, i.views, i.created_at,
        {favorite}{extra_columns}
    FROM items i
    LEFT JOIN categories c ON c.id = i.category_id{extra_joins}";

const FAVORITE_EXISTS: &str =
    "EXISTS(SELECT 1 FROM favorites f WHERE f.item_id = i.id AND f.user_id = ?)";

/// A ready-to-run statement and its positional parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// SELECT prefix for listing reads, with the viewer's favorite flag when known.
/// Pushes the viewer parameter (if any) onto `params`.
pub(crate) fn select_listings(viewer: Option<&str>, params: &mut Vec<Value>) -> String {
    select_listings_with(viewer, "", "", params)
}

/// Like [`select_listings`], with extra columns (starting at index 17) and joins.
pub(crate) fn select_listings_with(
    viewer: Option<&str>,
    extra_columns: &str,
    extra_joins: &str,
    params: &mut Vec<Value>,
) -> String {
    let favorite = match viewer {
        Some(user_id) => {
            params.push(Value::Text(user_id.to_string()));
            FAVORITE_EXISTS
        }
        None => "NULL",
    };
    LISTING_SELECT
        .replace("{favorite}", favorite)
        .replace("{extra_columns}", extra_columns)
        .replace("{extra_joins}", extra_joins)
}

/// Map a row produced by [`select_listings`].
pub(crate) fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        image_url: row.get(4)?,
        category_id: row.get(5)?,
        category_name: row.get(6)?,
        seller_id: row.get(7)?,
        seller_name: row.get(8)?,
        seller_avatar: row.get(9)?,
        seller_major: row.get(10)?,
        campus: row.get(11)?,
        offer_type: row.get(12)?,
        rating: row.get(13)?,
        views: row.get(14)?,
        created_at: row.get(15)?,
        is_favorite: row.get(16)?,
    })
}

/// Build the filtered, sorted, paginated listing query.
pub fn build(filters: &ListingFilters, viewer: Option<&str>) -> BuiltQuery {
    let mut params = Vec::new();
    let mut sql = select_listings(viewer, &mut params);
    let mut predicates: Vec<&str> = Vec::new();

    if let Some(search) = &filters.search {
        // Matched against the title lowercased in Rust, which folds non-ASCII
        // letters that SQLite's LIKE leaves alone.
        predicates.push("i.title_folded LIKE ? ESCAPE '\\'");
        params.push(Value::Text(format!("%{}%", escape_like(&search.to_lowercase()))));
    }
    if let Some(min) = filters.min_price {
        predicates.push("i.price >= ?");
        params.push(Value::Integer(min));
    }
    if let Some(max) = filters.max_price {
        predicates.push("i.price <= ?");
        params.push(Value::Integer(max));
    }
    if let Some(rating) = filters.min_rating {
        predicates.push("i.rating >= ?");
        params.push(Value::Real(rating));
    }
    if let Some(category) = filters.category {
        predicates.push("i.category_id = ?");
        params.push(Value::Text(category.to_string()));
    }
    if let Some(campus) = &filters.campus {
        predicates.push("i.campus = ?");
        params.push(Value::Text(campus.clone()));
    }
    if let Some(seller) = filters.seller {
        predicates.push("i.seller_id = ?");
        params.push(Value::Text(seller.to_string()));
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    sql.push_str(" ORDER BY ");
    sql.push_str(order_clause(filters.sort));

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::Integer(i64::from(filters.page_size())));
    params.push(Value::Integer(i64::from(filters.offset.unwrap_or(0))));

    BuiltQuery { sql, params }
}

/// One primary key per sort order. Ties fall back to newest first, then id,
/// so pages are stable.
fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "i.created_at DESC, i.id",
        SortOrder::PriceAsc => "i.price ASC, i.created_at DESC, i.id",
        SortOrder::PriceDesc => "i.price DESC, i.created_at DESC, i.id",
        SortOrder::Rating => "i.rating IS NULL, i.rating DESC, i.created_at DESC, i.id",
    }
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn no_facets_means_no_where_clause() {
        let q = build(&ListingFilters::default(), None);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.contains("ORDER BY i.created_at DESC"));
        assert_eq!(q.params, vec![Value::Integer(20), Value::Integer(0)]);
    }

    #[test]
    fn facets_are_conjunctive_in_parameter_order() {
        let category = Uuid::new_v4();
        let filters = ListingFilters {
            search: Some("Kalkulus".into()),
            min_price: Some(10_000),
            max_price: Some(50_000),
            min_rating: Some(4.0),
            category: Some(category),
            campus: Some("untirta".into()),
            sort: SortOrder::PriceAsc,
            ..Default::default()
        };
        let q = build(&filters, None);

        assert!(q.sql.contains(
            "WHERE i.title_folded LIKE ? ESCAPE '\\' AND i.price >= ? AND i.price <= ? \
             AND i.rating >= ? AND i.category_id = ? AND i.campus = ?"
        ));
        assert!(q.sql.contains("ORDER BY i.price ASC"));
        assert_eq!(
            q.params,
            vec![
                Value::Text("%kalkulus%".into()),
                Value::Integer(10_000),
                Value::Integer(50_000),
                Value::Real(4.0),
                Value::Text(category.to_string()),
                Value::Text("untirta".into()),
                Value::Integer(20),
                Value::Integer(0),
            ]
        );
    }

    #[test]
    fn viewer_parameter_comes_first() {
        let filters = ListingFilters {
            campus: Some("ui".into()),
            ..Default::default()
        };
        let q = build(&filters, Some("viewer-1"));
        assert!(q.sql.contains("EXISTS(SELECT 1 FROM favorites"));
        assert_eq!(q.params[0], Value::Text("viewer-1".into()));
        assert_eq!(q.params[1], Value::Text("ui".into()));
    }

    #[test]
    fn recommendations_sort_by_rating_and_cap_at_four() {
        let q = build(&ListingFilters::recommendations(), None);
        assert!(q.sql.contains("ORDER BY i.rating IS NULL, i.rating DESC"));
        assert_eq!(q.params, vec![Value::Integer(4), Value::Integer(0)]);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }
}
