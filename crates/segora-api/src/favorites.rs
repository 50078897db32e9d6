use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::debug;
use uuid::Uuid;

use segora_types::api::{Claims, FavoriteState};
use segora_types::models::Favorite;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, blocking};

/// GET /favorites: most recently liked first, each with its listing.
pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = blocking(move || db.db.list_favorites(&uid)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(favorite, listing)| convert::favorite(favorite, Some(listing)))
            .collect(),
    ))
}

/// PUT /favorites/{listing_id}: idempotent.
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<FavoriteState>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let added = blocking(move || {
        let item_id = listing_id.to_string();
        if db.db.get_listing(&item_id, None)?.is_none() {
            return Ok(None);
        }
        db.db
            .add_favorite(&Uuid::new_v4().to_string(), &uid, &item_id)
            .map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("listing"))?;

    debug!("{} favorited {} (new: {})", claims.sub, listing_id, added);
    Ok(Json(FavoriteState {
        item_id: listing_id,
        is_favorite: true,
    }))
}

/// DELETE /favorites/{listing_id}: removing an absent favorite is a no-op.
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<FavoriteState>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let removed = blocking(move || db.db.remove_favorite(&uid, &listing_id.to_string())).await?;

    debug!("{} unfavorited {} (existed: {})", claims.sub, listing_id, removed);
    Ok(Json(FavoriteState {
        item_id: listing_id,
        is_favorite: false,
    }))
}
