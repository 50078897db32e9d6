use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use segora_db::models::ProfilePatch;
use segora_types::api::{Claims, SetupShopRequest, UpdateProfileRequest};
use segora_types::models::UserProfile;

use crate::auth::{AppState, non_empty};
use crate::convert;
use crate::error::{ApiError, blocking};

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfile>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let row = blocking(move || db.db.get_profile(&uid))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(convert::profile(row)))
}

/// GET /profiles/{id}: without the email.
pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.get_profile(&user_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(convert::public_profile(row)))
}

/// PUT /profile: absent or blank fields are left as they are.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let patch = ProfilePatch {
        full_name: non_empty(req.full_name),
        campus: non_empty(req.campus),
        major: non_empty(req.major),
        bio: req.bio.map(|b| b.trim().to_string()),
        avatar_url: non_empty(req.avatar_url),
    };

    let db = state.clone();
    let uid = claims.sub.to_string();
    let row = blocking(move || db.db.update_profile(&uid, &patch))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(convert::profile(row)))
}

/// POST /profile/shop: makes the caller a seller.
pub async fn setup_shop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetupShopRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let shop_name = req.shop_name.trim().to_string();
    if shop_name.is_empty() {
        return Err(ApiError::validation("shop name is required"));
    }
    let shop_description = non_empty(req.shop_description);

    let db = state.clone();
    let uid = claims.sub.to_string();
    let row = blocking(move || db.db.setup_shop(&uid, &shop_name, shop_description.as_deref()))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;

    info!("{} opened a shop", claims.sub);
    Ok(Json(convert::profile(row)))
}
