use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use segora_db::models::{ListingPatch, NewListing, OwnerWrite};
use segora_types::api::{
    Claims, CreateListingRequest, ListingPage, SellerPage, UpdateListingRequest,
};
use segora_types::events::GatewayEvent;
use segora_types::filters::{ListingFilters, RawListingFilters};
use segora_types::models::{Category, Listing};

use crate::auth::{AppState, non_empty};
use crate::convert;
use crate::error::{ApiError, blocking};
use crate::middleware::Viewer;

const MAX_TITLE_LEN: usize = 120;

/// GET /categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_categories()).await?;
    Ok(Json(rows.into_iter().map(convert::category).collect()))
}

/// GET /listings?search=&min_price=&max_price=&min_rating=&category=&campus=&sort=&limit=&offset=
pub async fn list_listings(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(raw): Query<RawListingFilters>,
) -> Result<Json<ListingPage>, ApiError> {
    let filters = ListingFilters::try_from(raw)?;
    let limit = filters.page_size();
    let offset = filters.offset.unwrap_or(0);

    let db = state.clone();
    let viewer_id = viewer.user_id();
    let rows = blocking(move || db.db.query_listings(&filters, viewer_id.as_deref())).await?;

    Ok(Json(ListingPage {
        items: convert::listings(rows),
        limit,
        offset,
    }))
}

/// GET /listings/recommendations: the four best rated listings.
pub async fn recommendations(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let db = state.clone();
    let viewer_id = viewer.user_id();
    let rows = blocking(move || {
        db.db
            .query_listings(&ListingFilters::recommendations(), viewer_id.as_deref())
    })
    .await?;
    Ok(Json(convert::listings(rows)))
}

/// GET /listings/{id}: counts a view.
pub async fn get_listing(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    let db = state.clone();
    let viewer_id = viewer.user_id();
    let row = blocking(move || db.db.view_listing(&listing_id.to_string(), viewer_id.as_deref()))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;
    Ok(Json(convert::listing(row)))
}

/// POST /listings: the seller fields are a snapshot of the caller's profile.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    validate_title(&title)?;
    validate_price(req.price)?;
    ensure_category(&state, req.category_id).await?;

    let db = state.clone();
    let uid = claims.sub.to_string();
    let profile = blocking(move || db.db.get_profile(&uid))
        .await?
        .map(convert::profile)
        .ok_or(ApiError::NotFound("profile"))?;

    let listing_id = Uuid::new_v4();
    let new = NewListing {
        id: listing_id.to_string(),
        title,
        description: req.description.trim().to_string(),
        price: req.price,
        image_url: non_empty(req.image_url),
        category_id: req.category_id.to_string(),
        seller_id: claims.sub.to_string(),
        seller_name: profile.display_name(),
        seller_avatar: profile.avatar_url,
        seller_major: profile.major,
        campus: profile.campus,
        offer_type: req.offer_kind.as_str().to_string(),
        rating: None,
        created_at: segora_db::now(),
    };

    let db = state.clone();
    let row = blocking(move || {
        db.db.insert_listing(&new)?;
        db.db.get_listing(&new.id, None)
    })
    .await?
    .ok_or_else(|| anyhow::anyhow!("listing {} vanished after insert", listing_id))?;

    info!("{} listed {}", claims.sub, listing_id);
    Ok((StatusCode::CREATED, Json(convert::listing(row))))
}

/// PUT /listings/{id}: owner only.
pub async fn update_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let title = req.title.map(|t| t.trim().to_string());
    if let Some(title) = &title {
        validate_title(title)?;
    }
    if let Some(price) = req.price {
        validate_price(price)?;
    }
    if let Some(category_id) = req.category_id {
        ensure_category(&state, category_id).await?;
    }

    let patch = ListingPatch {
        title,
        description: req.description.map(|d| d.trim().to_string()),
        price: req.price,
        category_id: req.category_id.map(|c| c.to_string()),
        offer_type: req.offer_kind.map(|k| k.as_str().to_string()),
        image_url: non_empty(req.image_url),
    };

    let db = state.clone();
    let uid = claims.sub.to_string();
    let (outcome, row) =
        blocking(move || db.db.update_listing(&listing_id.to_string(), &uid, &patch)).await?;
    owner_outcome(outcome)?;

    let listing = convert::listing(
        row.ok_or_else(|| anyhow::anyhow!("listing {} vanished after update", listing_id))?,
    );
    state.dispatcher.broadcast(GatewayEvent::ListingUpdated {
        listing: listing.clone(),
    });
    Ok(Json(listing))
}

/// DELETE /listings/{id}: owner only. Views drop the listing on `ListingDeleted`.
pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let outcome = blocking(move || db.db.delete_listing(&listing_id.to_string(), &uid)).await?;
    owner_outcome(outcome)?;

    info!("{} deleted listing {}", claims.sub, listing_id);
    state.dispatcher.broadcast(GatewayEvent::ListingDeleted {
        listing_id,
        seller_id: claims.sub,
    });
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sellers/{id}: public seller page.
pub async fn seller_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(seller_id): Path<Uuid>,
) -> Result<Json<SellerPage>, ApiError> {
    let db = state.clone();
    let viewer_id = viewer.user_id();
    let (profile, rows) = blocking(move || {
        let profile = db.db.get_profile(&seller_id.to_string())?;
        let filters = ListingFilters {
            seller: Some(seller_id),
            ..Default::default()
        };
        let rows = db.db.query_listings(&filters, viewer_id.as_deref())?;
        Ok((profile, rows))
    })
    .await?;

    let profile = profile.ok_or(ApiError::NotFound("seller"))?;
    Ok(Json(SellerPage {
        profile: convert::public_profile(profile),
        listings: convert::listings(rows),
    }))
}

/// GET /dashboard/listings: the caller's own listings. Sellers only.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(raw): Query<RawListingFilters>,
) -> Result<Json<ListingPage>, ApiError> {
    let mut filters = ListingFilters::try_from(raw)?;
    filters.seller = Some(claims.sub);
    let limit = filters.page_size();
    let offset = filters.offset.unwrap_or(0);

    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = blocking(move || {
        let is_seller = db.db.get_profile(&uid)?.is_some_and(|p| p.is_seller);
        if !is_seller {
            return Ok(None);
        }
        db.db.query_listings(&filters, Some(&uid)).map(Some)
    })
    .await?
    .ok_or(ApiError::Forbidden("set up a shop first"))?;

    Ok(Json(ListingPage {
        items: convert::listings(rows),
        limit,
        offset,
    }))
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation("title is too long"));
    }
    Ok(())
}

fn validate_price(price: i64) -> Result<(), ApiError> {
    if price < 0 {
        return Err(ApiError::validation("price must not be negative"));
    }
    Ok(())
}

async fn ensure_category(state: &AppState, category_id: Uuid) -> Result<(), ApiError> {
    let db = state.clone();
    let exists = blocking(move || db.db.category_exists(&category_id.to_string())).await?;
    if !exists {
        warn!("Rejected unknown category {}", category_id);
        return Err(ApiError::validation("unknown category"));
    }
    Ok(())
}

fn owner_outcome(outcome: OwnerWrite) -> Result<(), ApiError> {
    match outcome {
        OwnerWrite::Done => Ok(()),
        OwnerWrite::NotFound => Err(ApiError::NotFound("listing")),
        OwnerWrite::NotOwner => Err(ApiError::Forbidden("only the seller can change this listing")),
    }
}
