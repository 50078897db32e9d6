use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use segora_db::models::{ReportRow, TransactionRow};
use segora_types::api::{Claims, CreateReportRequest, CreateTransactionRequest};
use segora_types::events::GatewayEvent;
use segora_types::models::{Report, Transaction, TransactionStatus};

use crate::auth::{AppState, non_empty};
use crate::convert;
use crate::error::{ApiError, blocking};

/// POST /transactions: record a purchase at the listing's current price.
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let listing = blocking(move || db.db.get_listing(&req.item_id.to_string(), None))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;

    let buyer = claims.sub.to_string();
    if listing.seller_id == buyer {
        return Err(ApiError::validation("cannot buy your own listing"));
    }

    let row = TransactionRow {
        id: Uuid::new_v4().to_string(),
        item_id: listing.id,
        buyer_id: buyer,
        seller_id: listing.seller_id,
        item_title: listing.title,
        item_image: listing.image_url,
        price: listing.price,
        status: TransactionStatus::Pending.as_str().to_string(),
        created_at: segora_db::now(),
    };
    let db = state.clone();
    let row = blocking(move || db.db.insert_transaction(&row).map(|_| row)).await?;

    info!("{} bought {} ({})", claims.sub, row.item_id, row.id);
    Ok((StatusCode::CREATED, Json(convert::transaction(row))))
}

/// GET /purchases: newest first.
pub async fn list_purchases(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = blocking(move || db.db.list_purchases(&uid)).await?;
    Ok(Json(rows.into_iter().map(convert::transaction).collect()))
}

/// POST /listings/{id}/reports: a review, a report, or both.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.rating > 5 {
        return Err(ApiError::validation("rating must be between 0 and 5"));
    }
    let reason = non_empty(req.reason);
    if req.rating == 0 && reason.is_none() {
        return Err(ApiError::validation("give a rating or a reason"));
    }

    let db = state.clone();
    let exists = blocking(move || db.db.get_listing(&listing_id.to_string(), None)).await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("listing"));
    }

    let report = Report {
        id: Uuid::new_v4(),
        item_id: listing_id,
        reporter_id: claims.sub,
        rating: req.rating,
        review: non_empty(req.review),
        reason,
        details: non_empty(req.details),
        created_at: chrono::Utc::now(),
    };
    let row = ReportRow {
        id: report.id.to_string(),
        item_id: listing_id.to_string(),
        reporter_id: claims.sub.to_string(),
        rating: report.rating,
        review: report.review.clone(),
        reason: report.reason.clone(),
        details: report.details.clone(),
        created_at: report
            .created_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };
    let db = state.clone();
    let rated = blocking(move || {
        let Some(rating) = db.db.insert_report(&row)? else {
            return Ok(None);
        };
        debug!("Listing {} now rated {:.2}", row.item_id, rating);
        db.db.get_listing(&row.item_id, None)
    })
    .await?;

    info!("{} reported {} ({})", claims.sub, listing_id, report.id);
    if let Some(listing) = rated {
        state.dispatcher.broadcast(GatewayEvent::ListingUpdated {
            listing: convert::listing(listing),
        });
    }
    Ok((StatusCode::CREATED, Json(report)))
}
