pub mod auth;
pub mod chats;
pub mod convert;
pub mod error;
pub mod favorites;
pub mod images;
pub mod listings;
pub mod middleware;
pub mod orders;
pub mod profiles;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use segora_gateway::connection;

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Slack above the image cap so the handler, not the body limit, reports oversize uploads.
const UPLOAD_BODY_LIMIT: usize = images::MAX_IMAGE_SIZE + 64 * 1024;

/// Every HTTP and WebSocket route of the marketplace service.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/categories", get(listings::list_categories))
        .route("/listings", get(listings::list_listings))
        .route("/listings/recommendations", get(listings::recommendations))
        .route("/listings/{id}", get(listings::get_listing))
        .route("/sellers/{id}", get(listings::seller_page))
        .route("/profiles/{id}", get(profiles::public_profile))
        .route("/images/{*path}", get(images::serve_image))
        .route("/gateway", get(gateway))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session))
        .route("/listings", post(listings::create_listing))
        .route(
            "/listings/{id}",
            put(listings::update_listing).delete(listings::delete_listing),
        )
        .route("/listings/{id}/conversation", post(chats::open_conversation))
        .route("/listings/{id}/reports", post(orders::create_report))
        .route("/dashboard/listings", get(listings::dashboard))
        .route("/chats", get(chats::list_chats))
        .route("/chats/{id}", get(chats::get_chat))
        .route(
            "/chats/{id}/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route("/chats/{id}/read", post(chats::mark_read))
        .route("/favorites", get(favorites::list_favorites))
        .route(
            "/favorites/{listing_id}",
            put(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route(
            "/profile",
            get(profiles::get_profile).put(profiles::update_profile),
        )
        .route("/profile/shop", post(profiles::setup_shop))
        .route("/transactions", post(orders::create_transaction))
        .route("/purchases", get(orders::list_purchases))
        .route(
            "/images",
            post(images::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn gateway(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
