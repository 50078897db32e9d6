use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use segora_db::models::{ChatRow, MessageRow, NewChat};
use segora_types::api::{Claims, MarkReadResponse, OpenConversationResponse, SendMessageRequest};
use segora_types::events::GatewayEvent;
use segora_types::models::{Conversation, Message};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, blocking};

const MAX_MESSAGE_LEN: usize = 4000;

/// POST /listings/{id}/conversation: find or create the caller's
/// conversation with the listing's seller about this listing.
///
/// 201 when this call created it, 200 when it already existed.
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let listing = blocking(move || db.db.get_listing(&listing_id.to_string(), None))
        .await?
        .ok_or(ApiError::NotFound("listing"))?;

    let buyer = claims.sub.to_string();
    if listing.seller_id == buyer {
        return Err(ApiError::validation("cannot message yourself"));
    }

    let new = NewChat {
        id: Uuid::new_v4().to_string(),
        user_a: buyer,
        user_b: listing.seller_id,
        item_id: listing.id,
        item_title: listing.title,
        item_image: listing.image_url,
        created_at: segora_db::now(),
    };

    let db = state.clone();
    let (row, created) = blocking(move || db.db.find_or_create_chat(&new)).await?;
    let conversation = convert::conversation(row);

    if created {
        info!(
            "{} opened conversation {} about {}",
            claims.sub, conversation.id, listing_id
        );
        let seller = conversation.other_participant(claims.sub);
        state
            .dispatcher
            .send_to_user(
                seller,
                GatewayEvent::ConversationCreated {
                    conversation: conversation.clone(),
                },
            )
            .await;
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(OpenConversationResponse {
            chat_id: conversation.id,
            created,
        }),
    ))
}

/// GET /chats: the caller's conversations, newest first.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = blocking(move || db.db.list_chats_for_user(&uid)).await?;
    Ok(Json(rows.into_iter().map(convert::conversation).collect()))
}

/// GET /chats/{id}
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    let row = participant_chat(&state, chat_id, &claims).await?;
    Ok(Json(convert::conversation(row)))
}

/// GET /chats/{id}/messages: oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    participant_chat(&state, chat_id, &claims).await?;

    let db = state.clone();
    let rows = blocking(move || db.db.get_messages(&chat_id.to_string())).await?;
    Ok(Json(rows.into_iter().map(convert::message).collect()))
}

/// POST /chats/{id}/messages: pushed to both participants.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::validation("message must not be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation("message is too long"));
    }

    let chat = convert::conversation(participant_chat(&state, chat_id, &claims).await?);

    let row = MessageRow {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: claims.sub.to_string(),
        content,
        is_read: false,
        created_at: segora_db::now(),
    };
    let db = state.clone();
    let row = blocking(move || db.db.insert_message(&row).map(|_| row)).await?;
    let message = convert::message(row);

    state
        .dispatcher
        .send_to_users(
            &[chat.user_a, chat.user_b],
            GatewayEvent::MessageCreate {
                message: message.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /chats/{id}/read: marks the other participant's messages read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    participant_chat(&state, chat_id, &claims).await?;

    let db = state.clone();
    let uid = claims.sub.to_string();
    let updated = blocking(move || db.db.mark_chat_read(&chat_id.to_string(), &uid)).await?;
    Ok(Json(MarkReadResponse { updated }))
}

/// Load a conversation the caller takes part in.
async fn participant_chat(
    state: &AppState,
    chat_id: Uuid,
    claims: &Claims,
) -> Result<ChatRow, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.get_chat(&chat_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;

    let uid = claims.sub.to_string();
    if row.user_a != uid && row.user_b != uid {
        return Err(ApiError::Forbidden("not a participant of this conversation"));
    }
    Ok(row)
}
