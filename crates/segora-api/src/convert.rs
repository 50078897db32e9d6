//! Row-to-model conversion. The store keeps ids and timestamps as text; a
//! value that fails to parse is logged and replaced by a default rather than
//! failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use segora_db::models::{
    CategoryRow, ChatRow, FavoriteRow, ListingRow, MessageRow, ProfileRow, TransactionRow,
};
use segora_types::models::{
    Category, Conversation, Favorite, Listing, Message, OfferKind, Transaction, TransactionStatus,
    UserProfile,
};

fn parse_id(value: &str, field: &str, row_id: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", field, value, row_id, e);
        Uuid::default()
    })
}

fn timestamp(value: &str, row_id: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's own CURRENT_TIMESTAMP format, no timezone
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", value, row_id, e);
            DateTime::default()
        })
}

pub fn listing(row: ListingRow) -> Listing {
    let offer_kind = row.offer_type.parse::<OfferKind>().unwrap_or_else(|e| {
        warn!("{} on listing '{}'", e, row.id);
        OfferKind::default()
    });
    Listing {
        id: parse_id(&row.id, "id", &row.id),
        category_id: parse_id(&row.category_id, "category_id", &row.id),
        seller_id: parse_id(&row.seller_id, "seller_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        title: row.title,
        description: row.description,
        price: row.price,
        image_url: row.image_url,
        category_name: row.category_name,
        seller_name: row.seller_name,
        seller_avatar: row.seller_avatar,
        seller_major: row.seller_major,
        campus: row.campus,
        offer_kind,
        rating: row.rating,
        views: row.views,
        is_favorite: row.is_favorite,
    }
}

pub fn listings(rows: Vec<ListingRow>) -> Vec<Listing> {
    rows.into_iter().map(listing).collect()
}

pub fn category(row: CategoryRow) -> Category {
    Category {
        id: parse_id(&row.id, "id", &row.id),
        name: row.name,
        icon: row.icon,
        color_bg: row.color_bg,
        color_text: row.color_text,
    }
}

pub fn conversation(row: ChatRow) -> Conversation {
    Conversation {
        id: parse_id(&row.id, "id", &row.id),
        user_a: parse_id(&row.user_a, "user_a", &row.id),
        user_b: parse_id(&row.user_b, "user_b", &row.id),
        item_id: parse_id(&row.item_id, "item_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        item_title: row.item_title,
        item_image: row.item_image,
    }
}

pub fn message(row: MessageRow) -> Message {
    Message {
        id: parse_id(&row.id, "id", &row.id),
        chat_id: parse_id(&row.chat_id, "chat_id", &row.id),
        sender_id: parse_id(&row.sender_id, "sender_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        content: row.content,
        is_read: row.is_read,
    }
}

pub fn favorite(row: FavoriteRow, listing_row: Option<ListingRow>) -> Favorite {
    Favorite {
        id: parse_id(&row.id, "id", &row.id),
        user_id: parse_id(&row.user_id, "user_id", &row.id),
        item_id: parse_id(&row.item_id, "item_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        listing: listing_row.map(listing),
    }
}

pub fn profile(row: ProfileRow) -> UserProfile {
    UserProfile {
        id: parse_id(&row.id, "id", &row.id),
        email: row.email,
        full_name: row.full_name,
        campus: row.campus,
        major: row.major,
        bio: row.bio,
        is_seller: row.is_seller,
        shop_name: row.shop_name,
        shop_description: row.shop_description,
        avatar_url: row.avatar_url,
    }
}

/// Public view of a profile: the email stays private.
pub fn public_profile(row: ProfileRow) -> UserProfile {
    UserProfile {
        email: None,
        ..profile(row)
    }
}

pub fn transaction(row: TransactionRow) -> Transaction {
    let status = row.status.parse::<TransactionStatus>().unwrap_or_else(|e| {
        warn!("{} on transaction '{}'", e, row.id);
        TransactionStatus::default()
    });
    Transaction {
        id: parse_id(&row.id, "id", &row.id),
        item_id: parse_id(&row.item_id, "item_id", &row.id),
        buyer_id: parse_id(&row.buyer_id, "buyer_id", &row.id),
        seller_id: parse_id(&row.seller_id, "seller_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        item_title: row.item_title,
        item_image: row.item_image,
        price: row.price,
        status,
    }
}
