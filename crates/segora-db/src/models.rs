/// Database row types: these map directly to SQLite rows.
/// Distinct from segora-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Default)]
pub struct ProfileRow {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub campus: Option<String>,
    pub major: Option<String>,
    pub bio: Option<String>,
    pub is_seller: bool,
    pub shop_name: Option<String>,
    pub shop_description: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile fields a user may edit. `None` leaves the column as it is.
#[derive(Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub campus: Option<String>,
    pub major: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color_bg: String,
    pub color_text: String,
}

#[derive(Clone)]
pub struct ListingRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub category_id: String,
    pub category_name: Option<String>,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_avatar: Option<String>,
    pub seller_major: Option<String>,
    pub campus: Option<String>,
    pub offer_type: String,
    pub rating: Option<f64>,
    pub views: i64,
    pub created_at: String,
    /// `None` when the query had no viewer.
    pub is_favorite: Option<bool>,
}

/// A listing about to be inserted. The seller snapshot is taken by the caller.
pub struct NewListing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub category_id: String,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_avatar: Option<String>,
    pub seller_major: Option<String>,
    pub campus: Option<String>,
    pub offer_type: String,
    pub rating: Option<f64>,
    pub created_at: String,
}

#[derive(Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<String>,
    pub offer_type: Option<String>,
    pub image_url: Option<String>,
}

/// Result of an owner-scoped mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerWrite {
    Done,
    NotFound,
    NotOwner,
}

#[derive(Clone)]
pub struct ChatRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub item_id: String,
    pub item_title: String,
    pub item_image: Option<String>,
    pub created_at: String,
}

pub struct NewChat {
    pub id: String,
    /// The user opening the conversation.
    pub user_a: String,
    /// The seller.
    pub user_b: String,
    pub item_id: String,
    pub item_title: String,
    pub item_image: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct FavoriteRow {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub created_at: String,
}

pub struct TransactionRow {
    pub id: String,
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub item_title: String,
    pub item_image: Option<String>,
    pub price: i64,
    pub status: String,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub item_id: String,
    pub reporter_id: String,
    pub rating: u8,
    pub review: Option<String>,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}
