use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a listing offers. Stored as its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    #[default]
    Product,
    Service,
    Request,
}

impl OfferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "service" => Ok(Self::Service),
            "request" => Ok(Self::Request),
            other => Err(format!("unknown offer kind '{}'", other)),
        }
    }
}

/// A product, service or request offered on the marketplace.
///
/// The `seller_*` fields are a snapshot of the seller's profile taken when the
/// listing was created. They are not refreshed when the profile changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Smallest currency unit (rupiah has no minor unit).
    pub price: i64,
    pub image_url: Option<String>,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub seller_id: Uuid,
    pub seller_name: String,
    pub seller_avatar: Option<String>,
    pub seller_major: Option<String>,
    pub campus: Option<String>,
    pub offer_kind: OfferKind,
    pub rating: Option<f64>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    /// Only present when the request was made by an authenticated viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub color_bg: String,
    pub color_text: String,
}

/// A 1:1 thread between a buyer and a seller about one listing.
///
/// `item_title` and `item_image` are copied from the listing when the
/// conversation is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub item_id: Uuid,
    pub item_title: String,
    pub item_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.user_a == user_id { self.user_b } else { self.user_a }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub listing: Option<Listing>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub id: Uuid,
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

impl UserProfile {
    /// Name shown on listings: full name, then shop name, then the email's local part.
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.shop_name.as_deref().filter(|n| !n.trim().is_empty()))
            .map(str::to_string)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub item_title: String,
    pub item_image: Option<String>,
    pub price: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub item_id: Uuid,
    pub reporter_id: Uuid,
    pub rating: u8,
    pub review: Option<String>,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let profile = UserProfile {
            email: Some("budi.santoso@kampus.ac.id".into()),
            full_name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "budi.santoso");
    }

    #[test]
    fn offer_kind_parses_case_insensitively() {
        assert_eq!("Service".parse::<OfferKind>().unwrap(), OfferKind::Service);
        assert!("barter".parse::<OfferKind>().is_err());
    }
}
