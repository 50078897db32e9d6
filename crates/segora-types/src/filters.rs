//! Listing facets as they arrive from a query string and as the store consumes them.
//!
//! Every facet is optional. A missing value, an empty string and the neutral
//! value of a facet (`min_rating=0`) all mean "no constraint".

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;
/// Page size of the "recommended for you" strip.
pub const RECOMMENDATION_LIMIT: u32 = 4;
/// Hard cap on any page.
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first by creation time.
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    /// Highest rating first; unrated listings last.
    Rating,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
        }
    }
}

impl FromStr for SortOrder {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "newest" | "default" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "rating" | "rating_desc" => Ok(Self::Rating),
            other => Err(FilterError::UnknownSort(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("min_rating must be between 0 and 5")]
    RatingOutOfRange,

    #[error("{field} must be a valid id")]
    BadId { field: &'static str },

    #[error("unknown sort order '{0}'")]
    UnknownSort(String),
}

/// Facets exactly as they appear in a query string: every value is text and
/// may be empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListingFilters {
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_rating: Option<String>,
    pub category: Option<String>,
    pub campus: Option<String>,
    pub seller: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Normalized facets. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<Uuid>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListingFilters {
    /// Top rated listings, used by the explore page.
    pub fn recommendations() -> Self {
        Self {
            sort: SortOrder::Rating,
            limit: Some(RECOMMENDATION_LIMIT),
            ..Default::default()
        }
    }

    /// Effective page size, clamped to `1..=MAX_LIMIT`.
    pub fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

impl TryFrom<RawListingFilters> for ListingFilters {
    type Error = FilterError;

    fn try_from(raw: RawListingFilters) -> Result<Self, Self::Error> {
        let min_rating = parse_number::<f64>("min_rating", raw.min_rating.as_deref())?;
        if let Some(r) = min_rating {
            if !(0.0..=5.0).contains(&r) {
                return Err(FilterError::RatingOutOfRange);
            }
        }

        Ok(Self {
            search: non_empty(raw.search),
            min_price: non_negative("min_price", parse_number("min_price", raw.min_price.as_deref())?)?,
            max_price: non_negative("max_price", parse_number("max_price", raw.max_price.as_deref())?)?,
            min_rating: min_rating.filter(|r| *r > 0.0),
            category: parse_id("category", raw.category.as_deref())?,
            campus: non_empty(raw.campus),
            seller: parse_id("seller", raw.seller.as_deref())?,
            sort: raw.sort.as_deref().unwrap_or_default().parse()?,
            limit: raw.limit,
            offset: raw.offset,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(field: &'static str, value: Option<&str>) -> Result<Option<T>, FilterError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| FilterError::NotANumber {
            field,
            value: v.to_string(),
        }),
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<Option<i64>, FilterError> {
    match value {
        Some(v) if v < 0 => Err(FilterError::Negative { field }),
        other => Ok(other),
    }
}

fn parse_id(field: &'static str, value: Option<&str>) -> Result<Option<Uuid>, FilterError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| FilterError::BadId { field }),
    }
}
