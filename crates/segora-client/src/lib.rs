//! Client side of the marketplace: an HTTP client for the service plus the
//! flows that run on the user's device (contacting a seller, the debounced
//! listing feed, favorites, campus preference and live listing updates).

pub mod campus;
pub mod client;
pub mod error;
pub mod events;
pub mod favorites;
pub mod feed;
pub mod matcher;
pub mod store;

pub use campus::{Preferences, resolve_campus};
pub use client::{MarketClient, Session};
pub use error::ClientError;
pub use events::GatewayListener;
pub use favorites::{FavoriteToggle, ToggleOutcome};
pub use feed::{FeedState, ListingFeed};
pub use matcher::{ContactOutcome, open_conversation};
pub use store::{ListingChange, ListingStore};
