use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Listing, Message};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// A listing was removed by its seller; views should drop it
    ListingDeleted { listing_id: Uuid, seller_id: Uuid },

    /// A listing was edited by its seller
    ListingUpdated { listing: Listing },

    /// A buyer opened a new conversation (sent to both participants)
    ConversationCreated { conversation: Conversation },

    /// A message was posted (sent to both participants)
    MessageCreate { message: Message },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
