use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order message threads
// ============================================================================

/// File attached to a message, stored server-side under the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Download path relative to the server root
    pub path: String,
}

/// A persisted message in an order thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sender_id: Uuid,
    pub is_admin: bool,
    pub message_text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub read_by_user: bool,
    pub read_by_admin: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub message_text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub order_id: Uuid,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Admin inbox row: one per order that has messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub last_message: String,
    pub last_message_at: Option<String>,
    pub message_count: i64,
    pub unread_by_admin: i64,
}

// ============================================================================
// Realtime feed (WebSocket)
// ============================================================================

/// Messages sent from a client to the feed endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRequest {
    /// Start receiving events for an order thread
    Subscribe { order_id: Uuid },

    /// Stop receiving events for an order thread
    Unsubscribe { order_id: Uuid },

    /// Keep-alive
    Ping,
}

/// Events pushed from the server to feed subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Subscription accepted
    Subscribed { order_id: Uuid },

    /// Subscription removed
    Unsubscribed { order_id: Uuid },

    /// A new row was inserted into the thread
    NewMessage { message: MessageInfo },

    /// One side marked the thread read
    MessagesRead { order_id: Uuid, by_admin: bool },

    /// Keep-alive response
    Pong,

    /// Request refused or malformed
    Error { message: String },
}

impl FeedEvent {
    pub fn error(message: impl Into<String>) -> Self {
        FeedEvent::Error {
            message: message.into(),
        }
    }

    /// Order the event belongs to, if any
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            FeedEvent::Subscribed { order_id }
            | FeedEvent::Unsubscribed { order_id }
            | FeedEvent::MessagesRead { order_id, .. } => Some(*order_id),
            FeedEvent::NewMessage { message } => Some(message.order_id),
            FeedEvent::Pong | FeedEvent::Error { .. } => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
