//! Room events delivered by the chat transport.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Attribute key carrying the explicit message type.
pub const MESSAGE_TYPE_ATTRIBUTE: &str = "message_type";

/// Attribute key carrying a user's display name.
pub const USERNAME_ATTRIBUTE: &str = "username";

/// A user as seen by the room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    /// Room-level user id.
    pub user_id: String,
    /// User attributes set at token time.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ChatUser {
    /// Create a user with a display name attribute.
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(USERNAME_ATTRIBUTE.to_string(), username.into());
        Self {
            user_id: user_id.into(),
            attributes,
        }
    }

    /// Display name, or an empty string if the attribute is missing.
    pub fn username(&self) -> &str {
        self.attributes
            .get(USERNAME_ATTRIBUTE)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned message id.
    pub id: String,
    /// Message body.
    pub content: String,
    /// Server-assigned send time.
    pub send_time: DateTime<Utc>,
    /// Sender of the message.
    pub sender: ChatUser,
    /// Optional message attributes.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Request id of the originating send, if known.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ChatMessage {
    /// Create a plain message without attributes.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        send_time: DateTime<Utc>,
        sender: ChatUser,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            send_time,
            sender,
            attributes: HashMap::new(),
            request_id: None,
        }
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Classify the message by its optional `message_type` attribute.
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_attribute(
            self.attributes
                .get(MESSAGE_TYPE_ATTRIBUTE)
                .map(String::as_str),
        )
    }
}

/// Kind of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Normal chat message. Also the default when no type is given.
    Message,
    /// Explicit type this client does not know.
    Unsupported(String),
}

impl MessageKind {
    /// Classify a `message_type` attribute value.
    ///
    /// `None`, empty and `MESSAGE` (any case) map to [`MessageKind::Message`].
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => MessageKind::Message,
            Some(v) if v.eq_ignore_ascii_case("MESSAGE") => MessageKind::Message,
            Some(v) => MessageKind::Unsupported(v.to_string()),
        }
    }
}

/// Notification that a user was disconnected from the room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectUserEvent {
    /// Event id.
    #[serde(default)]
    pub id: String,
    /// Disconnected user.
    pub user_id: String,
    /// Reason given for the disconnect.
    pub reason: String,
    /// When the disconnect happened.
    pub send_time: DateTime<Utc>,
    /// Request id of the moderation call.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Raw event attributes.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl DisconnectUserEvent {
    /// Create an event for `user_id` with `reason`.
    pub fn new(user_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.into(),
            reason: reason.into(),
            send_time: Utc::now(),
            request_id: None,
            attributes: HashMap::new(),
        }
    }
}

/// Event category a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Handshake started.
    Connecting,
    /// Handshake completed.
    Connect,
    /// Connection closed.
    Disconnect,
    /// A user was disconnected by the room.
    UserDisconnect,
    /// Chat message received.
    Message,
}

impl EventKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connecting => "connecting",
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::UserDisconnect => "userDisconnect",
            EventKind::Message => "message",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A room event, in transport delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Handshake started.
    Connecting,
    /// Handshake completed.
    Connect,
    /// Connection closed with a reason.
    Disconnect {
        /// Transport-provided reason.
        reason: String,
    },
    /// A user was disconnected by the room.
    UserDisconnect(DisconnectUserEvent),
    /// Chat message received.
    Message(ChatMessage),
}

impl RoomEvent {
    /// Shorthand for a disconnect event.
    pub fn disconnect(reason: impl Into<String>) -> Self {
        RoomEvent::Disconnect {
            reason: reason.into(),
        }
    }

    /// Category of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            RoomEvent::Connecting => EventKind::Connecting,
            RoomEvent::Connect => EventKind::Connect,
            RoomEvent::Disconnect { .. } => EventKind::Disconnect,
            RoomEvent::UserDisconnect(_) => EventKind::UserDisconnect,
            RoomEvent::Message(_) => EventKind::Message,
        }
    }
}
