//! Chat transport capability.
//!
//! The transport owns the wire connection to the room. Sessions drive it
//! through [`ChatTransport`] and receive its events, in delivery order,
//! through an [`EventSink`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::credential::{Credential, CredentialSource};
use super::event::RoomEvent;
use crate::Result;

/// Where a room lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLocation {
    region_or_url: String,
    room_id: String,
}

impl RoomLocation {
    /// Create a room location.
    pub fn new(region_or_url: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            region_or_url: region_or_url.into(),
            room_id: room_id.into(),
        }
    }

    /// Region name or full endpoint URL.
    pub fn region_or_url(&self) -> &str {
        &self.region_or_url
    }

    /// Room resource identifier.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}

/// An outbound message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    /// Client-generated request id.
    pub request_id: String,
    /// Escaped message body.
    pub content: String,
    /// Optional message attributes.
    pub attributes: HashMap<String, String>,
}

impl SendMessageRequest {
    /// Create a request with a fresh request id.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            content: content.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Ordered channel from a transport to its session.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RoomEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<RoomEvent>) -> Self {
        Self { tx }
    }

    /// Deliver an event to the session.
    ///
    /// Returns false once the session has stopped listening.
    pub fn emit(&self, event: RoomEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the session has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything a transport needs to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Room to connect to.
    pub location: RoomLocation,
    /// Freshly fetched credential for this attempt.
    pub credential: Credential,
    /// Credential source for token renewal during the connection.
    pub credentials: Arc<CredentialSource>,
    /// Where inbound events go.
    pub events: EventSink,
}

/// Black-box connection to a chat room.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start the handshake.
    ///
    /// The transport reports `Connect` and later events through
    /// `request.events`. An error means the connection could not be started.
    async fn connect(&self, request: ConnectRequest) -> Result<()>;

    /// Submit an outbound message.
    async fn send_message(&self, request: SendMessageRequest) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&self);
}
