//! Chat module for livechat.
//!
//! This module provides the client side of a live chat room:
//! - Token provisioning and credential renewal
//! - Session lifecycle (connecting, connected, disconnected)
//! - Event dispatch into an append-only transcript
//! - Outbound message escaping and submission

mod client;
mod credential;
mod dispatcher;
mod event;
mod loopback;
mod sender;
mod session;
mod token;
mod transcript;
mod transport;

pub use client::{
    ChatClient, ChatContext, Draft, CONNECTED_PLACEHOLDER, MAX_MESSAGE_LENGTH, WAITING_PLACEHOLDER,
};
pub use credential::{Credential, CredentialSource};
pub use dispatcher::{classify, connection_closed, Attachment, EventDispatcher, CONNECTED_NOTICE};
pub use event::{
    ChatMessage, ChatUser, DisconnectUserEvent, EventKind, MessageKind, RoomEvent,
    MESSAGE_TYPE_ATTRIBUTE, USERNAME_ATTRIBUTE,
};
pub use loopback::{LoopbackTransport, CLIENT_DISCONNECT_REASON};
pub use sender::{escape_content, MessageSender};
pub use session::{Listener, ListenerId, Session, SessionState};
pub use token::{
    generate_user_id, parse_auth_response, AuthRequest, AuthResponse, Capability,
    HttpTokenProvider, TokenProvider,
};
pub use transcript::{relay, EntryKind, Transcript, TranscriptEntry};
pub use transport::{ChatTransport, ConnectRequest, EventSink, RoomLocation, SendMessageRequest};
