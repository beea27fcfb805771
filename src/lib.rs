//! livechat - client core for a live stream chat room
//!
//! Exchanges a display name for a chat token, drives one room session at a
//! time, and keeps an ordered transcript of messages and connection notices.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;

pub use chat::{
    escape_content, ChatClient, ChatMessage, ChatTransport, ChatUser, Credential,
    EventDispatcher, HttpTokenProvider, LoopbackTransport, MessageSender, RoomEvent,
    RoomLocation, Session, SessionState, TokenProvider, Transcript, TranscriptEntry,
};
pub use config::Config;
pub use error::{ChatError, Result};
