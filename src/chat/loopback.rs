//! In-process transport.
//!
//! Completes the handshake immediately, records every outbound request and
//! lets the caller inject room events. Used by the demo binary and tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::event::{ChatMessage, ChatUser, RoomEvent};
use super::transport::{ChatTransport, ConnectRequest, EventSink, SendMessageRequest};
use crate::{ChatError, Result};

/// Reason reported when the client closes the connection itself.
pub const CLIENT_DISCONNECT_REASON: &str = "clientDisconnect";

#[derive(Default)]
struct LoopbackState {
    sink: Option<EventSink>,
    sent: Vec<SendMessageRequest>,
    tokens: Vec<String>,
    send_failures: VecDeque<(u16, String)>,
    connect_failure: Option<String>,
}

/// Transport that never leaves the process.
pub struct LoopbackTransport {
    auto_handshake: bool,
    echo_as: Option<ChatUser>,
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    /// Transport that emits `Connecting` and `Connect` on connect.
    pub fn new() -> Self {
        Self {
            auto_handshake: true,
            echo_as: None,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Transport that emits nothing on its own.
    pub fn manual() -> Self {
        Self {
            auto_handshake: false,
            ..Self::new()
        }
    }

    /// Echo every accepted message back as sent by `user`.
    pub fn with_echo(mut self, user: ChatUser) -> Self {
        self.echo_as = Some(user);
        self
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event to the connected session.
    ///
    /// Returns false if nothing is connected.
    pub fn emit(&self, event: RoomEvent) -> bool {
        match self.state().sink.as_ref() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }

    /// Requests accepted or rejected so far, in submission order.
    pub fn sent(&self) -> Vec<SendMessageRequest> {
        self.state().sent.clone()
    }

    /// Tokens presented on each connect, in order.
    pub fn connect_tokens(&self) -> Vec<String> {
        self.state().tokens.clone()
    }

    /// Number of connect calls.
    pub fn connect_count(&self) -> usize {
        self.state().tokens.len()
    }

    /// Reject the next send with `code` and `message`.
    pub fn fail_next_send(&self, code: u16, message: impl Into<String>) {
        self.state().send_failures.push_back((code, message.into()));
    }

    /// Make the next connect fail with `reason`.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.state().connect_failure = Some(reason.into());
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<()> {
        let mut state = self.state();
        state.tokens.push(request.credential.token.clone());
        if let Some(reason) = state.connect_failure.take() {
            return Err(ChatError::Transport(reason));
        }

        if self.auto_handshake {
            request.events.emit(RoomEvent::Connecting);
            request.events.emit(RoomEvent::Connect);
        }
        debug!(room = request.location.room_id(), "loopback connected");
        state.sink = Some(request.events);
        Ok(())
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<()> {
        let mut state = self.state();
        state.sent.push(request.clone());
        if let Some((code, message)) = state.send_failures.pop_front() {
            return Err(ChatError::Send { code, message });
        }

        if let (Some(user), Some(sink)) = (self.echo_as.as_ref(), state.sink.as_ref()) {
            let mut echoed = ChatMessage::new(
                Uuid::new_v4().to_string(),
                request.content,
                Utc::now(),
                user.clone(),
            );
            echoed.attributes = request.attributes;
            echoed.request_id = Some(request.request_id);
            sink.emit(RoomEvent::Message(echoed));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(sink) = self.state().sink.take() {
            sink.emit(RoomEvent::disconnect(CLIENT_DISCONNECT_REASON));
        }
    }
}
