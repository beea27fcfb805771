//! Chat client: connection manager and UI-facing context.
//!
//! [`ChatClient`] is the presentation boundary. It takes a display name and
//! outbound text in, and exposes the transcript and connection status out.
//! All per-user state lives in its [`ChatContext`].

use std::sync::Arc;

use tracing::{info, warn};

use super::credential::CredentialSource;
use super::dispatcher::{Attachment, EventDispatcher};
use super::sender::MessageSender;
use super::session::{Session, SessionState};
use super::token::TokenProvider;
use super::transcript::Transcript;
use super::transport::{ChatTransport, RoomLocation};
use crate::config::ChatConfig;
use crate::{ChatError, Result};

/// Default maximum number of characters in a composed message.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Compose input placeholder while connected.
pub const CONNECTED_PLACEHOLDER: &str = "Say something";

/// Compose input placeholder while not connected.
pub const WAITING_PLACEHOLDER: &str = "Waiting to connect...";

/// Text being composed by the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    text: String,
    max_length: usize,
}

impl Draft {
    /// Create an empty draft limited to `max_length` characters.
    pub fn new(max_length: usize) -> Self {
        Self {
            text: String::new(),
            max_length,
        }
    }

    /// Replace the draft text, keeping at most `max_length` characters.
    pub fn set(&mut self, text: &str) {
        self.text = text.chars().take(self.max_length).collect();
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character limit.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Whether nothing has been typed.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Discard the text.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Take the text, leaving the draft empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LENGTH)
    }
}

struct ActiveSession {
    session: Session,
    attachment: Attachment,
    sender: MessageSender,
}

/// Per-user chat state.
pub struct ChatContext {
    username: Option<String>,
    draft: Draft,
    transcript: Transcript,
    active: Option<ActiveSession>,
}

impl ChatContext {
    /// Create an empty context.
    pub fn new(max_message_length: usize) -> Self {
        Self {
            username: None,
            draft: Draft::new(max_message_length),
            transcript: Transcript::new(),
            active: None,
        }
    }

    /// Signed-in display name.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Current draft.
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Transcript shared with the dispatcher and sender.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Active session, if signed in.
    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| &active.session)
    }
}

impl Default for ChatContext {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LENGTH)
    }
}

/// Connection manager for one user.
///
/// At most one session is active. Signing in again replaces it: the old
/// session's listeners are detached before the new session's are attached.
///
/// Dropping the client detaches its listeners and stops the event pump, but
/// only [`ChatClient::sign_out`] tells the transport to disconnect.
pub struct ChatClient {
    location: RoomLocation,
    tokens: Arc<dyn TokenProvider>,
    transport: Arc<dyn ChatTransport>,
    context: ChatContext,
}

impl ChatClient {
    /// Create a client for `location`.
    pub fn new(
        location: RoomLocation,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            location,
            tokens,
            transport,
            context: ChatContext::default(),
        }
    }

    /// Create a client from the chat configuration.
    pub fn from_config(
        config: &ChatConfig,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            location: config.location(),
            tokens,
            transport,
            context: ChatContext::new(config.max_message_length),
        }
    }

    /// Per-user state.
    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    /// Transcript of this client.
    pub fn transcript(&self) -> &Transcript {
        &self.context.transcript
    }

    /// Signed-in display name.
    pub fn username(&self) -> Option<&str> {
        self.context.username()
    }

    /// Active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.context.session()
    }

    /// Current connection status. `Uninitialized` when no session exists.
    pub fn status(&self) -> SessionState {
        self.session()
            .map(Session::state)
            .unwrap_or(SessionState::Uninitialized)
    }

    /// Whether the active session has observed its `Connect` event.
    pub fn is_connected(&self) -> bool {
        self.status() == SessionState::Connected
    }

    /// Whether the compose input is enabled.
    pub fn can_compose(&self) -> bool {
        self.context.username.is_some() && self.is_connected()
    }

    /// Placeholder shown in the compose input.
    pub fn placeholder(&self) -> &'static str {
        if self.is_connected() {
            CONNECTED_PLACEHOLDER
        } else {
            WAITING_PLACEHOLDER
        }
    }

    /// Sign in as `username` and connect a new session.
    ///
    /// Any previous session is detached and closed first. If no credential
    /// can be obtained the client is left signed out with no session, and
    /// the caller may try again. A transport failure keeps the new session
    /// (now disconnected) so its error shows in the transcript.
    pub async fn sign_in(&mut self, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::Validation("display name is empty".to_string()));
        }

        self.teardown().await;

        let credentials = Arc::new(CredentialSource::new(Arc::clone(&self.tokens), username));
        let session = Session::new(
            self.location.clone(),
            credentials,
            Arc::clone(&self.transport),
        );
        let attachment = EventDispatcher::new(self.context.transcript.clone()).attach(&session);

        info!(username = %username, room = self.location.room_id(), "signing in to chat room");
        let result = session.connect().await;
        if let Err(e) = &result {
            if e.is_auth() {
                warn!(username = %username, error = %e, "sign-in failed");
                attachment.detach();
                self.context.username = None;
                return result;
            }
        }

        self.context.username = Some(username.to_string());
        let sender = MessageSender::new(session.clone(), self.context.transcript.clone());
        self.context.active = Some(ActiveSession {
            session,
            attachment,
            sender,
        });
        result
    }

    /// Detach and close the active session and forget the display name.
    pub async fn sign_out(&mut self) {
        self.teardown().await;
        self.context.username = None;
    }

    async fn teardown(&mut self) {
        if let Some(active) = self.context.active.take() {
            active.attachment.detach();
            active.session.close().await;
        }
    }

    /// Replace the draft text. Input beyond the length limit is cut off.
    pub fn set_draft(&mut self, text: &str) {
        self.context.draft.set(text);
    }

    /// Current draft.
    pub fn draft(&self) -> &Draft {
        &self.context.draft
    }

    /// Discard the draft.
    pub fn cancel_draft(&mut self) {
        self.context.draft.clear();
    }

    /// Submit the draft, as pressing Enter does.
    ///
    /// An empty draft is ignored. The draft is cleared when the submission
    /// is attempted; if delivery fails and nothing new has been typed, the
    /// text is put back.
    pub async fn submit_draft(&mut self) -> Result<()> {
        if self.context.draft.is_empty() {
            return Ok(());
        }
        if !self.can_compose() {
            return Err(ChatError::NotConnected);
        }
        let sender = match self.context.active.as_ref() {
            Some(active) => active.sender.clone(),
            None => return Err(ChatError::NotConnected),
        };

        let text = self.context.draft.take();
        let result = sender.send(&text).await;
        if let Err(e) = &result {
            if !matches!(e, ChatError::EmptyMessage) && self.context.draft.is_empty() {
                self.context.draft.set(&text);
            }
        }
        result
    }

    /// Send `text` through the active session, bypassing the draft.
    pub async fn send(&self, text: &str) -> Result<()> {
        match self.context.active.as_ref() {
            Some(active) => active.sender.send(text).await,
            None => Err(ChatError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_truncates_to_limit() {
        let mut draft = Draft::new(5);
        draft.set("hello world");
        assert_eq!(draft.text(), "hello");
        assert_eq!(draft.max_length(), 5);
    }

    #[test]
    fn test_draft_counts_characters() {
        let mut draft = Draft::new(3);
        draft.set("あいうえお");
        assert_eq!(draft.text(), "あいう");
    }

    #[test]
    fn test_draft_take_and_clear() {
        let mut draft = Draft::default();
        assert_eq!(draft.max_length(), MAX_MESSAGE_LENGTH);

        draft.set("hi");
        assert_eq!(draft.take(), "hi");
        assert!(draft.is_empty());

        draft.set("again");
        draft.clear();
        assert!(draft.is_empty());
    }

    #[test]
    fn test_context_default() {
        let context = ChatContext::default();
        assert!(context.username().is_none());
        assert!(context.session().is_none());
        assert!(context.transcript().is_empty());
        assert!(context.draft().is_empty());
    }
}
