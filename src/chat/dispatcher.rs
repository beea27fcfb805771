//! Room event dispatcher.
//!
//! Turns room events into transcript entries. One listener is registered
//! per event category; [`EventDispatcher::attach`] registers all of them at
//! once and the returned [`Attachment`] removes all of them at once.

use tracing::{debug, trace};

use super::event::{ChatMessage, DisconnectUserEvent, EventKind, MessageKind, RoomEvent};
use super::session::{Listener, ListenerId, Session};
use super::transcript::{Transcript, TranscriptEntry};

/// Notice appended when the handshake completes.
pub const CONNECTED_NOTICE: &str = "Connected to the chat room.";

/// Text of the error appended when a connection closes.
pub fn connection_closed(reason: &str) -> String {
    format!("Connection closed. Reason: {reason}")
}

/// Translate a room event into the transcript entry it produces, if any.
pub fn classify(event: &RoomEvent) -> Option<TranscriptEntry> {
    match event {
        RoomEvent::Connecting => None,
        RoomEvent::Connect => Some(TranscriptEntry::notice(CONNECTED_NOTICE)),
        RoomEvent::Disconnect { reason } => Some(TranscriptEntry::error(connection_closed(reason))),
        RoomEvent::UserDisconnect(event) => Some(user_disconnected(event)),
        RoomEvent::Message(msg) => message_entry(msg),
    }
}

fn user_disconnected(event: &DisconnectUserEvent) -> TranscriptEntry {
    TranscriptEntry::error(connection_closed(&event.reason))
}

fn message_entry(msg: &ChatMessage) -> Option<TranscriptEntry> {
    match msg.kind() {
        MessageKind::Message => Some(TranscriptEntry::message(msg)),
        MessageKind::Unsupported(message_type) => {
            debug!(
                message_id = %msg.id,
                message_type = %message_type,
                "unsupported message type, rendering as a chat message"
            );
            Some(TranscriptEntry::message(msg))
        }
    }
}

/// Forwards room events of one session into a transcript.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    transcript: Transcript,
}

impl EventDispatcher {
    /// Create a dispatcher writing into `transcript`.
    pub fn new(transcript: Transcript) -> Self {
        Self { transcript }
    }

    /// Transcript this dispatcher writes into.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn listener(&self) -> Listener {
        let transcript = self.transcript.clone();
        Box::new(move |event: &RoomEvent| {
            if let Some(entry) = classify(event) {
                transcript.append(entry);
            }
        })
    }

    /// Subscribe to every event category of `session`.
    pub fn attach(&self, session: &Session) -> Attachment {
        let connecting: Listener = Box::new(|_: &RoomEvent| {
            trace!("connecting to chat room");
        });
        let ids = session.add_listeners(vec![
            (EventKind::Connecting, connecting),
            (EventKind::Connect, self.listener()),
            (EventKind::Disconnect, self.listener()),
            (EventKind::UserDisconnect, self.listener()),
            (EventKind::Message, self.listener()),
        ]);
        debug!(session = %session.id(), listeners = ids.len(), "attached event dispatcher");
        Attachment {
            session: session.clone(),
            ids,
        }
    }
}

/// Disposer for the listeners registered by [`EventDispatcher::attach`].
///
/// Dropping it detaches as well.
#[must_use = "dropping an attachment detaches its listeners"]
pub struct Attachment {
    session: Session,
    ids: Vec<ListenerId>,
}

impl Attachment {
    /// Session the listeners are attached to.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the listeners are still registered.
    pub fn is_attached(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Remove every listener. Returns how many were removed.
    pub fn detach(mut self) -> usize {
        self.remove()
    }

    fn remove(&mut self) -> usize {
        if self.ids.is_empty() {
            return 0;
        }
        let removed = self.session.remove_listeners(&self.ids);
        debug!(session = %self.session.id(), listeners = removed, "detached event dispatcher");
        self.ids.clear();
        removed
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("session", &self.session.id())
            .field("listeners", &self.ids.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::event::{ChatUser, MESSAGE_TYPE_ATTRIBUTE};
    use crate::chat::transcript::EntryKind;
    use chrono::Utc;

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage::new(id, content, Utc::now(), ChatUser::new("u1", "bob"))
    }

    #[test]
    fn test_classify_connecting() {
        assert!(classify(&RoomEvent::Connecting).is_none());
    }

    #[test]
    fn test_classify_connect() {
        let entry = classify(&RoomEvent::Connect).unwrap();
        assert_eq!(entry.kind, EntryKind::Notice);
        assert_eq!(entry.message, "Connected to the chat room.");
    }

    #[test]
    fn test_classify_disconnect() {
        let entry = classify(&RoomEvent::disconnect("Spam")).unwrap();
        assert_eq!(entry.kind, EntryKind::Error);
        assert_eq!(entry.message, "Connection closed. Reason: Spam");
    }

    #[test]
    fn test_classify_user_disconnect() {
        let event = RoomEvent::UserDisconnect(DisconnectUserEvent::new("u9", "Harassment"));
        let entry = classify(&event).unwrap();
        assert_eq!(entry.kind, EntryKind::Error);
        assert!(entry.message.contains("Harassment"));
    }

    #[test]
    fn test_classify_message() {
        let sent = Utc::now();
        let msg = ChatMessage::new("m1", "hi", sent, ChatUser::new("u1", "bob"));
        let entry = classify(&RoomEvent::Message(msg)).unwrap();

        assert_eq!(entry.kind, EntryKind::Message);
        assert_eq!(entry.username, "bob");
        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.message, "hi");
        assert_eq!(entry.message_id, "m1");
        assert_eq!(entry.timestamp, sent);
    }

    #[test]
    fn test_classify_unsupported_type_falls_back_to_message() {
        let msg = message("m2", "vote!").with_attribute(MESSAGE_TYPE_ATTRIBUTE, "POLL");
        let entry = classify(&RoomEvent::Message(msg)).unwrap();
        assert_eq!(entry.kind, EntryKind::Message);
        assert_eq!(entry.message, "vote!");
    }

    #[test]
    fn test_listener_appends_in_call_order() {
        let transcript = Transcript::new();
        let dispatcher = EventDispatcher::new(transcript.clone());
        let listener = dispatcher.listener();

        listener(&RoomEvent::Connect);
        listener(&RoomEvent::Message(message("m1", "one")));
        listener(&RoomEvent::Message(message("m2", "two")));
        listener(&RoomEvent::disconnect("bye"));

        let kinds: Vec<_> = transcript.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Notice,
                EntryKind::Message,
                EntryKind::Message,
                EntryKind::Error
            ]
        );
        assert_eq!(dispatcher.transcript().len(), 4);
    }
}
