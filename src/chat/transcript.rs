//! Append-only chat transcript.
//!
//! The transcript is the ordered log of everything the user sees: chat
//! messages, connection notices and errors. Entries are never changed or
//! removed once appended.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use super::event::ChatMessage;

/// Maximum number of entries buffered for each subscriber.
const CHANNEL_CAPACITY: usize = 100;

/// Kind of transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Chat message from a room member.
    Message,
    /// System notice (success).
    Notice,
    /// System error.
    Error,
}

impl EntryKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Message => "MESSAGE",
            EntryKind::Notice => "SUCCESS",
            EntryKind::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Server send time for messages, wall clock for system entries.
    pub timestamp: DateTime<Utc>,
    /// Sender display name (empty for system entries).
    pub username: String,
    /// Sender id (empty for system entries).
    pub user_id: String,
    /// Entry text.
    pub message: String,
    /// Server message id (empty for system entries).
    pub message_id: String,
}

impl TranscriptEntry {
    /// Build a chat entry from an inbound message.
    pub fn message(msg: &ChatMessage) -> Self {
        Self {
            kind: EntryKind::Message,
            timestamp: msg.send_time,
            username: msg.sender.username().to_string(),
            user_id: msg.sender.user_id.clone(),
            message: msg.content.clone(),
            message_id: msg.id.clone(),
        }
    }

    /// Build a system notice stamped with the current time.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::system(EntryKind::Notice, text)
    }

    /// Build a system error stamped with the current time.
    pub fn error(text: impl Into<String>) -> Self {
        Self::system(EntryKind::Error, text)
    }

    fn system(kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            username: String::new(),
            user_id: String::new(),
            message: text.into(),
            message_id: String::new(),
        }
    }

    /// Whether this is a system entry rather than a chat message.
    pub fn is_system(&self) -> bool {
        self.kind != EntryKind::Message
    }

    /// Format the entry for a plain text display.
    pub fn format(&self) -> String {
        match self.kind {
            EntryKind::Message => format!("<{}> {}", self.username, self.message),
            EntryKind::Notice => format!("*** {}", self.message),
            EntryKind::Error => format!("!!! {}", self.message),
        }
    }
}

/// Shared handle to the transcript log.
///
/// Cloning the handle shares the same log.
#[derive(Clone)]
pub struct Transcript {
    entries: Arc<RwLock<Vec<TranscriptEntry>>>,
    sender: broadcast::Sender<TranscriptEntry>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            sender,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<TranscriptEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry and notify subscribers.
    ///
    /// Subscribers see entries in the same order as the log.
    pub fn append(&self, entry: TranscriptEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry.clone());
        let _ = self.sender.send(entry);
    }

    /// Snapshot of all entries in order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<TranscriptEntry> {
        self.read().last().cloned()
    }

    /// Receiver for entries appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEntry> {
        self.sender.subscribe()
    }
}

/// Feed entries from a subscription to `on_entry` until the transcript is gone.
///
/// A subscriber that falls behind skips the entries it missed and keeps
/// going. Returns the number of skipped entries.
pub async fn relay(
    mut entries: broadcast::Receiver<TranscriptEntry>,
    mut on_entry: impl FnMut(&TranscriptEntry),
) -> u64 {
    let mut skipped_total = 0;
    loop {
        match entries.recv().await {
            Ok(entry) => on_entry(&entry),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "transcript subscriber fell behind");
                skipped_total += skipped;
            }
            Err(RecvError::Closed) => return skipped_total,
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::event::ChatUser;

    #[test]
    fn test_entry_kind_as_str() {
        assert_eq!(EntryKind::Message.as_str(), "MESSAGE");
        assert_eq!(EntryKind::Notice.as_str(), "SUCCESS");
        assert_eq!(EntryKind::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_message_entry_copies_fields() {
        let sent = Utc::now();
        let msg = ChatMessage::new("m1", "hi", sent, ChatUser::new("u1", "bob"));
        let entry = TranscriptEntry::message(&msg);

        assert_eq!(entry.kind, EntryKind::Message);
        assert_eq!(entry.username, "bob");
        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.message, "hi");
        assert_eq!(entry.message_id, "m1");
        assert_eq!(entry.timestamp, sent);
        assert!(!entry.is_system());
    }

    #[test]
    fn test_system_entries_have_empty_identity() {
        let entry = TranscriptEntry::error("Connection closed. Reason: Spam");
        assert_eq!(entry.kind, EntryKind::Error);
        assert!(entry.username.is_empty());
        assert!(entry.user_id.is_empty());
        assert!(entry.message_id.is_empty());
        assert!(entry.is_system());
    }

    #[test]
    fn test_entry_format() {
        let msg = ChatMessage::new("m1", "hi", Utc::now(), ChatUser::new("u1", "bob"));
        assert_eq!(TranscriptEntry::message(&msg).format(), "<bob> hi");
        assert_eq!(TranscriptEntry::notice("Connected").format(), "*** Connected");
        assert_eq!(TranscriptEntry::error("Oops").format(), "!!! Oops");
    }

    #[test]
    fn test_append_preserves_order() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());

        for i in 0..5 {
            transcript.append(TranscriptEntry::notice(format!("notice {i}")));
        }

        let messages: Vec<_> = transcript.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec!["notice 0", "notice 1", "notice 2", "notice 3", "notice 4"]
        );
        assert_eq!(transcript.len(), 5);
        assert_eq!(transcript.last().unwrap().message, "notice 4");
    }

    #[test]
    fn test_clones_share_log() {
        let transcript = Transcript::new();
        let other = transcript.clone();

        other.append(TranscriptEntry::error("shared"));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_receives_appended_entries() {
        let transcript = Transcript::new();
        let mut receiver = transcript.subscribe();

        transcript.append(TranscriptEntry::notice("first"));
        transcript.append(TranscriptEntry::error("second"));

        assert_eq!(receiver.recv().await.unwrap().message, "first");
        assert_eq!(receiver.recv().await.unwrap().message, "second");
    }

    #[tokio::test]
    async fn test_relay_survives_lagging() {
        let total = CHANNEL_CAPACITY * 3;
        let transcript = Transcript::new();
        let entries = transcript.subscribe();
        for i in 0..total {
            transcript.append(TranscriptEntry::notice(format!("n{i}")));
        }
        drop(transcript);

        let mut seen = Vec::new();
        let skipped = relay(entries, |entry| seen.push(entry.message.clone())).await;

        assert!(skipped > 0);
        assert_eq!(seen.len() as u64 + skipped, total as u64);
        assert_eq!(seen[0], format!("n{skipped}"));
        assert_eq!(seen.last().unwrap(), &format!("n{}", total - 1));
    }
}
