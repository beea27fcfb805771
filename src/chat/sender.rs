//! Outbound message submission.

use tracing::{debug, warn};

use super::session::Session;
use super::transcript::{Transcript, TranscriptEntry};
use crate::{ChatError, Result};

/// Escape backslashes and double quotes for the wire.
///
/// Each `\` and `"` is prefixed with a backslash in a single pass, so a
/// backslash added for a quote is never escaped again.
pub fn escape_content(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Submits messages through a session and reports failures in the transcript.
///
/// Length limits are the compose input's job; text is never truncated here.
#[derive(Debug, Clone)]
pub struct MessageSender {
    session: Session,
    transcript: Transcript,
}

impl MessageSender {
    /// Create a sender for `session`.
    pub fn new(session: Session, transcript: Transcript) -> Self {
        Self {
            session,
            transcript,
        }
    }

    /// Send `text`.
    ///
    /// Empty or whitespace-only text is rejected without touching the
    /// transport. A rejected submission is not retried; it is appended to the
    /// transcript as an error and returned.
    pub async fn send(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let content = escape_content(text);
        match self.session.send_message(content).await {
            Ok(()) => {
                debug!(session = %self.session.id(), "message submitted");
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.session.id(), error = %e, "message rejected");
                self.transcript.append(TranscriptEntry::error(e.to_string()));
                Err(e)
            }
        }
    }
}
