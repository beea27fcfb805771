//! Error types for livechat.

use thiserror::Error;

/// Common error type for livechat.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The authentication service failed or returned malformed data.
    ///
    /// No credential is produced and no session is installed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The connection was lost or never established.
    #[error("transport error: {0}")]
    Transport(String),

    /// The room rejected an outbound message.
    ///
    /// The display text is what ends up in the transcript.
    #[error("Error {code}: {message}")]
    Send {
        /// Error code reported by the room.
        code: u16,
        /// Human readable rejection message.
        message: String,
    },

    /// An operation needed a connected session.
    #[error("not connected to the chat room")]
    NotConnected,

    /// Outbound text was empty or whitespace only.
    #[error("message is empty")]
    EmptyMessage,

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Whether this error came from the token exchange.
    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::Auth(_))
    }
}

/// Result type alias for livechat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        let err = ChatError::Auth("HTTP error: 500".to_string());
        assert_eq!(err.to_string(), "authentication error: HTTP error: 500");
        assert!(err.is_auth());
    }

    #[test]
    fn test_send_error_display() {
        let err = ChatError::Send {
            code: 406,
            message: "Message rejected".to_string(),
        };
        assert_eq!(err.to_string(), "Error 406: Message rejected");
        assert!(!err.is_auth());
    }

    #[test]
    fn test_transport_error_display() {
        let err = ChatError::Transport("socket closed".to_string());
        assert_eq!(err.to_string(), "transport error: socket closed");
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            ChatError::NotConnected.to_string(),
            "not connected to the chat room"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChatError = io_err.into();
        assert!(matches!(err, ChatError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(ChatError::EmptyMessage)
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
