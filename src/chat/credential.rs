//! Chat credentials and the per-session credential source.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::token::TokenProvider;
use crate::Result;

/// Short-lived token authorizing one session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque token string handed to the transport.
    pub token: String,
    /// When the session authorized by this token ends.
    pub session_expiration_time: DateTime<Utc>,
    /// When the token itself stops being accepted.
    pub token_expiration_time: DateTime<Utc>,
}

impl Credential {
    /// Create a new credential.
    pub fn new(
        token: impl Into<String>,
        session_expiration_time: DateTime<Utc>,
        token_expiration_time: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            session_expiration_time,
            token_expiration_time,
        }
    }

    /// Whether the token expiration has passed at `now`.
    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expiration_time
    }

    /// Whether the session expiration has passed at `now`.
    pub fn is_session_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.session_expiration_time
    }

    /// Whether the credential may still be used at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_token_expired_at(now) && !self.is_session_expired_at(now)
    }

    /// Whether the credential may still be used right now.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("session_expiration_time", &self.session_expiration_time)
            .field("token_expiration_time", &self.token_expiration_time)
            .finish()
    }
}

/// Lazily invoked credential source bound to one display name.
///
/// Owned by a single session. The token provider is only called when a
/// connect needs a fresh credential or the stored one has expired.
pub struct CredentialSource {
    provider: Arc<dyn TokenProvider>,
    username: String,
    current: Mutex<Option<Credential>>,
}

impl CredentialSource {
    /// Create a credential source for `username`.
    pub fn new(provider: Arc<dyn TokenProvider>, username: impl Into<String>) -> Self {
        Self {
            provider,
            username: username.into(),
            current: Mutex::new(None),
        }
    }

    /// Display name this source requests credentials for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Fetch a new credential unconditionally and remember it.
    ///
    /// Used for every connect attempt.
    pub async fn fresh(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;
        let credential = self.provider.fetch_token(&self.username).await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Return the stored credential if still usable, otherwise fetch a new one.
    ///
    /// Used on token renewal.
    pub async fn usable(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            if credential.is_usable() {
                return Ok(credential.clone());
            }
            debug!(username = %self.username, "stored credential expired, requesting a new one");
        }
        let credential = self.provider.fetch_token(&self.username).await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Forget the stored credential.
    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatError;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider handing out credentials that expire after `lifetime`.
    struct CountingProvider {
        calls: AtomicUsize,
        lifetime: Duration,
    }

    impl CountingProvider {
        fn new(lifetime: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                lifetime,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self, username: &str) -> Result<Credential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = Utc::now();
            Ok(Credential::new(
                format!("{username}-{n}"),
                now + Duration::hours(1),
                now + self.lifetime,
            ))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        async fn fetch_token(&self, _username: &str) -> Result<Credential> {
            Err(ChatError::Auth("HTTP error: 500".to_string()))
        }
    }

    #[test]
    fn test_credential_expiry() {
        let now = Utc::now();
        let credential = Credential::new("t", now + Duration::hours(1), now + Duration::minutes(5));

        assert!(credential.is_usable_at(now));
        assert!(!credential.is_token_expired_at(now + Duration::minutes(4)));
        assert!(credential.is_token_expired_at(now + Duration::minutes(5)));
        assert!(!credential.is_usable_at(now + Duration::minutes(10)));
        assert!(credential.is_session_expired_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let now = Utc::now();
        let credential = Credential::new("super-secret", now, now);
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_usable_reuses_valid_credential() {
        let provider = Arc::new(CountingProvider::new(Duration::minutes(10)));
        let source = CredentialSource::new(provider.clone(), "alice");

        let first = source.fresh().await.unwrap();
        let second = source.usable().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_usable_never_reuses_expired_token() {
        let provider = Arc::new(CountingProvider::new(Duration::seconds(-1)));
        let source = CredentialSource::new(provider.clone(), "alice");

        let first = source.fresh().await.unwrap();
        let second = source.usable().await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fresh_always_fetches() {
        let provider = Arc::new(CountingProvider::new(Duration::minutes(10)));
        let source = CredentialSource::new(provider.clone(), "alice");

        source.fresh().await.unwrap();
        source.fresh().await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_usable_without_stored_credential_fetches() {
        let provider = Arc::new(CountingProvider::new(Duration::minutes(10)));
        let source = CredentialSource::new(provider.clone(), "bob");

        let credential = source.usable().await.unwrap();
        assert_eq!(credential.token, "bob-0");

        source.clear().await;
        let credential = source.usable().await.unwrap();
        assert_eq!(credential.token, "bob-1");
    }

    #[tokio::test]
    async fn test_failure_yields_no_credential() {
        let source = CredentialSource::new(Arc::new(FailingProvider), "alice");
        let result = source.fresh().await;
        assert!(matches!(result, Err(ChatError::Auth(_))));
    }
}
