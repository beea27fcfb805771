//! Test helpers for chat flow tests.
//!
//! Provides fake token providers and helpers to wait on asynchronous
//! session events.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::timeout;

use livechat::chat::{ChatClient, LoopbackTransport, RoomLocation, SessionState, Transcript};
use livechat::{ChatError, Credential, Result, TokenProvider};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Token provider that issues numbered tokens without any network call.
pub struct StaticTokenProvider {
    calls: AtomicUsize,
    lifetime: chrono::Duration,
    usernames: Mutex<Vec<String>>,
}

impl StaticTokenProvider {
    /// Provider whose tokens are valid for ten minutes.
    pub fn new() -> Self {
        Self::expiring_in(chrono::Duration::minutes(10))
    }

    /// Provider whose tokens expire after `lifetime` (may be negative).
    pub fn expiring_in(lifetime: chrono::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lifetime,
            usernames: Mutex::new(Vec::new()),
        }
    }

    /// Number of tokens issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Display names tokens were requested for, in order.
    pub fn usernames(&self) -> Vec<String> {
        self.usernames.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, username: &str) -> Result<Credential> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.usernames.lock().unwrap().push(username.to_string());
        let now = Utc::now();
        Ok(Credential::new(
            format!("token-{n}"),
            now + chrono::Duration::hours(1),
            now + self.lifetime,
        ))
    }
}

/// Token provider that fails like an HTTP 500 from the auth service.
///
/// After `failures` failed calls it starts issuing tokens.
pub struct FailingTokenProvider {
    calls: AtomicUsize,
    failures: usize,
}

impl FailingTokenProvider {
    /// Provider that always fails.
    pub fn new() -> Self {
        Self::times(usize::MAX)
    }

    /// Provider that fails `failures` times, then succeeds.
    pub fn times(failures: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
        }
    }

    /// Number of token requests made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FailingTokenProvider {
    async fn fetch_token(&self, _username: &str) -> Result<Credential> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ChatError::Auth(
                "HTTP error: 500 Internal Server Error".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Credential::new(
            format!("token-{n}"),
            now + chrono::Duration::hours(1),
            now + chrono::Duration::minutes(10),
        ))
    }
}

/// Room location used by tests.
pub fn test_location() -> RoomLocation {
    RoomLocation::new("us-west-2", "arn:aws:ivschat:us-west-2:123456789012:room/test")
}

/// Create a client over a fresh auto-handshaking loopback transport.
pub fn test_client(tokens: Arc<dyn TokenProvider>) -> (ChatClient, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let client = ChatClient::new(test_location(), tokens, transport.clone());
    (client, transport)
}

/// Create a client over a loopback transport that emits nothing by itself.
pub fn manual_client(tokens: Arc<dyn TokenProvider>) -> (ChatClient, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::manual());
    let client = ChatClient::new(test_location(), tokens, transport.clone());
    (client, transport)
}

/// Wait until the client's active session reaches `expected`.
pub async fn wait_for_status(client: &ChatClient, expected: SessionState) {
    let mut changes = client
        .session()
        .expect("client has no active session")
        .state_changes();
    timeout(DEFAULT_TIMEOUT, changes.wait_for(|state| *state == expected))
        .await
        .expect("timed out waiting for session state")
        .expect("session state channel closed");
}

/// Wait until the transcript holds at least `count` entries.
pub async fn wait_for_entries(transcript: &Transcript, count: usize) {
    timeout(DEFAULT_TIMEOUT, async {
        while transcript.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for transcript entries");
}

/// Let queued events run through the session pump.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
