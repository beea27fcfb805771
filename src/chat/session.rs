//! Chat room session.
//!
//! A [`Session`] is one live or pending connection to a room. It owns the
//! credential source, the event pump that consumes transport events in
//! delivery order, and the listeners subscribed to those events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::credential::{Credential, CredentialSource};
use super::event::{EventKind, RoomEvent};
use super::transport::{ChatTransport, ConnectRequest, EventSink, RoomLocation, SendMessageRequest};
use crate::{ChatError, Result};

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, connect not called yet.
    Uninitialized,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Connected,
    /// Closed. Terminal for this session.
    Disconnected,
}

impl SessionState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback invoked for each event of one category.
///
/// Runs on the session's event pump with the listener table locked, so it
/// must not add or remove listeners itself.
pub type Listener = Box<dyn Fn(&RoomEvent) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

struct SessionInner {
    id: Uuid,
    location: RoomLocation,
    credentials: Arc<CredentialSource>,
    transport: Arc<dyn ChatTransport>,
    state: watch::Sender<SessionState>,
    listeners: Mutex<ListenerRegistry>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    fn listeners(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the state transition carried by `event`.
    ///
    /// Returns false if the session is already disconnected and the event
    /// must not reach listeners.
    fn apply(&self, event: &RoomEvent) -> bool {
        if *self.state.borrow() == SessionState::Disconnected {
            return false;
        }
        let next = match event {
            RoomEvent::Connecting => Some(SessionState::Connecting),
            RoomEvent::Connect => Some(SessionState::Connected),
            RoomEvent::Disconnect { .. } => Some(SessionState::Disconnected),
            RoomEvent::UserDisconnect(_) | RoomEvent::Message(_) => None,
        };
        if let Some(next) = next {
            self.state.send_if_modified(|state| {
                let changed = *state != next;
                *state = next;
                changed
            });
        }
        true
    }

    fn dispatch(&self, event: &RoomEvent) {
        let kind = event.kind();
        let registry = self.listeners();
        for entry in registry.entries.iter().filter(|entry| entry.kind == kind) {
            (entry.listener)(event);
        }
    }
}

/// Consume transport events one at a time, in delivery order.
async fn run_pump(session: Weak<SessionInner>, mut events: mpsc::UnboundedReceiver<RoomEvent>) {
    while let Some(event) = events.recv().await {
        let inner = match session.upgrade() {
            Some(inner) => inner,
            None => break,
        };

        if !inner.apply(&event) {
            debug!(session = %inner.id, event = %event.kind(), "dropping event after disconnect");
            continue;
        }

        if let RoomEvent::Disconnect { reason } = &event {
            info!(session = %inner.id, reason = %reason, "disconnected from chat room");
        } else if matches!(event, RoomEvent::Connect) {
            info!(session = %inner.id, room = inner.location.room_id(), "connected to chat room");
        }

        inner.dispatch(&event);
    }
}

/// One connection instance to a room.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session bound to `location`.
    ///
    /// Nothing happens on the network until [`Session::connect`].
    pub fn new(
        location: RoomLocation,
        credentials: Arc<CredentialSource>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                location,
                credentials,
                transport,
                state,
                listeners: Mutex::new(ListenerRegistry::default()),
                pump: Mutex::new(None),
            }),
        }
    }

    /// Session id, for logging.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Room this session is bound to.
    pub fn location(&self) -> &RoomLocation {
        &self.inner.location
    }

    /// Display name the session authenticates as.
    pub fn username(&self) -> &str {
        self.inner.credentials.username()
    }

    /// Current status. Never blocks.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Whether the `Connect` event has been observed and no disconnect since.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Receiver notified on every status change.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Register one listener for `kind`.
    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.add_listeners(vec![(kind, listener)])[0]
    }

    /// Register several listeners under a single lock acquisition.
    ///
    /// Either all of them see the next event or none does.
    pub fn add_listeners(&self, listeners: Vec<(EventKind, Listener)>) -> Vec<ListenerId> {
        let mut registry = self.inner.listeners();
        let mut ids = Vec::with_capacity(listeners.len());
        for (kind, listener) in listeners {
            let id = ListenerId(registry.next_id);
            registry.next_id += 1;
            registry.entries.push(ListenerEntry { id, kind, listener });
            ids.push(id);
        }
        ids
    }

    /// Remove listeners under a single lock acquisition.
    ///
    /// Once this returns, none of them will be invoked again.
    /// Returns the number of listeners removed.
    pub fn remove_listeners(&self, ids: &[ListenerId]) -> usize {
        let mut registry = self.inner.listeners();
        let before = registry.entries.len();
        registry.entries.retain(|entry| !ids.contains(&entry.id));
        before - registry.entries.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().entries.len()
    }

    /// Fetch a fresh credential and start the handshake.
    ///
    /// An authentication failure returns before anything is sent to the
    /// transport and leaves the session disconnected. A transport failure is
    /// also delivered to listeners as a `Disconnect` event.
    pub async fn connect(&self) -> Result<()> {
        let started = self.inner.state.send_if_modified(|state| {
            if *state == SessionState::Uninitialized {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ChatError::Transport(format!(
                "session already {}",
                self.state()
            )));
        }

        let credential = match self.inner.credentials.fresh().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(session = %self.inner.id, error = %e, "could not obtain chat token");
                self.inner.state.send_replace(SessionState::Disconnected);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventSink::new(tx);
        let pump = tokio::spawn(run_pump(Arc::downgrade(&self.inner), rx));
        *self.inner.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(pump);

        let request = ConnectRequest {
            location: self.inner.location.clone(),
            credential,
            credentials: Arc::clone(&self.inner.credentials),
            events: events.clone(),
        };
        if let Err(e) = self.inner.transport.connect(request).await {
            warn!(session = %self.inner.id, error = %e, "chat transport failed to connect");
            let reason = match &e {
                ChatError::Transport(reason) => reason.clone(),
                other => other.to_string(),
            };
            events.emit(RoomEvent::disconnect(reason));
            return Err(e);
        }
        Ok(())
    }

    /// Credential for token renewal, fetching a new one if the stored one expired.
    pub async fn renew_credential(&self) -> Result<Credential> {
        self.inner.credentials.usable().await
    }

    /// Submit already escaped content.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<()> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        self.inner
            .transport
            .send_message(SendMessageRequest::new(content))
            .await
    }

    /// Close the connection.
    ///
    /// The status flips to disconnected immediately; events still queued
    /// from the transport are dropped.
    pub async fn close(&self) {
        let previous = self.inner.state.send_replace(SessionState::Disconnected);
        if matches!(previous, SessionState::Connecting | SessionState::Connected) {
            self.inner.transport.disconnect().await;
            info!(session = %self.inner.id, "closed chat session");
        }
        if let Some(pump) = self
            .inner
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let pump = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("location", &self.inner.location)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
