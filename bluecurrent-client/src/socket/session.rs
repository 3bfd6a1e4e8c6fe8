//! Session state machine
//!
//! Tracks the lifecycle of the socket session:
//! - Disconnected → Connecting: socket opened, receive loop started
//! - Connecting → Authenticating: password round trip (skipped with a cached token)
//! - Authenticating/Connecting → Ready: HELLO acknowledged
//! - any → Disconnected: teardown
//!
//! The bearer token survives teardown so a later connect can skip the
//! password round trip; only an explicit clear drops it.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// State of the socket session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket, no receive task
    Disconnected,
    /// Socket open, handshake not started
    Connecting,
    /// VALIDATE_PASSWORD sent, awaiting STATUS_PASSWORD
    Authenticating,
    /// HELLO acknowledged
    Ready,
}

/// Events driving the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport socket opened
    Connected,
    /// Password round trip started
    LoginStarted,
    /// Server accepted the credentials
    TokenIssued(String),
    /// Server rejected the credentials
    LoginRejected,
    /// HELLO reply received
    HelloAcknowledged,
    /// Socket closed and receive task stopped
    Disconnected,
    /// Cached token dropped
    TokenCleared,
}

/// Session bookkeeping for one credentials pair
pub struct Session {
    pub username: String,
    pub state: SessionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub authenticated_at: Option<DateTime<Utc>>,
    token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("state", &self.state)
            .field("connected_at", &self.connected_at)
            .field("authenticated_at", &self.authenticated_at)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: SessionState::Disconnected,
            connected_at: None,
            authenticated_at: None,
            token: None,
        }
    }

    /// Handle a session event
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                self.state = SessionState::Connecting;
                self.connected_at = Some(Utc::now());
                debug!("Socket open, starting handshake");
            }

            SessionEvent::LoginStarted => {
                self.state = SessionState::Authenticating;
                debug!("Validating password for {}", self.username);
            }

            SessionEvent::TokenIssued(token) => {
                self.token = Some(token);
                self.authenticated_at = Some(Utc::now());
                info!("Successfully authenticated as {}", self.username);
            }

            SessionEvent::LoginRejected => {
                self.token = None;
                warn!("Credentials rejected for {}", self.username);
            }

            SessionEvent::HelloAcknowledged => {
                self.state = SessionState::Ready;
                info!("Session ready");
            }

            SessionEvent::Disconnected => {
                self.state = SessionState::Disconnected;
                self.connected_at = None;
                debug!("Session disconnected");
            }

            SessionEvent::TokenCleared => {
                self.token = None;
                self.authenticated_at = None;
                debug!("Cached token cleared");
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Inject a token obtained elsewhere
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Whether connecting must go through the password round trip
    pub fn needs_login(&self) -> bool {
        self.token.is_none()
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }
}
