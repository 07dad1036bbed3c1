//! Control-channel connection state machine.
//!
//! [`ConnectionManager`] exclusively owns the [`LiveSession`] handle and the
//! recorded [`ConnectionState`]. A session handle exists if and only if the
//! state is not `Disconnected`.
//!
//! # Connect flow
//!
//! ```text
//! Disconnected ── begin_connect() ──► Connecting ── finish_connect(Ok) ──► Connected
//!      ▲                                  │                                    │
//!      │                                  └── finish_connect(Err) ─────────────┤
//!      └────────────── take_session() (disconnect / liveness loss) ◄───────────┘
//! ```
//!
//! Connecting is split in two so the orchestrator can await the handshake
//! without holding any borrow. Each attempt gets an id; a handshake that
//! completes after its attempt was superseded by a disconnect is reported as
//! [`ConnectionError::Aborted`] and leaves the state untouched.

// Rust guideline compliant 2026-02

use std::rc::Rc;

use serde::Serialize;

use crate::engine::{AuthContext, Endpoint, Engine, LiveSession};
use crate::error::ConnectionError;

/// Recorded state of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// Session constructed, handshake pending.
    Connecting,
    /// Handshake complete.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Identifier of one connect attempt.
pub type AttemptId = u64;

/// Owner of the live session and its state.
#[derive(Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    session: Option<Rc<dyn LiveSession>>,
    endpoint: Option<Endpoint>,
    attempt: AttemptId,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate preconditions, construct the session and enter `Connecting`.
    ///
    /// Fails without changing state if a session already exists, if `auth`
    /// is absent, or if the engine refuses to construct a session.
    pub fn begin_connect(
        &mut self,
        engine: &dyn Engine,
        endpoint: Endpoint,
        auth: Option<&AuthContext>,
    ) -> Result<(AttemptId, Rc<dyn LiveSession>), ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::AlreadyActive(self.state));
        }
        if auth.is_none() {
            return Err(ConnectionError::MissingAuth);
        }

        let session = engine.construct(&endpoint)?;

        self.attempt += 1;
        self.state = ConnectionState::Connecting;
        self.session = Some(Rc::clone(&session));
        self.endpoint = Some(endpoint);
        Ok((self.attempt, session))
    }

    /// Record the handshake outcome for `attempt`.
    ///
    /// On failure the session is closed best-effort and the state reverts to
    /// `Disconnected`. If the attempt is no longer current, returns
    /// [`ConnectionError::Aborted`] without touching anything.
    pub fn finish_connect(
        &mut self,
        attempt: AttemptId,
        outcome: Result<(), ConnectionError>,
    ) -> Result<(), ConnectionError> {
        if attempt != self.attempt || self.state != ConnectionState::Connecting {
            return Err(ConnectionError::Aborted);
        }

        match outcome {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                if let Some(session) = self.take_session() {
                    if let Err(close_err) = session.close() {
                        log::debug!("Ignoring close error after failed handshake: {close_err}");
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove the session and set `Disconnected`.
    ///
    /// The caller is responsible for closing the returned session and for
    /// tearing down anything rendered through it.
    pub fn take_session(&mut self) -> Option<Rc<dyn LiveSession>> {
        self.state = ConnectionState::Disconnected;
        self.endpoint = None;
        self.session.take()
    }

    /// True if the state is `Connected` but the channel reports closed.
    pub fn liveness_lost(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.session.as_ref().is_some_and(|s| !s.is_connected())
    }

    /// Recorded state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True if the state is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The session, while connecting or connected.
    pub fn session(&self) -> Option<Rc<dyn LiveSession>> {
        self.session.as_ref().map(Rc::clone)
    }

    /// The session, only while connected.
    pub fn connected_session(&self) -> Option<Rc<dyn LiveSession>> {
        if self.is_connected() {
            self.session()
        } else {
            None
        }
    }

    /// Endpoint of the current session.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("attempt", &self.attempt)
            .finish()
    }
}
