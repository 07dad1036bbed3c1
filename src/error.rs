//! Error taxonomy for the monitor.
//!
//! Each failure domain gets its own enum so callers can tell a dead control
//! channel from a broken scene:
//!
//! - [`ConnectionError`] - connect attempt failures (never retried)
//! - [`SceneError`] - engine scene create/attach/resize/destroy failures
//! - [`ResourceLoadError`] - resource pack fetch/decode/load failures
//! - [`TickError`] - per-frame engine failures, potentially self-recovering
//! - [`ChannelError`] - control command send failures
//! - [`MonitorError`] - umbrella type returned by [`LiveMonitor`](crate::LiveMonitor)

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::protocol::PlayerId;

/// Why a connect attempt did not produce a live session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A session is already connecting or connected.
    #[error("Already {0}")]
    AlreadyActive(ConnectionState),
    /// No authentication context was supplied.
    #[error("Missing authentication context")]
    MissingAuth,
    /// The relay could not be reached.
    #[error("Network error: {0}")]
    Network(String),
    /// The relay was reached but rejected or broke the handshake.
    #[error("Handshake error: {0}")]
    Handshake(String),
    /// The attempt was superseded by a disconnect before it finished.
    #[error("Connect attempt aborted by disconnect")]
    Aborted,
}

/// Engine scene operation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The engine could not create the scene.
    #[error("Failed to create scene for player {player}: {detail}")]
    Create {
        /// Player the scene belongs to.
        player: PlayerId,
        /// Engine-provided detail.
        detail: String,
    },
    /// The engine could not bind the drawable surface.
    #[error("Failed to attach surface for player {player}: {detail}")]
    Attach {
        /// Player the scene belongs to.
        player: PlayerId,
        /// Engine-provided detail.
        detail: String,
    },
    /// The engine rejected a resize.
    #[error("Failed to resize scene for player {player}: {detail}")]
    Resize {
        /// Player the scene belongs to.
        player: PlayerId,
        /// Engine-provided detail.
        detail: String,
    },
    /// The engine failed while tearing the scene down.
    #[error("Failed to destroy scene for player {player}: {detail}")]
    Destroy {
        /// Player the scene belongs to.
        player: PlayerId,
        /// Engine-provided detail.
        detail: String,
    },
}

/// Resource pack failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceLoadError {
    /// Downloading an asset failed.
    #[error("Failed to fetch {asset}: {detail}")]
    Fetch {
        /// Asset file name.
        asset: String,
        /// Transport or status detail.
        detail: String,
    },
    /// An asset was fetched but its contents are unusable.
    #[error("Failed to decode {asset}: {detail}")]
    Decode {
        /// Asset file name.
        asset: String,
        /// Decoder detail.
        detail: String,
    },
    /// The engine failed to load the pack into a scene.
    #[error("Engine failed to load resource pack for player {player}: {detail}")]
    Engine {
        /// Player the scene belongs to.
        player: PlayerId,
        /// Engine-provided detail.
        detail: String,
    },
}

/// A failed engine tick. Swallowed by the scheduler with throttled logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Tick failed: {0}")]
pub struct TickError(pub String);

/// Control command send failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Failed to send a command.
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// The channel was already closed.
    #[error("Channel closed")]
    Closed,
}

/// Room id validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid room id {id:?}: {reason}")]
pub struct InvalidRoomId {
    /// The rejected input.
    pub id: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Errors returned by [`LiveMonitor`](crate::LiveMonitor) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// The operation needs a connected session.
    #[error("Not connected")]
    NotConnected,
    /// A live scene already exists for this player.
    #[error("Scene for player {0} already exists")]
    DuplicateScene(PlayerId),
    /// Connect failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Scene failure.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Resource failure.
    #[error(transparent)]
    Resource(#[from] ResourceLoadError),
    /// Channel failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Room id failure.
    #[error(transparent)]
    InvalidRoomId(#[from] InvalidRoomId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        assert_eq!(
            ConnectionError::AlreadyActive(ConnectionState::Connecting).to_string(),
            "Already connecting"
        );
        assert_eq!(
            ConnectionError::Network("refused".into()).to_string(),
            "Network error: refused"
        );
    }

    #[test]
    fn test_monitor_error_is_transparent() {
        let err: MonitorError = SceneError::Create {
            player: 7,
            detail: "no gl".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Failed to create scene for player 7: no gl");
    }
}
