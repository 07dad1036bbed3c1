//! Typed control-channel protocol.
//!
//! The relay speaks JSON text frames on the live WebSocket. Commands flow
//! from the monitor to the relay, room events flow back. Every frame is an
//! internally tagged object:
//!
//! ```text
//! monitor → relay   {"type":"join_room","room_id":"lobby-1"}
//!                   {"type":"leave_room"}
//!
//! relay → monitor   {"type":"room_joined","count":2}
//!                   {"type":"user_joined","id":1,"name":"A","monitorable":true}
//!                   {"type":"user_left","id":1}
//!                   {"type":"room_left"}
//!                   {"type":"join_failed","reason":"room not found"}
//!                   {"type":"chart_selected","chart_id":42}
//!                   {"type":"state_changed","state":"playing"}
//! ```

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};

use crate::constants::ROOM_ID_MAX_LEN;
use crate::error::InvalidRoomId;

/// Server-assigned player id.
pub type PlayerId = i32;

/// Identifier correlating a scene to one drawable surface instance.
///
/// Allocated from a monotonic counter and never reused.
pub type RenderTargetId = u64;

/// Validated room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validate and wrap a room id.
    ///
    /// Room ids are 1 to 20 characters of ASCII letters, digits, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidRoomId> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("empty")
        } else if id.chars().count() > ROOM_ID_MAX_LEN {
            Some("longer than 20 characters")
        } else if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Some("only ASCII letters, digits, '-' and '_' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidRoomId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = InvalidRoomId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phase of the room's match flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Host is choosing a chart.
    SelectChart,
    /// Chart chosen, players are loading it.
    WaitingForReady,
    /// Match in progress.
    Playing,
}

/// Command sent from the monitor to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Start spectating a room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },
    /// Stop spectating the current room.
    LeaveRoom,
}

/// Event received from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Join acknowledged. Members follow as individual `UserJoined` events.
    RoomJoined {
        /// Number of members at join time.
        count: usize,
    },
    /// A member is present in (or entered) the room.
    UserJoined {
        /// Player id.
        id: PlayerId,
        /// Display name.
        name: String,
        /// Whether the player streams gameplay that can be monitored.
        monitorable: bool,
    },
    /// A member left the room.
    UserLeft {
        /// Player id.
        id: PlayerId,
    },
    /// Leave acknowledged (or the relay removed us from the room).
    RoomLeft,
    /// The relay rejected the join request.
    JoinFailed {
        /// Human-readable reason.
        reason: String,
    },
    /// The host selected a chart.
    ChartSelected {
        /// Chart id.
        chart_id: i32,
    },
    /// The room moved to another phase.
    StateChanged {
        /// New phase.
        state: RoomPhase,
    },
}

impl RoomEvent {
    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl ControlCommand {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
