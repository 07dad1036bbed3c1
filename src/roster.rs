//! Room membership derived from typed control-channel events.
//!
//! The tracker never talks to the channel. It consumes [`RoomEvent`]s and
//! reports which scenes must be destroyed as a consequence, leaving the
//! orchestrator to perform the teardown.
//!
//! | Event            | Roster effect              | Scenes destroyed |
//! |------------------|----------------------------|------------------|
//! | `room_joined`    | reset to empty             | none             |
//! | `user_joined`    | append if id not present   | none             |
//! | `user_left`      | remove by id               | that player's    |
//! | `room_left`      | reset to empty             | all              |
//! | `join_failed`    | reset, pending join clear  | none             |
//! | `chart_selected` | none (chart recorded)      | none             |
//! | `state_changed`  | none (phase recorded)      | none             |

use serde::Serialize;

use crate::protocol::{PlayerId, RoomEvent, RoomId, RoomPhase};

/// One member of the joined room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomUser {
    /// Player id, unique within the roster.
    pub id: PlayerId,
    /// Display name.
    pub display_name: String,
    /// Whether the player's gameplay can be monitored.
    pub monitorable: bool,
}

/// Insertion-ordered set of [`RoomUser`], unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoomRoster {
    users: Vec<RoomUser>,
}

impl RoomRoster {
    /// Append `user` unless its id is already present. Returns whether it was added.
    pub fn insert(&mut self, user: RoomUser) -> bool {
        if self.contains(user.id) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Remove by id.
    pub fn remove(&mut self, id: PlayerId) -> Option<RoomUser> {
        let index = self.users.iter().position(|u| u.id == id)?;
        Some(self.users.remove(index))
    }

    /// True if `id` is a member.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    /// Look up a member.
    pub fn get(&self, id: PlayerId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Members in arrival order.
    pub fn users(&self) -> &[RoomUser] {
        &self.users
    }

    /// Ids of monitorable members in arrival order.
    pub fn monitorable_ids(&self) -> Vec<PlayerId> {
        self.users
            .iter()
            .filter(|u| u.monitorable)
            .map(|u| u.id)
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

/// Scene teardown required by an applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEffect {
    /// Nothing to tear down.
    None,
    /// Destroy the scene for one player, if any.
    Destroy(PlayerId),
    /// Destroy every scene.
    DestroyAll,
}

/// Room snapshot for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    /// Room requested by the last join.
    pub room_id: Option<RoomId>,
    /// True once the relay acknowledged the join.
    pub joined: bool,
    /// Chart selected by the host.
    pub chart_id: Option<i32>,
    /// Current match phase.
    pub phase: Option<RoomPhase>,
}

/// Roster plus room-level state.
#[derive(Debug, Default)]
pub struct RoomRosterTracker {
    roster: RoomRoster,
    info: RoomInfo,
}

impl RoomRosterTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join request. The roster itself is untouched until acknowledged.
    pub fn request_join(&mut self, room_id: RoomId) {
        self.info.room_id = Some(room_id);
        self.info.joined = false;
    }

    /// Apply one inbound event.
    pub fn apply(&mut self, event: &RoomEvent) -> SceneEffect {
        match event {
            RoomEvent::RoomJoined { count } => {
                log::debug!("Room joined with {count} member(s)");
                self.roster.clear();
                self.info.joined = true;
                self.info.chart_id = None;
                self.info.phase = None;
                SceneEffect::None
            }
            RoomEvent::UserJoined {
                id,
                name,
                monitorable,
            } => {
                let added = self.roster.insert(RoomUser {
                    id: *id,
                    display_name: name.clone(),
                    monitorable: *monitorable,
                });
                if !added {
                    log::debug!("Duplicate user_joined for {id} ignored");
                }
                SceneEffect::None
            }
            RoomEvent::UserLeft { id } => {
                self.roster.remove(*id);
                SceneEffect::Destroy(*id)
            }
            RoomEvent::RoomLeft => {
                self.reset();
                SceneEffect::DestroyAll
            }
            RoomEvent::JoinFailed { .. } => {
                self.reset();
                SceneEffect::None
            }
            RoomEvent::ChartSelected { chart_id } => {
                self.info.chart_id = Some(*chart_id);
                SceneEffect::None
            }
            RoomEvent::StateChanged { state } => {
                self.info.phase = Some(*state);
                SceneEffect::None
            }
        }
    }

    /// Forget the roster and every piece of room state.
    pub fn reset(&mut self) {
        self.roster.clear();
        self.info = RoomInfo::default();
    }

    /// Current roster.
    pub fn roster(&self) -> &RoomRoster {
        &self.roster
    }

    /// Current room info.
    pub fn info(&self) -> &RoomInfo {
        &self.info
    }
}
