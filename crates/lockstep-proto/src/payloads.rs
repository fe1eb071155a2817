// SPDX-License-Identifier: Apache-2.0
//! Payload bodies for the lobby/connection packet kinds. These are off
//! the hot per-frame path and variable-shaped, so they ride `serde` +
//! `ciborium` rather than a hand-rolled layout (see `crate::wire` for the
//! FRAME_DATA/SYNC_CHECK kinds, which are the opposite tradeoff).

use lockstep_session::{GameOptions, RosterEntry};
use serde::{Deserialize, Serialize};

/// HELLO: client announces itself before being assigned a peer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Requested display name.
    pub name: String,
    /// Client implementation version (not the wire `version` byte).
    pub client_version: u32,
}

/// WELCOME: host accepts the connection and assigns a peer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomePayload {
    /// The peer id assigned to the new connection.
    pub peer_id: u8,
    /// Current number of peers in the lobby, including the new one.
    pub peer_count: u8,
}

/// REJECT: host refuses the connection (lobby full, version mismatch, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectPayload {
    /// Human-readable reason, shown to the rejected client.
    pub reason: String,
}

/// LOBBY_STATE: full lobby snapshot, sent to a peer on join and whenever
/// a newly-connected client needs to catch up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyStatePayload {
    /// The session's 31-bit id.
    pub session_id: u32,
    /// Wire tag of the session's [`lockstep_session::GameType`].
    pub game_type: u8,
    /// Selected scenario identifier.
    pub scenario_id: u32,
    /// Which peer is host.
    pub host_peer: u8,
    /// Current game options.
    pub options: GameOptions,
    /// Full roster, ascending peer-id order.
    pub roster: Vec<RosterEntry>,
}

/// PLAYER_JOIN: a peer was added to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinPayload {
    /// The joining peer's roster entry.
    pub entry: RosterEntry,
}

/// PLAYER_LEAVE: a peer was removed from the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeavePayload {
    /// The departing peer's id.
    pub peer_id: u8,
}

/// CHAT_MESSAGE: lobby or in-game text chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    /// The sending peer.
    pub peer_id: u8,
    /// Message text, unbounded at this layer (the transport cap bounds
    /// the whole packet).
    pub text: String,
}

/// PLAYER_READY: a peer's ready flag changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReadyPayload {
    /// The peer whose flag changed.
    pub peer_id: u8,
    /// The new ready state.
    pub ready: bool,
}

/// GAME_SETTINGS: the host changed one or more game options; peers apply
/// the full record atomically on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameSettingsPayload {
    /// The full, updated options record.
    pub options: GameOptions,
}

/// START_COUNTDOWN: host begins the pre-game countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCountdownPayload {
    /// Countdown length in seconds.
    pub seconds: u8,
}

/// CANCEL_COUNTDOWN: host aborts an in-progress countdown. Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CancelCountdownPayload;

/// GAME_START: the game is beginning; carries everything a peer needs to
/// seed its simulation before the first scheduled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartPayload {
    /// Shared RNG seed for the simulation.
    pub seed: u32,
    /// Selected scenario identifier.
    pub scenario_id: u32,
    /// Final roster, ascending peer-id order, frozen for the match.
    pub roster: Vec<RosterEntry>,
}

/// DESYNC_DETECTED: informs peers (and any observing UI) which frame and
/// remote peer a state-hash mismatch was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesyncDetectedPayload {
    /// The frame the mismatch was detected at.
    pub frame: u32,
    /// The peer whose hash disagreed with the reporter's.
    pub remote_peer: u8,
}
