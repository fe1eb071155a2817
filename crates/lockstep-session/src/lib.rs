// SPDX-License-Identifier: Apache-2.0
//! Session-level configuration and peer roster for the lockstep
//! multiplayer core.
//!
//! A [`Session`] is host-local state: game options, scenario choice, and
//! who's in the lobby. It carries no frame-by-frame simulation data (that
//! is [`lockstep_sched::Scheduler`]'s job) and none of its fields enter
//! the convergence hash — two peers can (and do) hold slightly
//! out-of-sync rosters for a few packets without any risk of desync.
//!
//! Host-only mutations (`set_option`, `add_peer` acting on the host's
//! behalf) are queued as [`SessionEvent`]s via [`Session::take_pending`]
//! for the caller to broadcast as GAME_SETTINGS/PLAYER_JOIN/... packets;
//! this crate has no transport dependency of its own.

mod error;
mod options;
mod roster;

pub use error::SessionError;
pub use options::{GameOptions, OptionValue};
pub use roster::{RosterEntry, MAX_NAME_LEN, MAX_PEERS};

use std::collections::{BTreeMap, VecDeque};

/// The kind of game a session describes. Closed set: adding a mode is a
/// protocol change, same as an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum GameType {
    /// Player(s) vs. AI skirmish.
    Skirmish = 0,
    /// Human-vs-human multiplayer.
    Multiplayer = 1,
    /// Scripted campaign mission.
    Campaign = 2,
}

impl GameType {
    /// The wire tag for this game type, as carried in a LOBBY_STATE packet.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag, returning `None` for tags outside the closed set.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(GameType::Skirmish),
            1 => Some(GameType::Multiplayer),
            2 => Some(GameType::Campaign),
            _ => None,
        }
    }
}

/// A change to session state that the host must broadcast. The session
/// itself never touches a socket; it only records what needs to go out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A peer joined the roster.
    PeerJoined(RosterEntry),
    /// A peer left the roster.
    PeerLeft(u8),
    /// A peer's ready flag changed.
    ReadyChanged {
        /// The peer whose ready flag changed.
        peer_id: u8,
        /// The new ready state.
        ready: bool,
    },
    /// The game options changed; carries the full record since peers
    /// apply it atomically rather than patching individual fields.
    OptionsChanged(GameOptions),
}

/// Session-level configuration and peer roster.
#[derive(Debug, Clone)]
pub struct Session {
    /// 31-bit session identifier, unique enough to disambiguate
    /// simultaneous LAN advertisements. Has no bearing on determinism.
    session_id: u32,
    game_type: GameType,
    scenario_id: u32,
    host_peer: u8,
    local_peer: u8,
    options: GameOptions,
    roster: BTreeMap<u8, RosterEntry>,
    pending: VecDeque<SessionEvent>,
}

/// Mask applied to a raw session id so it always fits 31 bits.
const SESSION_ID_MASK: u32 = (1 << 31) - 1;

impl Session {
    /// Start a new session. `raw_session_id` is masked to 31 bits;
    /// callers typically derive it by mixing wall-clock time with a
    /// random component (see `DESIGN.md`).
    #[must_use]
    pub fn new(
        raw_session_id: u32,
        game_type: GameType,
        scenario_id: u32,
        host_peer: u8,
        local_peer: u8,
    ) -> Self {
        Self {
            session_id: raw_session_id & SESSION_ID_MASK,
            game_type,
            scenario_id,
            host_peer,
            local_peer,
            options: GameOptions::default(),
            roster: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// This session's 31-bit identifier.
    #[must_use]
    pub const fn session_id(&self) -> u32 {
        self.session_id
    }

    /// The configured game type.
    #[must_use]
    pub const fn game_type(&self) -> GameType {
        self.game_type
    }

    /// The selected scenario identifier.
    #[must_use]
    pub const fn scenario_id(&self) -> u32 {
        self.scenario_id
    }

    /// `true` when the local peer is the session host.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        self.local_peer == self.host_peer
    }

    /// The current game options.
    #[must_use]
    pub const fn options(&self) -> &GameOptions {
        &self.options
    }

    /// The peer roster, in ascending peer-id order.
    pub fn roster(&self) -> impl Iterator<Item = &RosterEntry> {
        self.roster.values()
    }

    /// Look up a single roster entry.
    #[must_use]
    pub fn peer(&self, peer_id: u8) -> Option<&RosterEntry> {
        self.roster.get(&peer_id)
    }

    /// Add a peer to the roster, queuing a [`SessionEvent::PeerJoined`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RosterFull`] once [`MAX_PEERS`] entries are
    /// held.
    pub fn add_peer(&mut self, entry: RosterEntry) -> Result<(), SessionError> {
        if self.roster.len() >= MAX_PEERS && !self.roster.contains_key(&entry.peer_id) {
            return Err(SessionError::RosterFull(MAX_PEERS));
        }
        tracing::info!(peer = entry.peer_id, name = %entry.name, "peer joined session");
        self.pending.push_back(SessionEvent::PeerJoined(entry.clone()));
        self.roster.insert(entry.peer_id, entry);
        Ok(())
    }

    /// Remove a peer from the roster, queuing a [`SessionEvent::PeerLeft`].
    pub fn remove_peer(&mut self, peer_id: u8) {
        if self.roster.remove(&peer_id).is_some() {
            tracing::info!(peer = peer_id, "peer left session");
            self.pending.push_back(SessionEvent::PeerLeft(peer_id));
        }
    }

    /// Set a peer's ready flag.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownPeer`] if `peer_id` is not on the
    /// roster.
    pub fn set_ready(&mut self, peer_id: u8, ready: bool) -> Result<(), SessionError> {
        let entry = self
            .roster
            .get_mut(&peer_id)
            .ok_or(SessionError::UnknownPeer(peer_id))?;
        entry.ready = ready;
        self.pending.push_back(SessionEvent::ReadyChanged { peer_id, ready });
        Ok(())
    }

    /// Record that `peer_id` was just heard from, for timeout bookkeeping
    /// that lives above this crate (the transport layer).
    pub fn mark_heard(&mut self, peer_id: u8, now_ms: u64) {
        if let Some(entry) = self.roster.get_mut(&peer_id) {
            entry.last_heard_ms = now_ms;
        }
    }

    /// `true` once every roster entry has signaled ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        !self.roster.is_empty() && self.roster.values().all(|p| p.ready)
    }

    /// Change one game option. Host-only: non-host callers get
    /// [`SessionError::NotHost`]. On success, queues a
    /// [`SessionEvent::OptionsChanged`] carrying the full updated record.
    ///
    /// # Errors
    ///
    /// See [`SessionError`]: not-host, unknown key, or invalid value.
    pub fn set_option(&mut self, key: &str, value: OptionValue) -> Result<(), SessionError> {
        if !self.is_host() {
            return Err(SessionError::NotHost(self.local_peer));
        }
        self.options.apply(key, value)?;
        tracing::debug!(key, "game option changed");
        self.pending.push_back(SessionEvent::OptionsChanged(self.options));
        Ok(())
    }

    /// Apply a full options record received from the host, atomically.
    /// Non-host peers call this on GAME_SETTINGS receipt; it never fails
    /// and never queues a broadcast (the host already broadcast it).
    pub fn apply_remote_options(&mut self, options: GameOptions) {
        self.options = options;
    }

    /// Drain session events queued for broadcast since the last call.
    pub fn take_pending(&mut self) -> Vec<SessionEvent> {
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u8) -> RosterEntry {
        RosterEntry::new(id, "P", 0, id)
    }

    #[test]
    fn session_id_is_masked_to_thirty_one_bits() {
        let session = Session::new(u32::MAX, GameType::Skirmish, 1, 0, 0);
        assert!(session.session_id() <= SESSION_ID_MASK);
    }

    #[test]
    fn non_host_cannot_set_options() {
        let mut session = Session::new(1, GameType::Skirmish, 1, 0, 1);
        assert!(!session.is_host());
        let err = session
            .set_option("credits", OptionValue::U32(1))
            .unwrap_err();
        assert_eq!(err, SessionError::NotHost(1));
    }

    #[test]
    fn host_option_change_is_queued_for_broadcast() {
        let mut session = Session::new(1, GameType::Skirmish, 1, 0, 0);
        session.set_option("credits", OptionValue::U32(2_000)).unwrap();
        assert_eq!(session.options().credits, 2_000);
        let pending = session.take_pending();
        assert_eq!(pending.len(), 1);
        assert!(matches!(&pending[0], SessionEvent::OptionsChanged(opts) if opts.credits == 2_000));
    }

    #[test]
    fn roster_rejects_beyond_max_peers() {
        let mut session = Session::new(1, GameType::Multiplayer, 1, 0, 0);
        for id in 0..MAX_PEERS as u8 {
            session.add_peer(entry(id)).unwrap();
        }
        let err = session.add_peer(entry(MAX_PEERS as u8)).unwrap_err();
        assert_eq!(err, SessionError::RosterFull(MAX_PEERS));
    }

    #[test]
    fn all_ready_requires_a_nonempty_roster() {
        let mut session = Session::new(1, GameType::Multiplayer, 1, 0, 0);
        assert!(!session.all_ready());
        session.add_peer(entry(0)).unwrap();
        session.add_peer(entry(1)).unwrap();
        assert!(!session.all_ready());
        session.set_ready(0, true).unwrap();
        session.set_ready(1, true).unwrap();
        assert!(session.all_ready());
    }

    #[test]
    fn removing_then_readding_a_peer_is_not_blocked_by_capacity() {
        let mut session = Session::new(1, GameType::Skirmish, 1, 0, 0);
        for id in 0..MAX_PEERS as u8 {
            session.add_peer(entry(id)).unwrap();
        }
        session.remove_peer(0);
        session.add_peer(entry(0)).unwrap();
        assert_eq!(session.roster().count(), MAX_PEERS);
    }

    #[test]
    fn set_ready_on_unknown_peer_errors() {
        let mut session = Session::new(1, GameType::Skirmish, 1, 0, 0);
        assert_eq!(session.set_ready(9, true), Err(SessionError::UnknownPeer(9)));
    }
}
