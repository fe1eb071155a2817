// SPDX-License-Identifier: Apache-2.0
//! Peer roster entries.

use serde::{Deserialize, Serialize};

/// Maximum number of peers a single session tracks (0..=15, matching the
/// 4-bit origin-peer field carried on every [`lockstep_event::EventHeader`]).
pub const MAX_PEERS: usize = 16;

/// Longest a roster name may be; longer names are truncated on construction.
pub const MAX_NAME_LEN: usize = 12;

/// One peer's entry in the session roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// This peer's id, 0..=15.
    pub peer_id: u8,
    /// Display name, truncated to [`MAX_NAME_LEN`] bytes.
    pub name: String,
    /// Faction/house selection.
    pub faction: u8,
    /// Player color index.
    pub color: u8,
    /// Whether this peer has signaled ready in the lobby.
    pub ready: bool,
    /// Milliseconds since session start at which this peer was last heard
    /// from; host-local bookkeeping, never replicated into the
    /// deterministic simulation.
    pub last_heard_ms: u64,
}

impl RosterEntry {
    /// Build a roster entry, truncating `name` to [`MAX_NAME_LEN`] bytes.
    ///
    /// Truncation happens at a byte boundary; callers passing non-ASCII
    /// names should pre-truncate at a `char` boundary themselves if that
    /// matters to them.
    #[must_use]
    pub fn new(peer_id: u8, name: &str, faction: u8, color: u8) -> Self {
        let mut bytes = name.as_bytes().to_vec();
        bytes.truncate(MAX_NAME_LEN);
        let name = String::from_utf8_lossy(&bytes).into_owned();
        Self {
            peer_id,
            name,
            faction,
            color,
            ready: false,
            last_heard_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_longer_than_twelve_bytes_is_truncated() {
        let entry = RosterEntry::new(0, "AVeryLongCommanderName", 0, 0);
        assert!(entry.name.as_bytes().len() <= MAX_NAME_LEN);
        assert_eq!(entry.name, "AVeryLongCom");
    }

    #[test]
    fn short_name_is_untouched() {
        let entry = RosterEntry::new(1, "GDI", 1, 2);
        assert_eq!(entry.name, "GDI");
        assert!(!entry.ready);
    }
}
