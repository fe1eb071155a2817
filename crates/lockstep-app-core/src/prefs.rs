// SPDX-License-Identifier: Apache-2.0
//! Host-local preferences for the hosting daemon. Never replicated and
//! never folded into the deterministic state hash — a player can change
//! their own bind address without desyncing anyone.

use lockstep_session::GameOptions;
use serde::{Deserialize, Serialize};

/// Key under which [`HostPrefs`] is stored by a `ConfigService`.
pub const HOST_PREFS_KEY: &str = "host_prefs";

/// Persisted host configuration: where to listen, how fast to simulate,
/// and what a freshly created lobby defaults its options to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPrefs {
    /// Address (`host:port`) the reliable transport listens on.
    pub bind_address: String,
    /// Simulation frame rate in Hz.
    pub frame_rate: u32,
    /// The `GameOptions` a new lobby is seeded with.
    pub default_game_options: GameOptions,
}

impl Default for HostPrefs {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7777".to_string(),
            frame_rate: 20,
            default_game_options: GameOptions::default(),
        }
    }
}
