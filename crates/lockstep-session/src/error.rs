// SPDX-License-Identifier: Apache-2.0
//! Errors raised by session-state operations.

use thiserror::Error;

/// Errors raised while mutating or querying a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A non-host peer attempted a host-only operation (changing options,
    /// starting the countdown).
    #[error("peer {0} is not the host")]
    NotHost(u8),
    /// `set_option` was called with a key outside the fixed schema.
    #[error("unknown game option key: {0}")]
    UnknownOption(String),
    /// A game option value was the wrong shape for its key (e.g. game
    /// speed outside 1..=6).
    #[error("invalid value for game option {key}: {reason}")]
    InvalidOptionValue {
        /// The option key.
        key: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// The roster is already at its fixed capacity.
    #[error("roster is full (capacity {0})")]
    RosterFull(usize),
    /// Referenced a peer id not present in the roster.
    #[error("unknown peer id {0}")]
    UnknownPeer(u8),
}
