// SPDX-License-Identifier: Apache-2.0
//! Decode errors. Every variant here is recoverable — the scheduler and
//! transport layers treat a bad event as a protocol violation on the
//! connection it arrived on, never as a reason to panic.

use thiserror::Error;

/// Errors raised while decoding an [`crate::Event`] from wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    /// Fewer than [`crate::header::HEADER_LEN`] bytes remain.
    #[error("incomplete event header: need {needed} bytes, got {got}")]
    IncompleteHeader {
        /// Bytes required for the header.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },
    /// The header's kind tag is outside the closed [`crate::EventKind`] set.
    #[error("unknown event kind tag {0}")]
    UnknownKind(u8),
    /// Fewer bytes remain than the kind's contractual payload length.
    #[error("truncated event payload: need {needed} bytes, got {got}")]
    TruncatedPayload {
        /// Bytes required for this kind's payload.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },
}
