// SPDX-License-Identifier: Apache-2.0
//! Bit-exact wire codec for the lockstep core's ~20 player-action and
//! sync-protocol event kinds.
//!
//! Every event is a 7-byte header (kind tag, frame, origin peer, peer
//! metadata) followed by a kind-specific payload whose length is a
//! contractual constant — see [`EventKind::payload_len`]. `encode` and
//! `decode` round-trip exactly; decoders never panic on malformed input,
//! returning [`EventError`] instead.

mod error;
mod event;
mod header;
mod kind;

pub use error::EventError;
pub use event::{Event, EventBody};
pub use header::{EventHeader, HEADER_LEN};
pub use kind::EventKind;
