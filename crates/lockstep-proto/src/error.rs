// SPDX-License-Identifier: Apache-2.0
//! Protocol-level decode errors.

use thiserror::Error;

/// Errors raised while encoding or decoding a [`crate::Packet`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The envelope's version byte does not match this build's
    /// [`crate::PROTOCOL_VERSION`]. Per the wire contract this rejects
    /// the whole packet rather than attempting a partial decode.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// This build's version.
        expected: u8,
        /// The version the envelope actually carried.
        got: u8,
    },
    /// The envelope's kind tag is outside the closed [`crate::PacketKind`] set.
    #[error("unknown packet kind tag {0}")]
    UnknownKind(u8),
    /// Fewer than 4 bytes are available for the envelope.
    #[error("incomplete envelope: need {needed} bytes, got {got}")]
    IncompleteEnvelope {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        got: usize,
    },
    /// Fewer bytes remain than the envelope's declared body length.
    #[error("truncated packet body: need {needed} bytes, got {got}")]
    TruncatedBody {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        got: usize,
    },
    /// CBOR encode/decode failure on a lobby or connection payload.
    #[error("cbor codec error: {0}")]
    Cbor(String),
    /// The fixed-offset FRAME_DATA/SYNC_CHECK body was malformed.
    #[error("malformed game-sync payload: {0}")]
    MalformedGameSync(&'static str),
    /// An embedded event failed to decode.
    #[error("event codec error: {0}")]
    Event(#[from] lockstep_event::EventError),
    /// An encoded packet body exceeds [`crate::MAX_BODY_LEN`].
    #[error("packet body of {got} bytes exceeds the {max}-byte cap")]
    BodyTooLarge {
        /// The body's actual length.
        got: usize,
        /// [`crate::MAX_BODY_LEN`].
        max: usize,
    },
}
