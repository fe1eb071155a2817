// SPDX-License-Identifier: Apache-2.0
//! Packet envelope and codecs for the lockstep multiplayer core's wire
//! protocol.
//!
//! Every packet is a 4-byte envelope (`version`, `kind`, `length_lo`,
//! `length_hi` — a little-endian `u16` body length split across the last
//! two bytes) followed by a body whose shape depends on `kind`:
//!
//! - Connection and lobby packets (HELLO..CANCEL_COUNTDOWN, GAME_START)
//!   are off the hot per-frame path and carry variable-shaped data, so
//!   their bodies are `serde` + `ciborium` — see [`payloads`].
//! - FRAME_DATA and SYNC_CHECK are on the hot per-frame path with a
//!   fixed, bit-contractual layout, so they use the hand-rolled codec in
//!   [`wire`] instead.
//!
//! A version mismatch rejects the whole packet; an unknown kind tag is
//! reported so the caller can log and skip it rather than close the
//! connection (the envelope alone doesn't know whether a future kind is
//! safe to ignore).

mod error;
mod payloads;
pub mod wire;

pub use error::ProtocolError;
pub use payloads::{
    CancelCountdownPayload, ChatMessagePayload, DesyncDetectedPayload, GameSettingsPayload,
    GameStartPayload, HelloPayload, LobbyStatePayload, PlayerJoinPayload, PlayerLeavePayload,
    PlayerReadyPayload, RejectPayload, StartCountdownPayload, WelcomePayload,
};
pub use wire::{FrameDataPayload, SyncCheckPayload};

/// This build's wire protocol version, carried in every envelope.
pub const PROTOCOL_VERSION: u8 = 1;

/// Length of the envelope itself, ahead of the body.
pub const ENVELOPE_LEN: usize = 4;

/// Largest reliable-channel frame (envelope + body together) the
/// transport will admit; see `lockstep_net`. An oversized frame is a
/// protocol violation there, not decoded at all.
pub const MAX_FRAME_LEN: usize = 4096;

/// Largest body a single packet may carry, derived from [`MAX_FRAME_LEN`]
/// by subtracting the envelope.
pub const MAX_BODY_LEN: usize = MAX_FRAME_LEN - ENVELOPE_LEN;

/// The closed set of packet kinds, tagged by a single wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Peer announces itself before being assigned an id.
    Hello = 0,
    /// Host accepts a connection and assigns a peer id.
    Welcome = 1,
    /// Host refuses a connection.
    Reject = 2,
    /// Full lobby snapshot.
    LobbyState = 3,
    /// A peer joined the roster.
    PlayerJoin = 4,
    /// A peer left the roster.
    PlayerLeave = 5,
    /// Lobby or in-game text chat.
    ChatMessage = 6,
    /// A peer's ready flag changed.
    PlayerReady = 7,
    /// The host changed game options.
    GameSettings = 8,
    /// Host begins the pre-game countdown.
    StartCountdown = 9,
    /// Host aborts an in-progress countdown.
    CancelCountdown = 10,
    /// The game is starting.
    GameStart = 11,
    /// One peer's commands for one frame.
    FrameData = 12,
    /// One peer's folded state hash for one sync frame.
    SyncCheck = 13,
    /// A state-hash mismatch was detected.
    DesyncDetected = 14,
}

impl PacketKind {
    /// Decode a wire tag, returning `None` for tags outside the closed set.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PacketKind::Hello),
            1 => Some(PacketKind::Welcome),
            2 => Some(PacketKind::Reject),
            3 => Some(PacketKind::LobbyState),
            4 => Some(PacketKind::PlayerJoin),
            5 => Some(PacketKind::PlayerLeave),
            6 => Some(PacketKind::ChatMessage),
            7 => Some(PacketKind::PlayerReady),
            8 => Some(PacketKind::GameSettings),
            9 => Some(PacketKind::StartCountdown),
            10 => Some(PacketKind::CancelCountdown),
            11 => Some(PacketKind::GameStart),
            12 => Some(PacketKind::FrameData),
            13 => Some(PacketKind::SyncCheck),
            14 => Some(PacketKind::DesyncDetected),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// A decoded packet: kind-tagged envelope plus its body.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// HELLO.
    Hello(HelloPayload),
    /// WELCOME.
    Welcome(WelcomePayload),
    /// REJECT.
    Reject(RejectPayload),
    /// LOBBY_STATE.
    LobbyState(LobbyStatePayload),
    /// PLAYER_JOIN.
    PlayerJoin(PlayerJoinPayload),
    /// PLAYER_LEAVE.
    PlayerLeave(PlayerLeavePayload),
    /// CHAT_MESSAGE.
    ChatMessage(ChatMessagePayload),
    /// PLAYER_READY.
    PlayerReady(PlayerReadyPayload),
    /// GAME_SETTINGS.
    GameSettings(GameSettingsPayload),
    /// START_COUNTDOWN.
    StartCountdown(StartCountdownPayload),
    /// CANCEL_COUNTDOWN.
    CancelCountdown,
    /// GAME_START.
    GameStart(GameStartPayload),
    /// FRAME_DATA.
    FrameData(FrameDataPayload),
    /// SYNC_CHECK.
    SyncCheck(SyncCheckPayload),
    /// DESYNC_DETECTED.
    DesyncDetected(DesyncDetectedPayload),
}

fn to_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|err| ProtocolError::Cbor(err.to_string()))?;
    Ok(out)
}

fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    ciborium::de::from_reader(bytes).map_err(|err| ProtocolError::Cbor(err.to_string()))
}

impl Packet {
    /// The [`PacketKind`] this packet carries.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Packet::Hello(_) => PacketKind::Hello,
            Packet::Welcome(_) => PacketKind::Welcome,
            Packet::Reject(_) => PacketKind::Reject,
            Packet::LobbyState(_) => PacketKind::LobbyState,
            Packet::PlayerJoin(_) => PacketKind::PlayerJoin,
            Packet::PlayerLeave(_) => PacketKind::PlayerLeave,
            Packet::ChatMessage(_) => PacketKind::ChatMessage,
            Packet::PlayerReady(_) => PacketKind::PlayerReady,
            Packet::GameSettings(_) => PacketKind::GameSettings,
            Packet::StartCountdown(_) => PacketKind::StartCountdown,
            Packet::CancelCountdown => PacketKind::CancelCountdown,
            Packet::GameStart(_) => PacketKind::GameStart,
            Packet::FrameData(_) => PacketKind::FrameData,
            Packet::SyncCheck(_) => PacketKind::SyncCheck,
            Packet::DesyncDetected(_) => PacketKind::DesyncDetected,
        }
    }

    /// Encode this packet to its exact wire representation: the 4-byte
    /// envelope followed by the kind-appropriate body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Cbor`] if a lobby/connection payload
    /// fails to serialize, [`ProtocolError::MalformedGameSync`] if a
    /// FRAME_DATA body carries more than `u16::MAX` commands, or
    /// [`ProtocolError::BodyTooLarge`] if the encoded body would exceed
    /// [`MAX_BODY_LEN`] (a large roster or chat message, for instance,
    /// has no other structural cap).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut body = Vec::new();
        match self {
            Packet::Hello(p) => body = to_cbor(p)?,
            Packet::Welcome(p) => body = to_cbor(p)?,
            Packet::Reject(p) => body = to_cbor(p)?,
            Packet::LobbyState(p) => body = to_cbor(p)?,
            Packet::PlayerJoin(p) => body = to_cbor(p)?,
            Packet::PlayerLeave(p) => body = to_cbor(p)?,
            Packet::ChatMessage(p) => body = to_cbor(p)?,
            Packet::PlayerReady(p) => body = to_cbor(p)?,
            Packet::GameSettings(p) => body = to_cbor(p)?,
            Packet::StartCountdown(p) => body = to_cbor(p)?,
            Packet::CancelCountdown => body = to_cbor(&CancelCountdownPayload)?,
            Packet::GameStart(p) => body = to_cbor(p)?,
            Packet::FrameData(p) => p.encode(&mut body)?,
            Packet::SyncCheck(p) => p.encode(&mut body),
            Packet::DesyncDetected(p) => body = to_cbor(p)?,
        }

        if body.len() > MAX_BODY_LEN {
            return Err(ProtocolError::BodyTooLarge { got: body.len(), max: MAX_BODY_LEN });
        }
        let body_len = u16::try_from(body.len())
            .map_err(|_| ProtocolError::MalformedGameSync("packet body exceeds u16::MAX bytes"))?;
        let mut out = Vec::with_capacity(ENVELOPE_LEN + body.len());
        out.push(PROTOCOL_VERSION);
        out.push(self.kind().tag());
        out.push((body_len & 0xFF) as u8);
        out.push((body_len >> 8) as u8);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode one packet starting at `bytes[0]`, returning the packet and
    /// the number of bytes consumed so callers can advance into a stream
    /// of back-to-back packets.
    ///
    /// # Errors
    ///
    /// See [`ProtocolError`]: version mismatch, unknown kind, incomplete
    /// envelope/body, or a malformed payload.
    pub fn decode(bytes: &[u8]) -> Result<(Packet, usize), ProtocolError> {
        if bytes.len() < ENVELOPE_LEN {
            return Err(ProtocolError::IncompleteEnvelope { needed: ENVELOPE_LEN, got: bytes.len() });
        }
        let version = bytes[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch { expected: PROTOCOL_VERSION, got: version });
        }
        let kind_tag = bytes[1];
        let kind = PacketKind::from_tag(kind_tag).ok_or(ProtocolError::UnknownKind(kind_tag))?;
        let body_len = (bytes[2] as u16 | ((bytes[3] as u16) << 8)) as usize;
        let total_len = ENVELOPE_LEN + body_len;
        if bytes.len() < total_len {
            return Err(ProtocolError::TruncatedBody { needed: total_len, got: bytes.len() });
        }
        let body = &bytes[ENVELOPE_LEN..total_len];

        let packet = match kind {
            PacketKind::Hello => Packet::Hello(from_cbor(body)?),
            PacketKind::Welcome => Packet::Welcome(from_cbor(body)?),
            PacketKind::Reject => Packet::Reject(from_cbor(body)?),
            PacketKind::LobbyState => Packet::LobbyState(from_cbor(body)?),
            PacketKind::PlayerJoin => Packet::PlayerJoin(from_cbor(body)?),
            PacketKind::PlayerLeave => Packet::PlayerLeave(from_cbor(body)?),
            PacketKind::ChatMessage => Packet::ChatMessage(from_cbor(body)?),
            PacketKind::PlayerReady => Packet::PlayerReady(from_cbor(body)?),
            PacketKind::GameSettings => Packet::GameSettings(from_cbor(body)?),
            PacketKind::StartCountdown => Packet::StartCountdown(from_cbor(body)?),
            PacketKind::CancelCountdown => Packet::CancelCountdown,
            PacketKind::GameStart => Packet::GameStart(from_cbor(body)?),
            PacketKind::FrameData => Packet::FrameData(FrameDataPayload::decode(body)?),
            PacketKind::SyncCheck => Packet::SyncCheck(SyncCheckPayload::decode(body)?),
            PacketKind::DesyncDetected => Packet::DesyncDetected(from_cbor(body)?),
        };
        Ok((packet, total_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let packet = Packet::Hello(HelloPayload { name: "Kane".into(), client_version: 3 });
        let bytes = packet.encode().unwrap();
        let (decoded, consumed) = Packet::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, packet);
    }

    #[test]
    fn cancel_countdown_has_an_empty_cbor_body_and_round_trips() {
        let packet = Packet::CancelCountdown;
        let bytes = packet.encode().unwrap();
        let (decoded, _) = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn sync_check_round_trips_through_the_full_envelope() {
        let packet = Packet::SyncCheck(SyncCheckPayload { frame: 30, crc: 0x1234_5678 });
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), ENVELOPE_LEN + 8);
        let (decoded, consumed) = Packet::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, packet);
    }

    #[test]
    fn version_mismatch_is_reported_not_panicked() {
        let packet = Packet::CancelCountdown;
        let mut bytes = packet.encode().unwrap();
        bytes[0] = PROTOCOL_VERSION + 1;
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::VersionMismatch { .. }));
    }

    #[test]
    fn unknown_kind_tag_is_reported_not_panicked() {
        let packet = Packet::CancelCountdown;
        let mut bytes = packet.encode().unwrap();
        bytes[1] = 200;
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(200)));
    }

    #[test]
    fn truncated_body_is_reported_not_panicked() {
        let packet = Packet::SyncCheck(SyncCheckPayload { frame: 1, crc: 2 });
        let bytes = packet.encode().unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        let err = Packet::decode(truncated).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedBody { .. }));
    }

    #[test]
    fn back_to_back_packets_decode_independently() {
        let first = Packet::CancelCountdown;
        let second = Packet::SyncCheck(SyncCheckPayload { frame: 1, crc: 2 });
        let mut stream = first.encode().unwrap();
        stream.extend_from_slice(&second.encode().unwrap());

        let (decoded_first, consumed_first) = Packet::decode(&stream).unwrap();
        assert_eq!(decoded_first, first);
        let (decoded_second, consumed_second) = Packet::decode(&stream[consumed_first..]).unwrap();
        assert_eq!(decoded_second, second);
        assert_eq!(consumed_first + consumed_second, stream.len());
    }

    #[test]
    fn an_oversized_body_is_rejected_at_encode_time() {
        let packet = Packet::ChatMessage(ChatMessagePayload {
            peer_id: 0,
            text: "x".repeat(MAX_BODY_LEN + 1),
        });
        let err = packet.encode().unwrap_err();
        assert!(matches!(err, ProtocolError::BodyTooLarge { .. }));
    }
}
