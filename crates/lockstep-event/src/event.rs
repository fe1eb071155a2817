// SPDX-License-Identifier: Apache-2.0
//! The tagged event payload, one variant per [`EventKind`].

use lockstep_ident::TargetHandle;

use crate::error::EventError;
use crate::header::{EventHeader, HEADER_LEN};
use crate::kind::EventKind;

/// A single player-action or sync-protocol record: header plus a
/// kind-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The common header (frame, origin peer, color/faction).
    pub header: EventHeader,
    /// The kind-specific body.
    pub body: EventBody,
}

/// The kind-specific payload of an [`Event`]. Variant names mirror
/// [`EventKind`] exactly; each carries precisely the fields its row in
/// the payload table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBody {
    /// No-op.
    Empty,
    /// Destroy the origin peer's commander house.
    Destruct,
    /// Composite attack-move order.
    MegaMission {
        /// The commanded unit.
        whom: TargetHandle,
        /// Mission identifier understood by the simulation.
        mission: u8,
        /// Target of the attack leg, if any.
        attack_target: u32,
        /// Destination cell for the move leg.
        destination: u32,
    },
    /// Leave the game.
    Exit,
    /// Set idle stance.
    Idle {
        /// The affected unit.
        target: TargetHandle,
    },
    /// Scatter order.
    Scatter {
        /// The affected unit.
        target: TargetHandle,
    },
    /// Deploy order.
    Deploy {
        /// The affected unit.
        target: TargetHandle,
    },
    /// Send to the repair bay.
    Repair {
        /// The affected unit.
        target: TargetHandle,
    },
    /// Sell a structure.
    Sell {
        /// The affected structure.
        target: TargetHandle,
    },
    /// Set a building's primary-factory flag.
    Primary {
        /// The affected structure.
        target: TargetHandle,
    },
    /// Place a structure or unit on the map.
    Place {
        /// Category of the thing being placed.
        kind_tag: u8,
        /// Object type identifier within that category.
        type_id: u8,
        /// Destination map cell.
        cell: u32,
    },
    /// Change a session-wide option bitfield.
    Options {
        /// Raw option flags.
        flags: u32,
    },
    /// Change simulation speed.
    GameSpeed {
        /// New speed value.
        speed: u8,
    },
    /// Queue production.
    Produce {
        /// Category of the thing being produced.
        kind_tag: u8,
        /// Object type identifier within that category.
        type_id: u8,
    },
    /// Suspend production.
    Suspend {
        /// Category of the thing being suspended.
        kind_tag: u8,
        /// Object type identifier within that category.
        type_id: u8,
    },
    /// Abandon production, refunding spent credits.
    Abandon {
        /// Category of the thing being abandoned.
        kind_tag: u8,
        /// Object type identifier within that category.
        type_id: u8,
    },
    /// Place a special ability's effect.
    SpecialPlace {
        /// Which special ability.
        special_id: u16,
        /// Destination map cell.
        cell: u32,
    },
    /// Cosmetic animation spawn.
    Animation {
        /// Animation type.
        anim_type: u8,
        /// Owning peer/house.
        owner: u8,
        /// Map coordinate.
        coord: u32,
        /// Visibility bitmask across houses.
        visibility_mask: u32,
    },
    /// Fire a superweapon/special.
    Special {
        /// Special-specific value (target cell, mode, etc).
        value: u32,
    },
    /// Outgoing periodic sync marker.
    FrameSync {
        /// This peer's folded state hash at `header.frame`.
        crc: u32,
        /// Number of commands this peer submitted for the frame.
        command_count: u16,
        /// This peer's currently configured command delay.
        delay: u8,
    },
    /// Incoming periodic sync marker, as reported by a peer.
    FrameInfo {
        /// The reporting peer's folded state hash.
        crc: u32,
        /// Number of commands the peer submitted for the frame.
        command_count: u16,
        /// The peer's currently configured command delay.
        delay: u8,
    },
    /// Chat text, null-padded to 40 bytes.
    Message([u8; 40]),
    /// Reported round-trip delay.
    ResponseTime {
        /// Delay in frames.
        delay: u8,
    },
    /// Form or break an alliance.
    Ally {
        /// The house being allied with (or un-allied from).
        house_id: u8,
    },
    /// Link two handles (e.g. cargo/transport archival).
    Archive {
        /// First handle.
        a: TargetHandle,
        /// Second handle.
        b: TargetHandle,
    },
    /// Negotiated frame-rate / max-frame-ahead proposal.
    Timing {
        /// Desired frame rate, frames per second.
        desired_frame_rate: u16,
        /// Proposed maximum frames a peer may run ahead.
        max_ahead: u16,
    },
    /// Reported average per-frame tick cost.
    ProcessTime {
        /// Average ticks per frame.
        avg_ticks: u16,
    },
}

impl EventBody {
    /// The [`EventKind`] this body belongs to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            EventBody::Empty => EventKind::Empty,
            EventBody::Destruct => EventKind::Destruct,
            EventBody::MegaMission { .. } => EventKind::MegaMission,
            EventBody::Exit => EventKind::Exit,
            EventBody::Idle { .. } => EventKind::Idle,
            EventBody::Scatter { .. } => EventKind::Scatter,
            EventBody::Deploy { .. } => EventKind::Deploy,
            EventBody::Repair { .. } => EventKind::Repair,
            EventBody::Sell { .. } => EventKind::Sell,
            EventBody::Primary { .. } => EventKind::Primary,
            EventBody::Place { .. } => EventKind::Place,
            EventBody::Options { .. } => EventKind::Options,
            EventBody::GameSpeed { .. } => EventKind::GameSpeed,
            EventBody::Produce { .. } => EventKind::Produce,
            EventBody::Suspend { .. } => EventKind::Suspend,
            EventBody::Abandon { .. } => EventKind::Abandon,
            EventBody::SpecialPlace { .. } => EventKind::SpecialPlace,
            EventBody::Animation { .. } => EventKind::Animation,
            EventBody::Special { .. } => EventKind::Special,
            EventBody::FrameSync { .. } => EventKind::FrameSync,
            EventBody::FrameInfo { .. } => EventKind::FrameInfo,
            EventBody::Message(_) => EventKind::Message,
            EventBody::ResponseTime { .. } => EventKind::ResponseTime,
            EventBody::Ally { .. } => EventKind::Ally,
            EventBody::Archive { .. } => EventKind::Archive,
            EventBody::Timing { .. } => EventKind::Timing,
            EventBody::ProcessTime { .. } => EventKind::ProcessTime,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        match *self {
            EventBody::Empty | EventBody::Destruct | EventBody::Exit => {}
            EventBody::Ally { house_id } => out.push(house_id),
            EventBody::MegaMission {
                whom,
                mission,
                attack_target,
                destination,
            } => {
                out.extend_from_slice(&whom.to_bits().to_le_bytes());
                out.push(mission);
                out.extend_from_slice(&attack_target.to_le_bytes());
                out.extend_from_slice(&destination.to_le_bytes());
            }
            EventBody::Idle { target }
            | EventBody::Scatter { target }
            | EventBody::Deploy { target }
            | EventBody::Repair { target }
            | EventBody::Sell { target }
            | EventBody::Primary { target } => {
                out.extend_from_slice(&target.to_bits().to_le_bytes());
            }
            EventBody::Place {
                kind_tag,
                type_id,
                cell,
            } => {
                out.push(kind_tag);
                out.push(type_id);
                out.extend_from_slice(&cell.to_le_bytes());
            }
            EventBody::Options { flags } => out.extend_from_slice(&flags.to_le_bytes()),
            EventBody::GameSpeed { speed } => out.push(speed),
            EventBody::Produce { kind_tag, type_id }
            | EventBody::Suspend { kind_tag, type_id }
            | EventBody::Abandon { kind_tag, type_id } => {
                out.push(kind_tag);
                out.push(type_id);
            }
            EventBody::SpecialPlace { special_id, cell } => {
                out.extend_from_slice(&special_id.to_le_bytes());
                out.extend_from_slice(&cell.to_le_bytes());
            }
            EventBody::Animation {
                anim_type,
                owner,
                coord,
                visibility_mask,
            } => {
                out.push(anim_type);
                out.push(owner);
                out.extend_from_slice(&coord.to_le_bytes());
                out.extend_from_slice(&visibility_mask.to_le_bytes());
            }
            EventBody::Special { value } => out.extend_from_slice(&value.to_le_bytes()),
            EventBody::FrameSync {
                crc,
                command_count,
                delay,
            }
            | EventBody::FrameInfo {
                crc,
                command_count,
                delay,
            } => {
                out.extend_from_slice(&crc.to_le_bytes());
                out.extend_from_slice(&command_count.to_le_bytes());
                out.push(delay);
            }
            EventBody::Message(text) => out.extend_from_slice(&text),
            EventBody::ResponseTime { delay } => out.push(delay),
            EventBody::Archive { a, b } => {
                out.extend_from_slice(&a.to_bits().to_le_bytes());
                out.extend_from_slice(&b.to_bits().to_le_bytes());
            }
            EventBody::Timing {
                desired_frame_rate,
                max_ahead,
            } => {
                out.extend_from_slice(&desired_frame_rate.to_le_bytes());
                out.extend_from_slice(&max_ahead.to_le_bytes());
            }
            EventBody::ProcessTime { avg_ticks } => out.extend_from_slice(&avg_ticks.to_le_bytes()),
        }
    }

    fn read_payload(kind: EventKind, bytes: &[u8]) -> Self {
        let u32_at = |off: usize| u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
        let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);

        match kind {
            EventKind::Empty => EventBody::Empty,
            EventKind::Destruct => EventBody::Destruct,
            EventKind::Exit => EventBody::Exit,
            EventKind::Ally => EventBody::Ally { house_id: bytes[0] },
            EventKind::MegaMission => EventBody::MegaMission {
                whom: TargetHandle::from_bits(u32_at(0)),
                mission: bytes[4],
                attack_target: u32_at(5),
                destination: u32_at(9),
            },
            EventKind::Idle => EventBody::Idle {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Scatter => EventBody::Scatter {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Deploy => EventBody::Deploy {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Repair => EventBody::Repair {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Sell => EventBody::Sell {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Primary => EventBody::Primary {
                target: TargetHandle::from_bits(u32_at(0)),
            },
            EventKind::Place => EventBody::Place {
                kind_tag: bytes[0],
                type_id: bytes[1],
                cell: u32_at(2),
            },
            EventKind::Options => EventBody::Options { flags: u32_at(0) },
            EventKind::GameSpeed => EventBody::GameSpeed { speed: bytes[0] },
            EventKind::Produce => EventBody::Produce {
                kind_tag: bytes[0],
                type_id: bytes[1],
            },
            EventKind::Suspend => EventBody::Suspend {
                kind_tag: bytes[0],
                type_id: bytes[1],
            },
            EventKind::Abandon => EventBody::Abandon {
                kind_tag: bytes[0],
                type_id: bytes[1],
            },
            EventKind::SpecialPlace => EventBody::SpecialPlace {
                special_id: u16_at(0),
                cell: u32_at(2),
            },
            EventKind::Animation => EventBody::Animation {
                anim_type: bytes[0],
                owner: bytes[1],
                coord: u32_at(2),
                visibility_mask: u32_at(6),
            },
            EventKind::Special => EventBody::Special { value: u32_at(0) },
            EventKind::FrameSync => EventBody::FrameSync {
                crc: u32_at(0),
                command_count: u16_at(4),
                delay: bytes[6],
            },
            EventKind::FrameInfo => EventBody::FrameInfo {
                crc: u32_at(0),
                command_count: u16_at(4),
                delay: bytes[6],
            },
            EventKind::Message => {
                let mut text = [0u8; 40];
                text.copy_from_slice(&bytes[0..40]);
                EventBody::Message(text)
            }
            EventKind::ResponseTime => EventBody::ResponseTime { delay: bytes[0] },
            EventKind::Archive => EventBody::Archive {
                a: TargetHandle::from_bits(u32_at(0)),
                b: TargetHandle::from_bits(u32_at(4)),
            },
            EventKind::Timing => EventBody::Timing {
                desired_frame_rate: u16_at(0),
                max_ahead: u16_at(2),
            },
            EventKind::ProcessTime => EventBody::ProcessTime {
                avg_ticks: u16_at(0),
            },
        }
    }
}

impl Event {
    /// Encode this event to its exact wire representation:
    /// `7 + kind.payload_len()` bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let kind = self.body.kind();
        let mut out = Vec::with_capacity(HEADER_LEN + kind.payload_len());
        self.header.write_to(kind.tag(), &mut out);
        self.body.write_payload(&mut out);
        out
    }

    /// Decode one event starting at `bytes[0]`, returning the event and
    /// the number of bytes consumed so callers can advance into a stream
    /// of back-to-back events.
    pub fn decode(bytes: &[u8]) -> Result<(Event, usize), EventError> {
        let (kind_tag, header) = EventHeader::read_from(bytes).ok_or(EventError::IncompleteHeader {
            needed: HEADER_LEN,
            got: bytes.len(),
        })?;
        let kind = EventKind::from_tag(kind_tag).ok_or(EventError::UnknownKind(kind_tag))?;

        let payload_len = kind.payload_len();
        let total_len = HEADER_LEN + payload_len;
        if bytes.len() < total_len {
            return Err(EventError::TruncatedPayload {
                needed: total_len,
                got: bytes.len(),
            });
        }

        let payload = &bytes[HEADER_LEN..total_len];
        let body = EventBody::read_payload(kind, payload);
        Ok((Event { header, body }, total_len))
    }
}
