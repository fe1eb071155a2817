// SPDX-License-Identifier: Apache-2.0
//! The closed set of event kinds and their wire tags.

/// One of the ~20 player-action or sync-protocol event kinds, tagged by a
/// single wire byte.
///
/// Only two tag values are pinned by a worked example: `EMPTY` must be 0
/// and `MEGA_MISSION` must be 2 (see the round-trip fixtures in
/// `tests/wire_fixture_tests.rs`). The remaining tags were assigned a
/// fixed declaration order to keep the tag space contiguous; that
/// assignment, once published, is as load-bearing as any other part of
/// the wire format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// No-op placeholder event.
    Empty = 0,
    /// Destroy the origin peer's commander house.
    Destruct = 1,
    /// Composite attack-move order.
    MegaMission = 2,
    /// Return to idle stance.
    Exit = 3,
    /// Set idle stance on a unit.
    Idle = 4,
    /// Scatter order.
    Scatter = 5,
    /// Deploy order.
    Deploy = 6,
    /// Send a unit to the repair bay.
    Repair = 7,
    /// Sell a structure.
    Sell = 8,
    /// Set a building's primary factory flag.
    Primary = 9,
    /// Place a structure or unit on the map.
    Place = 10,
    /// Change a session-wide game option bitfield.
    Options = 11,
    /// Change the simulation's game speed.
    GameSpeed = 12,
    /// Queue production of a unit or structure.
    Produce = 13,
    /// Suspend production.
    Suspend = 14,
    /// Abandon production, refunding spent credits.
    Abandon = 15,
    /// Place a special ability's effect.
    SpecialPlace = 16,
    /// Cosmetic animation spawn.
    Animation = 17,
    /// Fire a superweapon/special.
    Special = 18,
    /// Periodic scheduler sync marker (outgoing).
    FrameSync = 19,
    /// Periodic scheduler sync marker (incoming, peer-reported).
    FrameInfo = 20,
    /// Chat text.
    Message = 21,
    /// Reported round-trip delay.
    ResponseTime = 22,
    /// Form or break an alliance.
    Ally = 23,
    /// Archive/unarchive a pair of handles (e.g. for a transport/cargo link).
    Archive = 24,
    /// Negotiated frame-rate and max-frame-ahead proposal.
    Timing = 25,
    /// Reported average per-frame tick cost.
    ProcessTime = 26,
}

impl EventKind {
    /// All kinds, in wire-tag order.
    pub const ALL: [EventKind; 27] = [
        EventKind::Empty,
        EventKind::Destruct,
        EventKind::MegaMission,
        EventKind::Exit,
        EventKind::Idle,
        EventKind::Scatter,
        EventKind::Deploy,
        EventKind::Repair,
        EventKind::Sell,
        EventKind::Primary,
        EventKind::Place,
        EventKind::Options,
        EventKind::GameSpeed,
        EventKind::Produce,
        EventKind::Suspend,
        EventKind::Abandon,
        EventKind::SpecialPlace,
        EventKind::Animation,
        EventKind::Special,
        EventKind::FrameSync,
        EventKind::FrameInfo,
        EventKind::Message,
        EventKind::ResponseTime,
        EventKind::Ally,
        EventKind::Archive,
        EventKind::Timing,
        EventKind::ProcessTime,
    ];

    /// Decode a wire tag, returning `None` for tags outside the closed set.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EventKind::Empty),
            1 => Some(EventKind::Destruct),
            2 => Some(EventKind::MegaMission),
            3 => Some(EventKind::Exit),
            4 => Some(EventKind::Idle),
            5 => Some(EventKind::Scatter),
            6 => Some(EventKind::Deploy),
            7 => Some(EventKind::Repair),
            8 => Some(EventKind::Sell),
            9 => Some(EventKind::Primary),
            10 => Some(EventKind::Place),
            11 => Some(EventKind::Options),
            12 => Some(EventKind::GameSpeed),
            13 => Some(EventKind::Produce),
            14 => Some(EventKind::Suspend),
            15 => Some(EventKind::Abandon),
            16 => Some(EventKind::SpecialPlace),
            17 => Some(EventKind::Animation),
            18 => Some(EventKind::Special),
            19 => Some(EventKind::FrameSync),
            20 => Some(EventKind::FrameInfo),
            21 => Some(EventKind::Message),
            22 => Some(EventKind::ResponseTime),
            23 => Some(EventKind::Ally),
            24 => Some(EventKind::Archive),
            25 => Some(EventKind::Timing),
            26 => Some(EventKind::ProcessTime),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// The contractual payload length, in bytes, for this kind. Decoders
    /// reject any event whose trailing bytes disagree with this constant.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            EventKind::Empty | EventKind::Destruct | EventKind::Exit => 0,
            EventKind::Ally => 1,
            EventKind::MegaMission => 13,
            EventKind::Idle
            | EventKind::Scatter
            | EventKind::Deploy
            | EventKind::Repair
            | EventKind::Sell
            | EventKind::Primary => 4,
            EventKind::Place => 6,
            EventKind::Options => 4,
            EventKind::GameSpeed => 1,
            EventKind::Produce | EventKind::Suspend | EventKind::Abandon => 2,
            EventKind::SpecialPlace => 6,
            EventKind::Animation => 10,
            EventKind::Special => 4,
            EventKind::FrameSync | EventKind::FrameInfo => 7,
            EventKind::Message => 40,
            EventKind::ResponseTime => 1,
            EventKind::Archive => 8,
            EventKind::Timing => 4,
            EventKind::ProcessTime => 2,
        }
    }
}
