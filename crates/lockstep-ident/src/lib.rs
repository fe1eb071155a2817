// SPDX-License-Identifier: Apache-2.0
//! Target handle encoding for the lockstep multiplayer core.
//!
//! A [`TargetHandle`] is the 32-bit wire value events use to name an
//! entity without a pointer: an [`EntityKind`] tag plus a dense index into
//! that kind's object heap. The wire handle has no room for a generation
//! counter once kind and index are packed in, so ABA protection lives
//! out-of-band: the heap hands out a [`Generation`] alongside every
//! allocated index, and code that holds onto an index across frames
//! should hold the generation with it rather than relying on the bare
//! wire handle. Handles that arrive from the network carry no generation
//! at all — decoding a stale one is not an error, it is simply resolved
//! against whatever currently occupies that slot.
//!
//! Bit layout (MSB to LSB):
//!
//! ```text
//! bit   31       : valid flag (1 = handle names something, 0 = NONE)
//! bits  30..=27  : kind tag (4 bits, 0..=15)
//! bits  26..=0   : index (27 bits, 0..=134_217_727)
//! ```

use thiserror::Error;

/// Bit width of the index field.
const INDEX_BITS: u32 = 27;
/// Bit width of the kind field.
const KIND_BITS: u32 = 4;

const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const KIND_MASK: u32 = (1 << KIND_BITS) - 1;

const KIND_SHIFT: u32 = INDEX_BITS;
const VALID_SHIFT: u32 = KIND_SHIFT + KIND_BITS;

/// Largest index a heap of any kind may address.
pub const MAX_INDEX: u32 = INDEX_MASK;

/// Closed set of entity kinds, each backed by its own object heap.
///
/// The discriminant is the wire kind tag; adding a kind is a protocol
/// change, so the list is deliberately closed rather than open for
/// extension by downstream crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntityKind {
    /// Foot soldiers.
    Infantry = 0,
    /// Ground vehicles.
    Vehicle = 1,
    /// Aircraft.
    Aircraft = 2,
    /// Projectiles.
    Bullet = 3,
    /// Cosmetic animation instances (explosions, etc).
    Animation = 4,
    /// Structures.
    Building = 5,
}

impl EntityKind {
    /// All kinds, in wire-tag order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Infantry,
        EntityKind::Vehicle,
        EntityKind::Aircraft,
        EntityKind::Bullet,
        EntityKind::Animation,
        EntityKind::Building,
    ];

    /// Decode a wire kind tag, returning `None` for tags outside the closed set.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EntityKind::Infantry),
            1 => Some(EntityKind::Vehicle),
            2 => Some(EntityKind::Aircraft),
            3 => Some(EntityKind::Bullet),
            4 => Some(EntityKind::Animation),
            5 => Some(EntityKind::Building),
            _ => None,
        }
    }

    /// The wire kind tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// Out-of-band ABA guard for an object-heap slot.
///
/// Never transmitted over the wire — the 32-bit [`TargetHandle`] has no
/// room for it. Code that needs to detect "this slot was freed and
/// reallocated since I last looked at it" must keep the `Generation` it
/// received from [allocation][alloc] alongside the handle itself.
///
/// [alloc]: https://docs.rs/lockstep-heap (see `ObjectHeap::allocate`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u32);

impl Generation {
    /// The generation assigned to a slot's very first occupant.
    pub const FIRST: Generation = Generation(0);

    /// The generation that follows this one, wrapping at `u32::MAX`.
    #[must_use]
    pub const fn next(self) -> Generation {
        Generation(self.0.wrapping_add(1))
    }
}

/// Errors returned while decoding a [`TargetHandle`]'s components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The kind tag is outside the closed [`EntityKind`] set.
    #[error("unknown entity kind tag {0}")]
    UnknownKind(u8),
    /// The handle is the reserved `NONE` sentinel.
    #[error("handle is NONE")]
    None,
}

/// A 32-bit wire reference to an entity: kind and dense index, no generation.
///
/// `TargetHandle::NONE` is the reserved "no target" value used throughout
/// event payloads (e.g. an un-set `PRIMARY` target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u32);

impl TargetHandle {
    /// The reserved sentinel meaning "no target". Its bit pattern is all
    /// zero, which can never collide with a valid handle because valid
    /// handles always have the valid flag (bit 31) set.
    pub const NONE: TargetHandle = TargetHandle(0);

    /// Encode a handle from its kind and index.
    ///
    /// `index` is silently masked to [`MAX_INDEX`]; a heap never hands out
    /// an index beyond its own capacity, so callers that only ever encode
    /// indices returned by a heap never observe masking.
    #[must_use]
    pub const fn encode(kind: EntityKind, index: u32) -> TargetHandle {
        let bits =
            (1 << VALID_SHIFT) | ((kind.tag() as u32 & KIND_MASK) << KIND_SHIFT) | (index & INDEX_MASK);
        TargetHandle(bits)
    }

    /// Raw 32-bit wire value.
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Reconstruct a handle from its raw wire value. Never fails: any bit
    /// pattern is a representable handle, possibly `NONE` or one that
    /// decodes to an unknown kind (checked later by [`TargetHandle::kind`]).
    #[must_use]
    pub const fn from_bits(bits: u32) -> TargetHandle {
        TargetHandle(bits)
    }

    /// `true` when this is the `NONE` sentinel.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The dense index component, regardless of validity.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Decode the entity kind, failing if the handle is `NONE` or names an
    /// unknown kind tag. Decoders MUST treat both as recoverable: the
    /// caller's documented fallback applies (typically: skip the action).
    pub fn kind(self) -> Result<EntityKind, HandleError> {
        if self.is_none() {
            return Err(HandleError::None);
        }
        let tag = ((self.0 >> KIND_SHIFT) & KIND_MASK) as u8;
        EntityKind::from_tag(tag).ok_or(HandleError::UnknownKind(tag))
    }

    /// Decode `(kind, index)`, the pair event handlers usually need.
    /// Returns `None` rather than an error for any decode failure — per
    /// §4.A, an invalid handle is not itself an error, only its use is.
    #[must_use]
    pub fn decode(self) -> Option<(EntityKind, u32)> {
        self.kind().ok().map(|kind| (kind, self.index()))
    }
}

impl Default for TargetHandle {
    fn default() -> Self {
        TargetHandle::NONE
    }
}

impl From<u32> for TargetHandle {
    fn from(bits: u32) -> Self {
        TargetHandle::from_bits(bits)
    }
}

impl From<TargetHandle> for u32 {
    fn from(handle: TargetHandle) -> Self {
        handle.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero_and_never_produced_by_encode() {
        assert_eq!(TargetHandle::NONE.to_bits(), 0);
        assert!(TargetHandle::NONE.is_none());
        for kind in EntityKind::ALL {
            let h = TargetHandle::encode(kind, 0);
            assert!(!h.is_none());
        }
    }

    #[test]
    fn round_trips_kind_and_index() {
        for kind in EntityKind::ALL {
            let h = TargetHandle::encode(kind, 123_456);
            assert_eq!(h.kind().unwrap(), kind);
            assert_eq!(h.index(), 123_456);
        }
    }

    #[test]
    fn decode_none_is_none() {
        assert_eq!(TargetHandle::NONE.decode(), None);
        assert_eq!(TargetHandle::NONE.kind(), Err(HandleError::None));
    }

    #[test]
    fn unknown_kind_tag_is_recoverable_not_a_panic() {
        // Bit pattern with valid flag set and kind tag 9 (outside 0..=5).
        let bits = (1 << VALID_SHIFT) | (9 << KIND_SHIFT);
        let h = TargetHandle::from_bits(bits);
        assert_eq!(h.kind(), Err(HandleError::UnknownKind(9)));
        assert_eq!(h.decode(), None);
    }

    #[test]
    fn index_masks_to_field_width() {
        let h = TargetHandle::encode(EntityKind::Infantry, MAX_INDEX + 5);
        assert_eq!(h.index(), 5);
    }

    #[test]
    fn entity_kind_tag_round_trips() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EntityKind::from_tag(200), None);
    }

    #[test]
    fn generation_wraps_at_u32_max() {
        assert_eq!(Generation(u32::MAX).next(), Generation(0));
        assert_eq!(Generation::FIRST.next(), Generation(1));
    }
}
