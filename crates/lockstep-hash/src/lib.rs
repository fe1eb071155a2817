// SPDX-License-Identifier: Apache-2.0
//! Deterministic state hashing.
//!
//! Determinism contract
//! - The state hash is a CRC-32 fold over a canonical byte stream, not a
//!   hash of any in-memory representation — pointer layout, `HashMap`
//!   iteration order, and float bit patterns never enter it.
//! - Ordering is explicit and stable: a [`FoldState`] implementation for
//!   an [`lockstep_heap::ObjectHeap`] folds active slots in ascending
//!   index order (the same order [`lockstep_heap::ObjectHeap::iter_active`]
//!   yields), never iteration order of an unordered collection.
//! - Only state that must converge across peers is folded. Purely
//!   cosmetic state (animation sub-frames, sound triggers, UI) must be
//!   left out of a [`FoldState`] implementation entirely — it has no way
//!   to know which fields "matter" for your entity type, so that
//!   judgment call is the caller's.
//! - CRC-32 was chosen over a cryptographic hash because this value is
//!   compared between trusted peers to catch accidental divergence, not
//!   to resist a malicious one; the whole folded stream is also available
//!   to diff once a mismatch is detected, so a weak hash costs nothing.

use lockstep_heap::ObjectHeap;

/// Accumulates bytes into a running CRC-32, exposing only fixed-width,
/// endianness-explicit writers so every peer folds identical bytes
/// regardless of host architecture.
#[derive(Default)]
pub struct StateFolder {
    hasher: crc32fast::Hasher,
}

impl StateFolder {
    /// Start a fresh fold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.hasher.update(&[value]);
    }

    /// Fold a 16-bit value, little-endian.
    pub fn write_u16(&mut self, value: u16) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Fold a 32-bit value, little-endian.
    pub fn write_u32(&mut self, value: u32) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Fold a 64-bit value, little-endian.
    pub fn write_u64(&mut self, value: u64) {
        self.hasher.update(&value.to_le_bytes());
    }

    /// Fold a raw byte slice verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Consume the folder and return the final CRC-32.
    #[must_use]
    pub fn finish(self) -> u32 {
        self.hasher.finalize()
    }
}

/// Implemented by simulation state that contributes to the convergence
/// hash. Implementations decide which of their own fields matter; see
/// the module-level determinism contract.
pub trait FoldState {
    /// Fold this value's convergence-relevant bytes into `folder`.
    fn fold_state(&self, folder: &mut StateFolder);
}

impl<T: FoldState> FoldState for ObjectHeap<T> {
    fn fold_state(&self, folder: &mut StateFolder) {
        for (index, value) in self.iter_active() {
            folder.write_u32(index);
            value.fold_state(folder);
        }
    }
}

/// Fold every item in `items`, in the order given, into a single CRC-32.
/// Callers that hash several heaps together must pass them in a fixed
/// order (e.g. always infantry, then vehicles, then aircraft, ...) for
/// the result to be meaningful across peers.
pub fn state_hash<'a>(items: impl IntoIterator<Item = &'a dyn FoldState>) -> u32 {
    let mut folder = StateFolder::new();
    for item in items {
        item.fold_state(&mut folder);
    }
    folder.finish()
}

/// One peer's reported hash for one frame, the unit the scheduler
/// exchanges and compares on sync frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashRecord {
    /// The frame this hash was computed at.
    pub frame: u32,
    /// The peer that reported it.
    pub peer: u8,
    /// The folded CRC-32.
    pub crc: u32,
}
