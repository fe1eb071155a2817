// SPDX-License-Identifier: Apache-2.0
//! Fixed-capacity, freelist-backed object heap: one instance per entity
//! kind, storing whatever entity type the simulation owns.
//!
//! Allocation always returns the lowest currently-free index so that two
//! peers replaying the same sequence of allocate/free calls end up with
//! identical indices — the property the rest of the lockstep core leans
//! on when it encodes a [`lockstep_ident::TargetHandle`] and expects every
//! peer to resolve it to the same entity. A per-slot [`Generation`] rides
//! alongside the index and survives across free/reallocate cycles so
//! callers that hold onto `(index, generation)` pairs rather than bare
//! handles can detect a stale reference.

use std::collections::BTreeSet;

use ciborium::{de::from_reader, ser::into_writer};
use lockstep_ident::Generation;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors raised by [`ObjectHeap`] operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// The heap is at capacity; no slot was available.
    #[error("heap is at capacity")]
    Full,
    /// `free` or a lookup was given an index with nothing allocated there.
    #[error("index {0} is not currently allocated")]
    NotAllocated(u32),
    /// A saved snapshot referenced an index beyond the heap's capacity.
    #[error("index {index} exceeds capacity {capacity}")]
    OutOfRange {
        /// The offending index.
        index: u32,
        /// The heap's configured capacity.
        capacity: usize,
    },
    /// Snapshot serialization failed.
    #[error("failed to encode heap snapshot: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    /// Snapshot deserialization failed.
    #[error("failed to decode heap snapshot: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

/// One saved slot: its index, the generation it was allocated under, and
/// the entity value itself. This is the flat record the first pass of
/// save/load produces and consumes; resolving any target handles an
/// entity holds to other heaps is the second pass, done by the caller
/// once every heap involved has finished its own first pass.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct HeapEntry<T> {
    /// The slot index the entity occupied when saved.
    pub index: u32,
    /// The generation assigned to that occupancy.
    pub generation: u32,
    /// The entity itself.
    pub value: T,
}

/// On-disk shape of a heap snapshot. `generations` covers every slot ever
/// used (including freed ones still awaiting reallocation) so a save/load
/// round trip doesn't reset the ABA guard on a vacated slot back to zero.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct Snapshot<T> {
    generations: Vec<u32>,
    entries: Vec<HeapEntry<T>>,
}

/// A fixed-capacity slab of entities of a single kind.
pub struct ObjectHeap<T> {
    capacity: usize,
    slots: Vec<Option<T>>,
    generations: Vec<Generation>,
    free: BTreeSet<u32>,
}

impl<T> ObjectHeap<T> {
    /// Create an empty heap with room for `capacity` live entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            generations: Vec::new(),
            free: BTreeSet::new(),
        }
    }

    /// The heap's configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of currently-allocated slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Allocate the lowest free index and store `value` there. Fails with
    /// [`HeapError::Full`] once `capacity` live entities are allocated.
    pub fn allocate(&mut self, value: T) -> Result<(u32, Generation), HeapError> {
        if let Some(&index) = self.free.iter().next() {
            self.free.remove(&index);
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.is_none(), "freelist entry pointed at an occupied slot");
            *slot = Some(value);
            return Ok((index, self.generations[index as usize]));
        }

        if self.slots.len() >= self.capacity {
            return Err(HeapError::Full);
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| HeapError::Full)?;
        self.slots.push(Some(value));
        self.generations.push(Generation::FIRST);
        Ok((index, Generation::FIRST))
    }

    /// Vacate a slot, returning it to the freelist and bumping its
    /// generation so a reallocated index is distinguishable from its
    /// previous occupant.
    pub fn free(&mut self, index: u32) -> Result<T, HeapError> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(HeapError::NotAllocated(index))?;
        let value = slot.take().ok_or(HeapError::NotAllocated(index))?;
        self.generations[index as usize] = self.generations[index as usize].next();
        self.free.insert(index);
        Ok(value)
    }

    /// Look up an entity by index, whether or not it's currently allocated.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    /// Mutable lookup, see [`ObjectHeap::get`].
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    /// `true` when `index` currently holds a live entity.
    #[must_use]
    pub fn is_allocated(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(Option::is_some)
    }

    /// The generation currently assigned to `index`, whether or not it is
    /// presently allocated (a freed slot's generation is the one its
    /// *next* occupant will receive).
    #[must_use]
    pub fn generation_of(&self, index: u32) -> Option<Generation> {
        self.generations.get(index as usize).copied()
    }

    /// Iterate live entities in ascending index order.
    pub fn iter_active(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|value| (u32::try_from(index).unwrap_or(u32::MAX), value))
        })
    }
}

impl<T: Serialize + DeserializeOwned> ObjectHeap<T> {
    /// Serialize every live entity to a flat, self-describing snapshot.
    /// The snapshot does not resolve target handles entities may hold to
    /// other heaps — that is left to a second pass run once every
    /// relevant heap has been restored via [`ObjectHeap::load_raw`].
    pub fn save(&self) -> Result<Vec<u8>, HeapError> {
        let entries: Vec<HeapEntry<&T>> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|value| HeapEntry {
                    index: u32::try_from(index).unwrap_or(u32::MAX),
                    generation: self.generations[index].0,
                    value,
                })
            })
            .collect();
        let snapshot = Snapshot {
            generations: self.generations.iter().map(|g| g.0).collect(),
            entries,
        };
        let mut bytes = Vec::new();
        into_writer(&snapshot, &mut bytes)?;
        Ok(bytes)
    }

    /// Restore a heap from a snapshot produced by [`ObjectHeap::save`].
    /// This is the first pass of the two-pass load: indices and
    /// generations are restored exactly as saved, so any target handle
    /// an entity holds remains meaningful without remapping, but those
    /// handles are not themselves validated here — do that once every
    /// heap the simulation uses has been loaded.
    pub fn load_raw(capacity: usize, bytes: &[u8]) -> Result<Self, HeapError> {
        let snapshot: Snapshot<T> = from_reader(bytes)?;
        let needed = snapshot.generations.len();
        if needed > capacity {
            return Err(HeapError::OutOfRange {
                index: u32::try_from(needed.saturating_sub(1)).unwrap_or(u32::MAX),
                capacity,
            });
        }

        let mut heap = Self::new(capacity);
        heap.slots.resize_with(needed, || None);
        heap.generations = snapshot.generations.into_iter().map(Generation).collect();
        heap.free.extend(0..u32::try_from(needed).unwrap_or(0));

        for entry in snapshot.entries {
            if entry.index as usize >= needed {
                return Err(HeapError::OutOfRange {
                    index: entry.index,
                    capacity,
                });
            }
            heap.free.remove(&entry.index);
            heap.slots[entry.index as usize] = Some(entry.value);
        }
        Ok(heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_returns_lowest_free_index() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(4);
        let (a, _) = heap.allocate(10).unwrap();
        let (b, _) = heap.allocate(20).unwrap();
        let (c, _) = heap.allocate(30).unwrap();
        assert_eq!([a, b, c], [0, 1, 2]);

        heap.free(b).unwrap();
        let (reused, _) = heap.allocate(99).unwrap();
        assert_eq!(reused, b, "freed lowest index must be reused before growing");
    }

    #[test]
    fn free_bumps_generation_for_next_occupant() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(2);
        let (index, gen0) = heap.allocate(1).unwrap();
        heap.free(index).unwrap();
        let (reused, gen1) = heap.allocate(2).unwrap();
        assert_eq!(reused, index);
        assert_ne!(gen0, gen1);
        assert_eq!(gen1, gen0.next());
    }

    #[test]
    fn full_heap_rejects_further_allocation() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(1);
        heap.allocate(1).unwrap();
        assert!(matches!(heap.allocate(2), Err(HeapError::Full)));
    }

    #[test]
    fn free_of_unallocated_index_is_reported_not_panicked() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(2);
        assert!(matches!(heap.free(0), Err(HeapError::NotAllocated(0))));
    }

    #[test]
    fn iter_active_is_in_index_order_and_skips_freed() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(4);
        heap.allocate(10).unwrap();
        let (b, _) = heap.allocate(20).unwrap();
        heap.allocate(30).unwrap();
        heap.free(b).unwrap();

        let values: Vec<_> = heap.iter_active().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 30]);
    }

    #[test]
    fn count_reflects_live_entities_only() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(4);
        let (a, _) = heap.allocate(1).unwrap();
        heap.allocate(2).unwrap();
        assert_eq!(heap.count(), 2);
        heap.free(a).unwrap();
        assert_eq!(heap.count(), 1);
    }

    #[test]
    fn save_and_load_preserve_indices_and_generations() {
        let mut heap: ObjectHeap<u32> = ObjectHeap::new(4);
        heap.allocate(10).unwrap();
        let (b, _) = heap.allocate(20).unwrap();
        heap.free(b).unwrap();
        heap.allocate(40).unwrap();

        let snapshot = heap.save().unwrap();
        let restored: ObjectHeap<u32> = ObjectHeap::load_raw(4, &snapshot).unwrap();

        assert_eq!(restored.get(0), Some(&10));
        assert_eq!(restored.get(2), Some(&40));
        assert_eq!(restored.count(), 2);
        assert_eq!(restored.generation_of(1), Some(Generation(1)));
    }
}
