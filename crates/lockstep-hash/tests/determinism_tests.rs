#![allow(missing_docs)]
use lockstep_hash::{state_hash, FoldState, StateFolder};
use lockstep_heap::ObjectHeap;

struct Unit {
    hp: u16,
    owner: u8,
}

impl FoldState for Unit {
    fn fold_state(&self, folder: &mut StateFolder) {
        folder.write_u16(self.hp);
        folder.write_u8(self.owner);
    }
}

fn build_heap() -> ObjectHeap<Unit> {
    let mut heap = ObjectHeap::new(8);
    heap.allocate(Unit { hp: 100, owner: 0 }).unwrap();
    heap.allocate(Unit { hp: 80, owner: 1 }).unwrap();
    heap.allocate(Unit { hp: 50, owner: 0 }).unwrap();
    heap
}

#[test]
fn two_independently_built_heaps_with_identical_history_hash_identically() {
    let a = build_heap();
    let b = build_heap();
    assert_eq!(
        state_hash([&a as &dyn FoldState]),
        state_hash([&b as &dyn FoldState])
    );
}

#[test]
fn a_single_differing_field_changes_the_hash() {
    let a = build_heap();
    let mut b = build_heap();
    b.get_mut(2).unwrap().hp -= 1;
    assert_ne!(
        state_hash([&a as &dyn FoldState]),
        state_hash([&b as &dyn FoldState])
    );
}

#[test]
fn freeing_a_slot_changes_the_hash_even_though_remaining_slots_are_untouched() {
    let a = build_heap();
    let mut b = build_heap();
    b.free(1).unwrap();
    assert_ne!(
        state_hash([&a as &dyn FoldState]),
        state_hash([&b as &dyn FoldState])
    );
}

#[test]
fn cosmetic_fields_left_out_of_fold_state_do_not_affect_the_hash() {
    struct Particle {
        sub_frame: u8,
    }
    impl FoldState for Particle {
        fn fold_state(&self, _folder: &mut StateFolder) {
            // Deliberately excluded: animation sub-frame is cosmetic only.
        }
    }

    let mut heap: ObjectHeap<Particle> = ObjectHeap::new(2);
    heap.allocate(Particle { sub_frame: 0 }).unwrap();
    let before = state_hash([&heap as &dyn FoldState]);

    heap.get_mut(0).unwrap().sub_frame = 7;
    let after = state_hash([&heap as &dyn FoldState]);

    assert_eq!(before, after);
}
