//! Allocator integration tests
//!
//! Exercises the baseline discipline across whole transactions: slab
//! allocation, commit windows, and the immutable file image.

use snapstore_memory::{Array, Memory, Ref, FILE_BASE, SLAB_BASE};

#[test]
fn regions_are_disjoint() {
    let mut mem = Memory::new();
    let slab = mem.alloc(16).unwrap();
    assert!(slab.raw() >= SLAB_BASE);

    mem.begin_commit();
    let file = mem.alloc_in_file(16).unwrap();
    mem.free(slab, 16);
    mem.end_commit();

    assert!(file.raw() >= FILE_BASE);
    assert!(file.raw() < SLAB_BASE);
    assert!(mem.baseline() > file.raw());
}

#[test]
fn baseline_advances_per_commit() {
    let mut mem = Memory::new();
    assert_eq!(mem.baseline(), FILE_BASE);

    mem.begin_commit();
    let first = mem.alloc_in_file(32).unwrap();
    mem.end_commit();
    let after_first = mem.baseline();
    assert!(after_first > first.raw());

    mem.begin_commit();
    let second = mem.alloc_in_file(32).unwrap();
    mem.end_commit();
    assert!(second.raw() >= after_first);
    assert!(mem.baseline() > second.raw());
    assert_eq!(mem.version(), 2);
}

#[test]
fn committed_graph_is_immutable_old_blocks_stay_valid() {
    let mut mem = Memory::new();

    // Build a two-block graph in the slab: parent holds the child ref.
    let child = Array::<u64>::alloc(&mut mem, 4).unwrap();
    child.set(&mut mem, 0, 123);
    let parent = mem.alloc(8).unwrap();
    mem.set_word(parent, 0, child.to_ref().raw());

    // Commit child then parent, bottom-up.
    mem.begin_commit();
    let child = Array::<u64>::commit(&mut mem, child).unwrap();
    let new_parent = mem.alloc_in_file(8).unwrap();
    mem.set_word(new_parent, 0, child.to_ref().raw());
    mem.free(parent, 8);
    mem.end_commit();

    assert!(!mem.is_writable(new_parent));
    let stored = Ref::new(mem.word(new_parent, 0));
    assert!(!mem.is_writable(stored));
    assert_eq!(Array::<u64>::from_ref(stored).get(&mem, 0), 123);

    // A second transaction's slab traffic leaves the image untouched.
    let scratch = mem.alloc(64).unwrap();
    mem.set_word(scratch, 0, u64::MAX);
    assert_eq!(Array::<u64>::from_ref(stored).get(&mem, 0), 123);
    mem.discard();
    assert_eq!(Array::<u64>::from_ref(stored).get(&mem, 0), 123);
}

#[test]
fn abort_leaves_old_image_authoritative() {
    let mut mem = Memory::new();
    mem.begin_commit();
    let kept = mem.alloc_in_file(16).unwrap();
    mem.set_word(kept, 0, 5);
    mem.end_commit();
    let baseline = mem.baseline();

    let _garbage = mem.alloc(16).unwrap();
    mem.begin_commit();
    let _orphan = mem.alloc_in_file(16).unwrap();
    mem.abort_commit();

    assert_eq!(mem.baseline(), baseline);
    assert_eq!(mem.word(kept, 0), 5);
    assert_eq!(mem.stats().live_blocks, 0);
}
