use proptest::prelude::*;

use crate::{Accumulator, Digest, MemNodeStore, MerkleTree, NodeAddress, NodeEvent};

/// Create a leaf digest from an integer (for test convenience).
fn leaf_from_u64(i: u64) -> Digest {
    Digest::hash_bytes(&i.to_le_bytes())
}

fn append_all(count: u64) -> (Accumulator, Vec<NodeEvent>) {
    let mut acc = Accumulator::new();
    let mut events = Vec::new();
    for i in 0..count {
        let (_, mut new_events) = acc.append_with_events(leaf_from_u64(i)).expect("append");
        events.append(&mut new_events);
    }
    (acc, events)
}

fn occupied_levels(acc: &Accumulator) -> u64 {
    acc.partials()
        .iter()
        .enumerate()
        .filter(|(_, partial)| partial.is_some())
        .fold(0, |bits, (level, _)| bits | 1 << level)
}

#[test]
fn test_binary_counter_up_to_5000() {
    let mut acc = Accumulator::new();
    for i in 0..5000u64 {
        acc.append(leaf_from_u64(i)).expect("append");
        assert_eq!(occupied_levels(&acc), acc.size());
    }
}

#[test]
fn test_events_cover_every_complete_subtree() {
    let (acc, events) = append_all(64);
    let mut store = MemNodeStore::new();
    store.record(&events);
    // 64 leaves + 32 + 16 + 8 + 4 + 2 + 1 internal nodes
    assert_eq!(store.len(), 127);
    assert_eq!(events.len(), 127);
    let root_event = events.last().expect("events");
    assert_eq!(root_event.address(), NodeAddress::new(6, 63));
    assert_eq!(Ok(root_event.hash), acc.root());
}

#[test]
fn test_resume_from_partials_then_continue() {
    let (full, _) = append_all(300);
    let (half, _) = append_all(137);
    let mut resumed = Accumulator::from_partials(half.partials()).expect("resume");
    for i in 137..300 {
        resumed.append(leaf_from_u64(i)).expect("append");
    }
    assert_eq!(resumed, full);
    assert_eq!(resumed.root(), full.root());
}

prop_compose! {
    fn size_and_split(max: u64)
                     (size in 1..max)
                     (split in 0..=size, size in Just(size))
                     -> (u64, u64) {
                         (size, split)
    }
}

proptest! {
    #[test]
    fn test_random_occupancy(count in 1u64..3000) {
        let (acc, _) = append_all(count);
        prop_assert_eq!(occupied_levels(&acc), count);
        prop_assert_eq!(acc.size(), count);
    }

    #[test]
    fn test_random_root_matches_materialized_tree(count in 1u64..600) {
        let (acc, _) = append_all(count);
        let leaves: Vec<_> = (0..count).map(leaf_from_u64).collect();
        prop_assert_eq!(acc.root(), Ok(MerkleTree::from_leaves(&leaves).hash()));
        prop_assert_eq!(acc.root(), Ok(acc.tree().hash()));
    }

    #[test]
    fn test_random_replay_from_events((size, split) in size_and_split(500)) {
        let (acc, events) = append_all(size);
        prop_assert_eq!(Accumulator::from_events(&events), Ok(acc.clone()));

        // a window starting at a moment when the accumulator was balanced
        // still sees every live partial
        let start = if split == 0 { 0 } else { 1u64 << (63 - split.leading_zeros()) };
        if start.is_power_of_two() && start <= size {
            let window: Vec<_> = events
                .iter()
                .filter(|e| e.num_leaves_after >= start)
                .copied()
                .collect();
            prop_assert_eq!(Accumulator::from_events(&window), Ok(acc));
        }
    }

    #[test]
    fn test_random_prove_next(count in 0u64..700) {
        let (acc, _) = append_all(count);
        let next = leaf_from_u64(count);
        let proof = acc.prove_next(next).expect("prove next");
        let mut after = acc.clone();
        after.append(next).expect("append");
        prop_assert_eq!(Ok(proof.root_hash), after.root());
        prop_assert!(proof.verify());
    }
}
