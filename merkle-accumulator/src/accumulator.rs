//! Append-only Merkle accumulator.
//!
//! The accumulator keeps one optional digest ("partial") per level. Level `i`
//! is occupied iff bit `i` of the leaf count is set, and then holds the root of
//! the complete `2^i`-leaf subtree that follows every leaf already folded into
//! the higher partials. Appending a leaf is a binary increment: occupied
//! levels are carried upward by hashing them with the incoming subtree.

use bincode::{Decode, Encode};

use crate::{
    Digest, Error, MerkleProof, MerkleTree, NodeAddress, Result, address::tree_levels,
    digest::hash_pair,
};

/// Per-level partial digests, indexed by level.
///
/// A valid snapshot has no trailing `None` and at most 64 slots.
pub type Partials = Vec<Option<Digest>>;

/// A node created by an append, as recorded in the external event log.
///
/// The node sits at `level` and covers the `2^level` leaves ending at
/// `num_leaves_after - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct NodeEvent {
    /// Level of the created node; leaves are level 0.
    pub level: u64,
    /// Accumulator size right after the append that created the node.
    pub num_leaves_after: u64,
    /// Digest of the created node.
    pub hash: Digest,
}

impl NodeEvent {
    /// The address this event's node is stored under.
    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.level, self.num_leaves_after.saturating_sub(1))
    }
}

/// An append-only Merkle accumulator holding O(log n) partial digests.
///
/// Cloning copies only the partials vector, so a clone is a cheap throwaway
/// branch for "what if one more leaf were appended" questions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accumulator {
    size: u64,
    partials: Partials,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume an accumulator from a partials snapshot.
    ///
    /// The size is the sum of `2^i` over occupied levels. Fails with
    /// [`Error::InvalidPartials`] when the highest slot is empty, a slot holds
    /// the zero digest, or there are more than 64 levels.
    pub fn from_partials(partials: Partials) -> Result<Self> {
        if partials.len() > u64::BITS as usize {
            return Err(Error::InvalidPartials(format!(
                "{} levels exceed the 64 levels a u64 size can describe",
                partials.len()
            )));
        }
        if let Some(None) = partials.last() {
            return Err(Error::InvalidPartials(format!(
                "highest level {} is empty",
                partials.len() - 1
            )));
        }
        let mut size = 0u64;
        for (level, partial) in partials.iter().enumerate() {
            match partial {
                Some(digest) if digest.is_zero() => {
                    return Err(Error::InvalidPartials(format!(
                        "level {} holds the zero digest",
                        level
                    )));
                }
                Some(_) => size |= 1u64 << level,
                None => {}
            }
        }
        Ok(Accumulator { size, partials })
    }

    /// Number of leaves appended so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if no leaf has been appended.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// A copy of the current partials.
    pub fn partials(&self) -> Partials {
        self.partials.clone()
    }

    /// Append a leaf digest and return the new size.
    pub fn append(&mut self, leaf: Digest) -> Result<u64> {
        self.append_with_events(leaf).map(|(size, _)| size)
    }

    /// Append a leaf digest, returning the new size and the node events the
    /// append produced.
    ///
    /// The first event is the leaf itself at level 0; each carry adds the
    /// parent it created. Together these are every node an external store
    /// needs to answer lookups for positions up to the new size.
    pub fn append_with_events(&mut self, leaf: Digest) -> Result<(u64, Vec<NodeEvent>)> {
        let size = self.size.checked_add(1).ok_or(Error::Overflow)?;
        let mut events = vec![NodeEvent {
            level: 0,
            num_leaves_after: size,
            hash: leaf,
        }];
        let mut carry = leaf;
        let mut level = 0usize;
        loop {
            if level == self.partials.len() {
                self.partials.push(Some(carry));
                break;
            }
            match self.partials[level].take() {
                Some(partial) => {
                    carry = hash_pair(&partial, &carry);
                    level += 1;
                    events.push(NodeEvent {
                        level: level as u64,
                        num_leaves_after: size,
                        hash: carry,
                    });
                }
                None => {
                    self.partials[level] = Some(carry);
                    break;
                }
            }
        }
        self.size = size;
        debug_assert_eq!(self.partials.len() as u64, tree_levels(size));
        Ok((size, events))
    }

    /// The root digest of all leaves appended so far.
    ///
    /// When the size is a power of two this is the single partial. Otherwise
    /// the partials are materialized into a [`MerkleTree`] padded with empty
    /// subtrees and its root is returned.
    pub fn root(&self) -> Result<Digest> {
        if self.size == 0 {
            return Err(Error::EmptyTree);
        }
        if self.size.is_power_of_two() {
            if let Some(Some(root)) = self.partials.last() {
                return Ok(*root);
            }
        }
        Ok(self.tree().hash())
    }

    /// Materialize the partials as a tree of summaries.
    pub fn tree(&self) -> MerkleTree {
        MerkleTree::from_partials(&self.partials)
    }

    /// Rebuild the accumulator state from a window of node events.
    ///
    /// See [`crate::tree`] for the replay rules.
    pub fn from_events(events: &[NodeEvent]) -> Result<Self> {
        crate::tree::accumulator_from_events(events)
    }

    /// Prove that `next_leaf`, if appended now, is included at index `size`
    /// under the root the accumulator would then have.
    ///
    /// The canonical accumulator is not modified; the append happens on a
    /// clone.
    pub fn prove_next(&self, next_leaf: Digest) -> Result<MerkleProof> {
        let mut branch = self.clone();
        branch.append(next_leaf)?;
        let root_hash = branch.root()?;
        let proof_hashes = self
            .partials
            .iter()
            .map(|partial| partial.unwrap_or(Digest::ZERO))
            .collect();
        Ok(MerkleProof::new(root_hash, next_leaf, self.size, proof_hashes))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn leaf(i: u64) -> Digest {
        Digest::hash_bytes(&i.to_le_bytes())
    }

    fn accumulator_of(count: u64) -> Accumulator {
        let mut acc = Accumulator::new();
        for i in 0..count {
            acc.append(leaf(i)).expect("append");
        }
        acc
    }

    #[test]
    fn test_occupied_levels_track_size_bits() {
        let mut acc = Accumulator::new();
        for i in 0..4096u64 {
            let size = acc.append(leaf(i)).expect("append");
            assert_eq!(size, i + 1);
            for (level, partial) in acc.partials().iter().enumerate() {
                assert_eq!(
                    partial.is_some(),
                    size & (1 << level) != 0,
                    "size {} level {}",
                    size,
                    level
                );
            }
            assert_eq!(acc.partials().len() as u64, tree_levels(size));
        }
    }

    #[test]
    fn test_two_leaves_carry_into_level_one() {
        let acc = accumulator_of(2);
        assert_eq!(
            acc.partials(),
            vec![None, Some(hash_pair(&leaf(0), &leaf(1)))]
        );
        assert_eq!(acc.root(), Ok(hash_pair(&leaf(0), &leaf(1))));
    }

    #[test]
    fn test_root_of_unbalanced_size_pads_with_zero() {
        let acc = accumulator_of(3);
        let left = hash_pair(&leaf(0), &leaf(1));
        let right = hash_pair(&leaf(2), &Digest::ZERO);
        assert_eq!(acc.root(), Ok(hash_pair(&left, &right)));
    }

    #[test]
    fn test_root_on_empty() {
        assert_eq!(Accumulator::new().root(), Err(Error::EmptyTree));
    }

    #[test]
    fn test_append_events() {
        let mut acc = accumulator_of(3);
        let (size, events) = acc.append_with_events(leaf(3)).expect("append");
        assert_eq!(size, 4);
        let l23 = hash_pair(&leaf(2), &leaf(3));
        let l0123 = hash_pair(&hash_pair(&leaf(0), &leaf(1)), &l23);
        assert_eq!(
            events,
            vec![
                NodeEvent {
                    level: 0,
                    num_leaves_after: 4,
                    hash: leaf(3)
                },
                NodeEvent {
                    level: 1,
                    num_leaves_after: 4,
                    hash: l23
                },
                NodeEvent {
                    level: 2,
                    num_leaves_after: 4,
                    hash: l0123
                },
            ]
        );
        assert_eq!(events[2].address(), NodeAddress::new(2, 3));
        assert_eq!(acc.root(), Ok(l0123));
    }

    #[test]
    fn test_append_overflow() {
        let mut partials: Partials = vec![Some(leaf(0)); 64];
        partials[63] = Some(leaf(63));
        let mut acc = Accumulator::from_partials(partials).expect("full accumulator");
        assert_eq!(acc.size(), u64::MAX);
        let before = acc.clone();
        assert_eq!(acc.append(leaf(64)), Err(Error::Overflow));
        assert_eq!(acc, before, "failed append must not change state");
    }

    #[test]
    fn test_from_partials_roundtrip() {
        for count in [1u64, 2, 5, 6, 7, 8, 100] {
            let acc = accumulator_of(count);
            let resumed = Accumulator::from_partials(acc.partials()).expect("resume");
            assert_eq!(resumed.size(), count);
            assert_eq!(resumed, acc);
        }
        assert_eq!(Accumulator::from_partials(vec![]), Ok(Accumulator::new()));
    }

    #[test]
    fn test_from_partials_rejects_trailing_empty() {
        assert_matches!(
            Accumulator::from_partials(vec![Some(leaf(0)), None]),
            Err(Error::InvalidPartials(_))
        );
    }

    #[test]
    fn test_from_partials_rejects_zero_digest() {
        assert_matches!(
            Accumulator::from_partials(vec![Some(Digest::ZERO), Some(leaf(1))]),
            Err(Error::InvalidPartials(_))
        );
    }

    #[test]
    fn test_from_partials_rejects_too_many_levels() {
        assert_matches!(
            Accumulator::from_partials(vec![Some(leaf(0)); 65]),
            Err(Error::InvalidPartials(_))
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let acc = accumulator_of(5);
        let mut branch = acc.clone();
        branch.append(leaf(5)).expect("append to clone");
        assert_eq!(acc.size(), 5);
        assert_eq!(branch.size(), 6);
        assert_ne!(acc.partials(), branch.partials());
        assert_eq!(acc, accumulator_of(5));
    }

    #[test]
    fn test_prove_next_verifies_against_appended_root() {
        for count in 0u64..40 {
            let acc = accumulator_of(count);
            let proof = acc.prove_next(leaf(count)).expect("prove next");
            assert_eq!(proof.leaf_index, count);
            assert!(proof.verify(), "proof of next append at size {}", count);
            assert_eq!(Ok(proof.root_hash), accumulator_of(count + 1).root());
            assert_eq!(acc.size(), count, "prove_next must not mutate");
        }
    }
}
