//! Explicit Merkle trees built from accumulator partials, leaves, or replayed
//! node events.
//!
//! Trees are padded on the right with [`MerkleTree::Empty`] subtrees, which
//! hash to [`Digest::ZERO`], so that every internal node joins two children of
//! equal power-of-two capacity.
//!
//! # Event replay
//!
//! [`accumulator_from_events`] turns a window of the append-only event log
//! into the accumulator state at the end of that window:
//!
//! 1. keep the latest event seen at each level;
//! 2. walk levels from highest to lowest, keeping an event only when it was
//!    emitted after every event kept above it (a later append that carried
//!    through a level empties it, and re-emits at a higher level with the same
//!    leaf count);
//! 3. the kept events are the partials.
//!
//! Each kept event must end exactly where the partials above it stop plus its
//! own `2^level` leaves. A window that does not reach back far enough to see
//! every live partial fails that check and is rejected.

use tracing::debug;

use crate::{
    Accumulator, Digest, Error, MerkleProof, Result,
    accumulator::{NodeEvent, Partials},
    digest::hash_pair,
};

/// A Merkle tree whose subtrees may be materialized, summarized, or empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MerkleTree {
    /// An empty subtree standing for `capacity` not-yet-appended leaves.
    Empty {
        /// Number of leaf slots the empty subtree spans.
        capacity: u128,
    },
    /// A single leaf digest.
    Leaf(Digest),
    /// A complete subtree known only by its root digest.
    Summary {
        /// Root digest of the collapsed subtree.
        hash: Digest,
        /// Number of leaves the subtree holds (a power of two).
        capacity: u128,
    },
    /// An internal node owning both children; `left` covers the lower
    /// leaf range.
    Internal {
        /// `hash_pair(left.hash(), right.hash())`.
        hash: Digest,
        /// Sum of the children's capacities.
        capacity: u128,
        /// Number of real leaves below this node.
        size: u64,
        /// Lower half.
        left: Box<MerkleTree>,
        /// Upper half.
        right: Box<MerkleTree>,
    },
}

impl MerkleTree {
    /// Join two subtrees under a new internal node.
    pub fn internal(left: MerkleTree, right: MerkleTree) -> Self {
        MerkleTree::Internal {
            hash: hash_pair(&left.hash(), &right.hash()),
            capacity: left.capacity() + right.capacity(),
            size: left.size().saturating_add(right.size()),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// The digest of this subtree. Empty subtrees hash to zero.
    pub fn hash(&self) -> Digest {
        match self {
            MerkleTree::Empty { .. } => Digest::ZERO,
            MerkleTree::Leaf(hash) => *hash,
            MerkleTree::Summary { hash, .. } | MerkleTree::Internal { hash, .. } => *hash,
        }
    }

    /// Number of leaf slots this subtree spans.
    pub fn capacity(&self) -> u128 {
        match self {
            MerkleTree::Leaf(_) => 1,
            MerkleTree::Empty { capacity }
            | MerkleTree::Summary { capacity, .. }
            | MerkleTree::Internal { capacity, .. } => *capacity,
        }
    }

    /// Number of real (appended) leaves below this subtree.
    pub fn size(&self) -> u64 {
        match self {
            MerkleTree::Empty { .. } => 0,
            MerkleTree::Leaf(_) => 1,
            MerkleTree::Summary { capacity, .. } => u64::try_from(*capacity).unwrap_or(u64::MAX),
            MerkleTree::Internal { size, .. } => *size,
        }
    }

    /// Build the tree described by an accumulator's partials.
    ///
    /// Level 0 becomes a [`MerkleTree::Leaf`], higher levels a
    /// [`MerkleTree::Summary`]. Each higher partial holds older leaves than
    /// everything below it, so it becomes the left child of the tree built so
    /// far, after that tree is padded with empty right siblings up to the
    /// partial's capacity. Returns an empty tree of capacity 0 when no level
    /// is occupied.
    pub fn from_partials(partials: &[Option<Digest>]) -> Self {
        let mut tree: Option<MerkleTree> = None;
        let mut capacity: u128 = 1;
        for (level, partial) in partials.iter().enumerate() {
            if let Some(hash) = partial {
                let this_level = if level == 0 {
                    MerkleTree::Leaf(*hash)
                } else {
                    MerkleTree::Summary {
                        hash: *hash,
                        capacity,
                    }
                };
                tree = Some(match tree.take() {
                    None => this_level,
                    Some(mut so_far) => {
                        while so_far.capacity() < capacity {
                            let padding = MerkleTree::Empty {
                                capacity: so_far.capacity(),
                            };
                            so_far = MerkleTree::internal(so_far, padding);
                        }
                        MerkleTree::internal(this_level, so_far)
                    }
                });
            }
            capacity <<= 1;
        }
        tree.unwrap_or(MerkleTree::Empty { capacity: 0 })
    }

    /// Build a fully materialized tree over `leaves`, padded on the right to
    /// the next power of two.
    pub fn from_leaves(leaves: &[Digest]) -> Self {
        if leaves.is_empty() {
            return MerkleTree::Empty { capacity: 0 };
        }
        let capacity = (leaves.len() as u128).next_power_of_two();
        build_from_leaves(leaves, capacity)
    }

    /// Replay a window of node events into a tree of summaries.
    pub fn from_events(events: &[NodeEvent]) -> Result<Self> {
        accumulator_from_events(events).map(|acc| acc.tree())
    }

    /// Prove the leaf at `leaf_index` from the materialized structure.
    ///
    /// Returns `None` when the index is out of range or falls inside a
    /// summary or empty subtree, whose leaves are not known.
    pub fn prove(&self, leaf_index: u64) -> Option<MerkleProof> {
        let mut siblings = Vec::new();
        let leaf_hash = self.collect_siblings(leaf_index as u128, &mut siblings)?;
        Some(MerkleProof::new(self.hash(), leaf_hash, leaf_index, siblings))
    }

    // Descend to the leaf and push sibling hashes on the way back up, so the
    // lowest level ends up first.
    fn collect_siblings(&self, index: u128, siblings: &mut Vec<Digest>) -> Option<Digest> {
        match self {
            MerkleTree::Leaf(hash) if index == 0 => Some(*hash),
            MerkleTree::Internal { left, right, .. } => {
                let half = left.capacity();
                if index < half {
                    let leaf = left.collect_siblings(index, siblings)?;
                    siblings.push(right.hash());
                    Some(leaf)
                } else {
                    let leaf = right.collect_siblings(index - half, siblings)?;
                    siblings.push(left.hash());
                    Some(leaf)
                }
            }
            _ => None,
        }
    }
}

fn build_from_leaves(leaves: &[Digest], capacity: u128) -> MerkleTree {
    if leaves.is_empty() {
        return MerkleTree::Empty { capacity };
    }
    if capacity == 1 {
        return MerkleTree::Leaf(leaves[0]);
    }
    let half = capacity / 2;
    let split = leaves.len().min(half as usize);
    let (left, right) = leaves.split_at(split);
    MerkleTree::internal(
        build_from_leaves(left, half),
        build_from_leaves(right, half),
    )
}

/// Rebuild the accumulator as of the end of an ordered event window.
///
/// Fails with [`Error::MalformedEvents`] if an event is impossible on its own
/// (level of 64 or more, zero digest, leaf count that is zero or not a
/// multiple of `2^level`), if leaf counts go backwards along the window, or if
/// the surviving events do not tile the leaves without gaps.
pub fn accumulator_from_events(events: &[NodeEvent]) -> Result<Accumulator> {
    let mut latest: Vec<Option<&NodeEvent>> = Vec::new();
    let mut previous = 0u64;
    for event in events {
        let malformed = |reason: String| Error::MalformedEvents {
            level: event.level,
            reason,
        };
        if event.level >= u64::BITS as u64 {
            return Err(malformed("level must be below 64".into()));
        }
        let span = 1u64 << event.level;
        if event.num_leaves_after == 0 || event.num_leaves_after % span != 0 {
            return Err(malformed(format!(
                "leaf count {} cannot end a subtree of {} leaves",
                event.num_leaves_after, span
            )));
        }
        if event.hash.is_zero() {
            return Err(malformed("node digest is zero".into()));
        }
        if event.num_leaves_after < previous {
            return Err(malformed(format!(
                "leaf count goes back from {} to {}",
                previous, event.num_leaves_after
            )));
        }
        previous = event.num_leaves_after;

        let level = event.level as usize;
        if latest.len() <= level {
            latest.resize(level + 1, None);
        }
        latest[level] = Some(event);
    }

    let mut partials: Partials = vec![None; latest.len()];
    let mut latest_seen = 0u64;
    let mut covered = 0u64;
    for (level, event) in latest.iter().enumerate().rev() {
        let Some(event) = event else {
            continue;
        };
        if event.num_leaves_after <= latest_seen {
            continue;
        }
        latest_seen = event.num_leaves_after;
        covered = covered
            .checked_add(1u64 << level)
            .filter(|covered| *covered == event.num_leaves_after)
            .ok_or_else(|| Error::MalformedEvents {
                level: level as u64,
                reason: format!(
                    "node ends at leaf count {} but the partials above it end at {}",
                    event.num_leaves_after, covered
                ),
            })?;
        partials[level] = Some(event.hash);
    }

    let accumulator = Accumulator::from_partials(partials)?;
    debug!(
        events = events.len(),
        size = accumulator.size(),
        "replayed node events into accumulator"
    );
    Ok(accumulator)
}
