//! Inclusion proofs against historical roots.
//!
//! A proof is built from nothing but a `(root, size)` pair recorded at some
//! point in the past and a [`NodeLookup`] over the node store, which may since
//! have grown far past that size. Nodes that existed at the historical size
//! are looked up directly. The right-hand boundary of an unbalanced tree,
//! which never existed as stored nodes, is recomputed by walking up from the
//! lowest partial (the "frontier walk").

use std::collections::{BTreeMap, BTreeSet};

use bincode::{Decode, Encode};
use tracing::{debug, trace, warn};

use crate::{
    Digest, Error, NodeAddress, NodeLookup, Result,
    address::{is_balanced, partial_addresses, sibling_addresses, tree_levels},
    digest::hash_pair,
};

/// Decoding refuses inputs whose length headers claim more than this.
const DECODE_LIMIT: usize = 1024 * 1024;

/// A single-leaf inclusion proof.
///
/// `proof_hashes[i]` is the sibling digest at level `i` on the path from the
/// leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct MerkleProof {
    /// Root the proof commits to.
    pub root_hash: Digest,
    /// Digest of the proved leaf.
    pub leaf_hash: Digest,
    /// Zero-based position of the leaf in append order.
    pub leaf_index: u64,
    /// Sibling digests, lowest level first.
    pub proof_hashes: Vec<Digest>,
}

impl MerkleProof {
    /// Assemble a proof from its parts.
    pub fn new(
        root_hash: Digest,
        leaf_hash: Digest,
        leaf_index: u64,
        proof_hashes: Vec<Digest>,
    ) -> Self {
        MerkleProof {
            root_hash,
            leaf_hash,
            leaf_index,
            proof_hashes,
        }
    }

    /// Build a proof that leaf `leaf_index` is included under the historical
    /// `root_hash` of a tree that had `tree_size` leaves.
    ///
    /// Issues exactly one `lookup` call covering the leaf, every sibling that
    /// already existed at `tree_size`, and (for unbalanced sizes) every
    /// partial. Siblings past `tree_size` are reconstructed by the frontier
    /// walk.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if `tree_size` is 0 or `leaf_index` is out of
    ///   range.
    /// - [`Error::MissingFrontierNode`] if a partial needed by the frontier
    ///   walk was not returned.
    /// - [`Error::IncompleteProof`] if the leaf or a sibling was not returned.
    /// - [`Error::RootMismatch`] if the nodes found do not hash to
    ///   `root_hash`.
    /// - whatever the lookup itself returns.
    pub fn generate<L>(
        leaf_index: u64,
        root_hash: Digest,
        tree_size: u64,
        lookup: &L,
    ) -> Result<Self>
    where
        L: NodeLookup + ?Sized,
    {
        if tree_size == 0 {
            return Err(Error::InvalidInput(
                "cannot prove a leaf of an empty tree".into(),
            ));
        }
        if leaf_index >= tree_size {
            return Err(Error::InvalidInput(format!(
                "leaf index {} out of range (tree_size={})",
                leaf_index, tree_size
            )));
        }

        let balanced = is_balanced(tree_size);
        let leaf_address = NodeAddress::leaf(leaf_index);
        let nodes = sibling_addresses(leaf_index, tree_size);
        let partials = if balanced {
            Vec::new()
        } else {
            partial_addresses(tree_size)
        };

        // siblings at or past tree_size did not exist yet and are never queried
        let mut query = BTreeSet::new();
        query.insert(leaf_address);
        query.extend(nodes.iter().filter(|node| node.leaf < tree_size));
        query.extend(partials.iter().copied());

        debug!(
            leaf_index,
            tree_size,
            balanced,
            proof_levels = nodes.len(),
            queried = query.len(),
            "looking up proof nodes"
        );
        let mut known = lookup.lookup(&query)?;
        known.retain(|address, _| query.contains(address));

        if !balanced {
            let computed = walk_frontier(&mut known, &partials, tree_levels(tree_size))?;
            if computed != root_hash {
                warn!(
                    tree_size,
                    %root_hash,
                    %computed,
                    "frontier walk does not reproduce the historical root"
                );
                return Err(Error::RootMismatch {
                    expected: root_hash,
                    computed,
                });
            }
        }

        let leaf_hash = known
            .get(&leaf_address)
            .copied()
            .ok_or(Error::IncompleteProof {
                address: leaf_address,
            })?;
        let proof_hashes = nodes
            .iter()
            .map(|address| {
                known
                    .get(address)
                    .copied()
                    .ok_or(Error::IncompleteProof { address: *address })
            })
            .collect::<Result<Vec<_>>>()?;

        let proof = MerkleProof::new(root_hash, leaf_hash, leaf_index, proof_hashes);
        let computed = proof.calculate_root();
        if computed != root_hash {
            warn!(
                leaf_index,
                tree_size,
                %root_hash,
                %computed,
                "assembled proof does not reproduce the historical root"
            );
            return Err(Error::RootMismatch {
                expected: root_hash,
                computed,
            });
        }
        Ok(proof)
    }

    /// Recompute the root from the leaf, its index and the sibling digests.
    pub fn calculate_root(&self) -> Digest {
        let mut hash = self.leaf_hash;
        let mut index = self.leaf_index;
        for sibling in &self.proof_hashes {
            hash = if index & 1 == 0 {
                hash_pair(&hash, sibling)
            } else {
                hash_pair(sibling, &hash)
            };
            index >>= 1;
        }
        hash
    }

    /// Check the proof against its own `root_hash`.
    ///
    /// A leaf index that does not fit in `proof_hashes.len()` bits cannot sit
    /// under a root that many levels up, so such a proof is rejected without
    /// hashing.
    pub fn verify(&self) -> bool {
        let depth = self.proof_hashes.len();
        if depth < u64::BITS as usize && self.leaf_index >> depth != 0 {
            return false;
        }
        self.calculate_root() == self.root_hash
    }

    /// Serialize this proof to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_no_limit();
        bincode::encode_to_vec(self, config)
            .map_err(|e| Error::InvalidData(format!("failed to encode MerkleProof: {}", e)))
    }

    /// Deserialize a proof from bytes.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<DECODE_LIMIT>();
        let (proof, read) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| Error::InvalidData(format!("failed to decode MerkleProof: {}", e)))?;
        if read != bytes.len() {
            return Err(Error::InvalidData(format!(
                "{} trailing bytes after MerkleProof",
                bytes.len() - read
            )));
        }
        Ok(proof)
    }
}

/// Reconstruct the right boundary of an unbalanced tree and return its root.
///
/// `partials` are the partial addresses, highest level first. The walk starts
/// at the empty sibling just right of the lowest partial and climbs to
/// `levels`. At a level holding a partial the current node is that partial's
/// right sibling; at any other level it is the left child of an empty
/// subtree. Every node visited is written into `known`, so out-of-range
/// proof siblings resolve from the same map afterwards.
fn walk_frontier(
    known: &mut BTreeMap<NodeAddress, Digest>,
    partials: &[NodeAddress],
    levels: u64,
) -> Result<Digest> {
    let Some(lowest) = partials.last() else {
        return Err(Error::InvalidInput(
            "frontier walk needs at least one partial".into(),
        ));
    };
    let partial_levels: BTreeSet<u64> = partials.iter().map(|p| p.level).collect();

    let mut step = NodeAddress::new(lowest.level, lowest.leaf + (1u64 << lowest.level));
    known.insert(step, Digest::ZERO);

    let mut digest = Digest::ZERO;
    while step.level < levels {
        let current = *known
            .get(&step)
            .ok_or(Error::MissingFrontierNode { address: step })?;

        let (left, right) = if partial_levels.contains(&step.level) {
            step.leaf -= 1u64 << step.level;
            let partial = *known
                .get(&step)
                .ok_or(Error::MissingFrontierNode { address: step })?;
            (partial, current)
        } else {
            step.leaf += 1u64 << step.level;
            known.insert(step, Digest::ZERO);
            (current, Digest::ZERO)
        };

        step.level += 1;
        step.leaf |= 1u64 << (step.level - 1);
        digest = hash_pair(&left, &right);
        trace!(level = step.level, leaf = step.leaf, %digest, "frontier node");
        known.insert(step, digest);
    }
    Ok(digest)
}
