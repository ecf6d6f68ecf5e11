//! Node addressing and tree-size arithmetic.
//!
//! A node is addressed by its level and the index of the rightmost leaf it
//! covers. Leaves sit at level 0, so the leaf at index `i` is `(0, i)`. The
//! parent of two level-`l` siblings ending at `x` and `x | 2^l` is
//! `(l + 1, x | 2^l)`.

use bincode::{Decode, Encode};

use crate::{Error, Result};

/// Length in bytes of an encoded [`NodeAddress`].
pub const NODE_KEY_LEN: usize = 16;

/// Position of a node in the tree: `(level, rightmost leaf index)`.
///
/// Ordering is by level first, then by leaf, which matches the order of
/// encoded keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct NodeAddress {
    /// Height above the leaves; leaves are level 0.
    pub level: u64,
    /// Index of the rightmost leaf covered by the node.
    pub leaf: u64,
}

impl NodeAddress {
    /// Create an address from its level and rightmost leaf.
    pub const fn new(level: u64, leaf: u64) -> Self {
        NodeAddress { level, leaf }
    }

    /// The address of the leaf at `index`.
    pub const fn leaf(index: u64) -> Self {
        NodeAddress {
            level: 0,
            leaf: index,
        }
    }

    /// Encode as the canonical 16-byte key.
    ///
    /// Format: level as u64 big-endian (8 bytes) followed by leaf as u64
    /// big-endian (8 bytes), so keys sort by level then leaf.
    pub fn encode(&self) -> [u8; NODE_KEY_LEN] {
        let mut key = [0u8; NODE_KEY_LEN];
        key[..8].copy_from_slice(&self.level.to_be_bytes());
        key[8..].copy_from_slice(&self.leaf.to_be_bytes());
        key
    }

    /// Decode a key produced by [`NodeAddress::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let key: &[u8; NODE_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::MalformedAddress { len: bytes.len() })?;
        let mut level = [0u8; 8];
        let mut leaf = [0u8; 8];
        level.copy_from_slice(&key[..8]);
        leaf.copy_from_slice(&key[8..]);
        Ok(NodeAddress {
            level: u64::from_be_bytes(level),
            leaf: u64::from_be_bytes(leaf),
        })
    }
}

/// Number of levels in a tree of `size` leaves: the bit length of `size`.
///
/// For a power of two `2^k` this is `k + 1` (the root sits at level `k`);
/// for any other size it is the level of the padded root.
pub fn tree_levels(size: u64) -> u64 {
    (u64::BITS - size.leading_zeros()) as u64
}

/// Whether a tree of `size` leaves is a single complete subtree.
pub fn is_balanced(size: u64) -> bool {
    size.is_power_of_two()
}

/// Number of sibling digests in an inclusion proof for a tree of `size`
/// leaves.
pub fn walk_levels(size: u64) -> u64 {
    tree_levels(size) - is_balanced(size) as u64
}

/// Addresses of the sibling nodes an inclusion proof for `leaf_index` needs
/// in a tree of `size` leaves, lowest level first.
///
/// The walk climbs by setting one bit of the position per level, so at each
/// level the position is the rightmost leaf of the current node and flipping
/// the level bit gives the rightmost leaf of its sibling.
pub fn sibling_addresses(leaf_index: u64, size: u64) -> Vec<NodeAddress> {
    let mut place = leaf_index;
    (0..walk_levels(size))
        .map(|level| {
            let bit = 1u64 << level;
            let sibling = NodeAddress::new(level, place ^ bit);
            place |= bit;
            sibling
        })
        .collect()
}

/// Addresses of the accumulator partials of a tree with `size` leaves,
/// highest level first.
///
/// Each set bit `i` of `size` is a complete subtree of `2^i` leaves; its
/// address ends at the running sum of the bits above and including it.
pub fn partial_addresses(size: u64) -> Vec<NodeAddress> {
    let mut addresses = Vec::with_capacity(size.count_ones() as usize);
    let mut total = 0u64;
    for level in (0..tree_levels(size)).rev() {
        let power = 1u64 << level;
        if size & power != 0 {
            total += power;
            addresses.push(NodeAddress::new(level, total - 1));
        }
    }
    addresses
}
