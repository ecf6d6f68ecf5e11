//! Append-only Merkle accumulator with inclusion proofs against historical
//! roots.
//!
//! An [`Accumulator`] summarizes an append-only sequence of leaf digests with
//! one partial digest per set bit of its size. Every node created along the
//! way is reported as a [`NodeEvent`], which an external log indexes by
//! [`NodeAddress`]. Later, with only a `(root, size)` pair recorded at some
//! earlier point and a [`NodeLookup`] over that index, [`MerkleProof::generate`]
//! proves any leaf that existed at that size, even though the log has grown
//! since and the tree no longer has the same shape.
//!
//! # Core types
//!
//! - [`Accumulator`]: append, root, partials, proof of the next append.
//! - [`MerkleTree`]: explicit tree built from partials, leaves or events.
//! - [`MerkleProof`]: generate against a historical root, verify.
//! - [`NodeAddress`]: `(level, rightmost leaf)` and its 16-byte key.
//! - [`Digest`]: 32-byte Blake3 digest; [`Digest::ZERO`] marks empty
//!   subtrees.
//!
//! # Lookup
//!
//! - [`NodeLookup`]: batched read access to the external node store.
//! - [`MemNodeStore`]: in-memory store (requires `mem_store` feature).

#![warn(missing_docs)]

mod accumulator;
/// Node addressing and tree-size arithmetic.
pub mod address;
mod digest;
mod error;
mod lookup;
/// In-memory node store (requires `mem_store` feature).
#[cfg(any(test, feature = "mem_store"))]
pub mod mem_store;
mod proof;
/// Tree materialization and event replay.
pub mod tree;
#[cfg(test)]
mod tests;

pub use accumulator::{Accumulator, NodeEvent, Partials};
pub use address::{NODE_KEY_LEN, NodeAddress};
pub use digest::{Digest, hash_pair};
pub use error::{Error, Result};
pub use lookup::NodeLookup;
#[cfg(any(test, feature = "mem_store"))]
pub use mem_store::MemNodeStore;
pub use proof::MerkleProof;
pub use tree::MerkleTree;
