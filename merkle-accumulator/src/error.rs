use thiserror::Error;

use crate::{Digest, NodeAddress};

/// Alias for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for accumulator, tree and proof operations.
///
/// Lookup-related variants carry the address that could not be resolved so a
/// stale or inconsistent node store can be diagnosed from the error alone.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The accumulator already holds `u64::MAX` leaves.
    #[error("accumulator is full, cannot append past u64::MAX leaves")]
    Overflow,
    /// Tried to compute the root of an accumulator with no leaves.
    #[error("root requested on an empty tree")]
    EmptyTree,
    /// A partials snapshot is structurally invalid.
    #[error("invalid partials: {0}")]
    InvalidPartials(String),
    /// An event window does not describe a consistent accumulator state.
    #[error("malformed events at level {level}: {reason}")]
    MalformedEvents {
        /// Level of the offending event.
        level: u64,
        /// What was inconsistent.
        reason: String,
    },
    /// A node key was not exactly 16 bytes long.
    #[error("malformed node address: expected 16 bytes, got {len}")]
    MalformedAddress {
        /// Length of the rejected byte string.
        len: usize,
    },
    /// The frontier walk reached a node whose digest is unknown.
    #[error("missing frontier node at level {} leaf {}", address.level, address.leaf)]
    MissingFrontierNode {
        /// Address that could not be resolved.
        address: NodeAddress,
    },
    /// A node required by the proof was neither looked up nor reconstructed.
    #[error("incomplete proof: no digest for level {} leaf {}", address.level, address.leaf)]
    IncompleteProof {
        /// Address that could not be resolved.
        address: NodeAddress,
    },
    /// The reconstructed root differs from the claimed historical root.
    #[error("root mismatch: expected {expected}, computed {computed}")]
    RootMismatch {
        /// The historical root supplied by the caller.
        expected: Digest,
        /// The root recomputed from looked-up nodes.
        computed: Digest,
    },
    /// The external node lookup failed.
    #[error("node lookup failed: {0}")]
    Lookup(String),
    /// Invalid input parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Invalid serialized data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
