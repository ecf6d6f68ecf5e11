use std::collections::{BTreeMap, BTreeSet};

use crate::{Digest, NodeAddress, Result};

/// Batched read access to the external node store.
///
/// An implementation receives every address a proof needs in one call and
/// returns the digests it knows. Addresses it has no entry for are simply
/// left out of the returned map; only a failure of the store itself should be
/// reported as an error (typically [`crate::Error::Lookup`]).
///
/// The store is expected to index nodes by [`NodeAddress::encode`] so the
/// whole batch can be answered by one equality-filter query.
pub trait NodeLookup {
    /// Look up the digests stored at `addresses`.
    fn lookup(&self, addresses: &BTreeSet<NodeAddress>) -> Result<BTreeMap<NodeAddress, Digest>>;
}

impl<F> NodeLookup for F
where
    F: Fn(&BTreeSet<NodeAddress>) -> Result<BTreeMap<NodeAddress, Digest>>,
{
    fn lookup(&self, addresses: &BTreeSet<NodeAddress>) -> Result<BTreeMap<NodeAddress, Digest>> {
        self(addresses)
    }
}
