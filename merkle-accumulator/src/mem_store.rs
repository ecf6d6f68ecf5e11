use std::collections::{BTreeMap, BTreeSet};

use crate::{Digest, NodeAddress, NodeEvent, NodeLookup, Result};

/// In-memory node store keyed by the canonical 16-byte node key.
///
/// Stands in for the external event index in tests and benchmarks: feed it
/// the events returned by [`crate::Accumulator::append_with_events`] and it
/// answers proof lookups for any historical size.
#[derive(Clone, Debug, Default)]
pub struct MemNodeStore(BTreeMap<[u8; 16], Digest>);

impl MemNodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every event under its node address.
    pub fn record(&mut self, events: &[NodeEvent]) {
        for event in events {
            self.insert(event.address(), event.hash);
        }
    }

    /// Store `digest` under `address`, replacing any previous entry.
    pub fn insert(&mut self, address: NodeAddress, digest: Digest) {
        self.0.insert(address.encode(), digest);
    }

    /// Remove the entry at `address`, returning it if present.
    pub fn remove(&mut self, address: &NodeAddress) -> Option<Digest> {
        self.0.remove(&address.encode())
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl NodeLookup for MemNodeStore {
    fn lookup(&self, addresses: &BTreeSet<NodeAddress>) -> Result<BTreeMap<NodeAddress, Digest>> {
        addresses
            .iter()
            .filter_map(|address| self.0.get_key_value(&address.encode()))
            .map(|(key, digest)| Ok((NodeAddress::decode(key)?, *digest)))
            .collect()
    }
}
