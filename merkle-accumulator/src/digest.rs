//! 32-byte node digests and the Blake3 pair hash.
//!
//! Internal nodes hash as `blake3(left || right)` with no domain tag. Leaves
//! are digests supplied by the caller and are never hashed again.

use std::fmt;

use bincode::{Decode, Encode};

/// A 32-byte node digest.
///
/// [`Digest::ZERO`] is reserved as the "empty subtree" sentinel and is never
/// the hash of real content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The all-zero digest standing for an empty or unknown subtree.
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    /// Hash arbitrary bytes into a leaf digest: `blake3(data)`.
    pub fn hash_bytes(data: &[u8]) -> Self {
        Digest(*blake3::hash(data).as_bytes())
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Consume the digest and return its bytes.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Whether this is the empty-subtree sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// Combine two sibling digests into their parent: `blake3(left || right)`.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(&left.0);
    input[32..].copy_from_slice(&right.0);
    Digest(*blake3::hash(&input).as_bytes())
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }
}

impl From<Digest> for [u8; 32] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}
