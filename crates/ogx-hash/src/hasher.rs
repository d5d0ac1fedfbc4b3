use ogx_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"ogx-record-v1"`) that is
/// prepended to every hash computation. This prevents cross-purpose hash
/// collisions: a record payload and a cycle digest derived from identical
/// bytes will never produce the same id.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for record payloads (canonical tag + attributes).
    pub const RECORD: Self = Self {
        domain: "ogx-record-v1",
    };
    /// Hasher for cycle digests and the member ids derived from them.
    pub const CYCLE: Self = Self {
        domain: "ogx-cycle-v1",
    };
    /// Hasher for the slot placeholders that stand in for intra-cycle
    /// references while a cycle's canonical form is computed.
    pub const CYCLE_SLOT: Self = Self {
        domain: "ogx-cycle-slot-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from canonical encoding and hashing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("canonical encoding error: {0}")]
    Encoding(String),
}
