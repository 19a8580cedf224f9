//! Content hashes and typed domain separators.
//!
//! Every hash in the workspace is SHA-256 over `domain_prefix || data`, where
//! the prefix is selected through [`HashDomain`]. Archive chain hashing lives
//! in `migrant-archive` but takes its prefixes from here.

use sha2::{Digest, Sha256};

/// Typed domain separator. Each variant maps to a unique, null-terminated
/// byte string used as the SHA-256 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashDomain {
    /// Archive chain seed (`magic || version`).
    ArchiveSeed,
    /// Archive chain step over one framed entry.
    ArchiveChain,
    /// Content hash of a single archive entry (diagnostics, `inspect`).
    ArchiveEntry,
}

impl HashDomain {
    /// All domains in declaration order.
    pub const ALL: &'static [HashDomain] =
        &[Self::ArchiveSeed, Self::ArchiveChain, Self::ArchiveEntry];

    /// The raw domain-separator bytes (null-terminated).
    #[must_use]
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::ArchiveSeed => b"MIGRANT::ARCHIVE_SEED::V1\0",
            Self::ArchiveChain => b"MIGRANT::ARCHIVE_CHAIN::V1\0",
            Self::ArchiveEntry => b"MIGRANT::ARCHIVE_ENTRY::V1\0",
        }
    }
}

/// A content-addressed hash, rendered as `"algorithm:hex_digest"`
/// (e.g., `"sha256:abcdef..."`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Build a `sha256:` hash from a raw 32-byte digest.
    #[must_use]
    pub fn from_sha256(raw: &[u8; 32]) -> Self {
        Self(format!("sha256:{}", hex::encode(raw)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of `domain || data`, as raw bytes.
#[must_use]
pub fn raw_hash(domain: HashDomain, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// SHA-256 of `domain || data`, as a [`ContentHash`].
#[must_use]
pub fn canonical_hash(domain: HashDomain, data: &[u8]) -> ContentHash {
    ContentHash::from_sha256(&raw_hash(domain, data))
}
