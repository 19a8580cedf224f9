//! Constants, chain hashing, entry-name rules and errors shared by the
//! reader and writer.

use std::path::PathBuf;

use migrant_core::hash::{raw_hash, HashDomain};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Magic bytes and version
// ---------------------------------------------------------------------------

/// File magic bytes.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"MGAR";

/// Footer magic bytes (reverse of header magic, truncation sentinel).
pub const ARCHIVE_FOOTER_MAGIC: [u8; 4] = *b"RAGM";

/// Wire format version. Readers reject unknown versions.
pub const ARCHIVE_VERSION: u16 = 1;

/// Header size: magic + version.
pub const HEADER_SIZE: usize = 4 + 2;

/// Fixed footer size: `u64` entry count + 32-byte chain hash + 4-byte magic.
pub const FOOTER_SIZE: usize = 8 + 32 + 4;

/// Name of the entry holding the serialized migration container.
pub const CONTAINER_INDEX_ENTRY: &str = "container-index";

// ---------------------------------------------------------------------------
// Chain hashing
// ---------------------------------------------------------------------------

/// `h0 = sha256(ARCHIVE_SEED || magic || version)`
#[must_use]
pub(crate) fn chain_seed() -> [u8; 32] {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(&ARCHIVE_MAGIC);
    header.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
    raw_hash(HashDomain::ArchiveSeed, &header)
}

/// One incremental chain step:
/// `h_i = sha256(ARCHIVE_CHAIN || h_{i-1} || entry_frame_bytes)`.
///
/// Entry contents can be large, so the frame is fed in pieces as it streams.
pub(crate) struct ChainStep {
    hasher: Sha256,
}

impl ChainStep {
    pub(crate) fn begin(previous: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(HashDomain::ArchiveChain.as_bytes());
        hasher.update(previous);
        Self { hasher }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub(crate) fn finish(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.hasher.finalize());
        out
    }
}

/// Bytes of the frame preceding an entry's content.
pub(crate) fn frame_prefix(name: &str, content_len: u64) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(2 + name.len() + 8);
    #[allow(clippy::cast_possible_truncation)]
    let name_len = name.len() as u16;
    prefix.extend_from_slice(&name_len.to_le_bytes());
    prefix.extend_from_slice(name.as_bytes());
    prefix.extend_from_slice(&content_len.to_le_bytes());
    prefix
}

// ---------------------------------------------------------------------------
// Entry names
// ---------------------------------------------------------------------------

/// Check that `name` is a relative `/`-separated path that cannot escape the
/// directory it is extracted into.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidName`] describing the first violated rule.
pub fn validate_entry_name(name: &str) -> Result<(), ArchiveError> {
    let reject = |reason: &'static str| {
        Err(ArchiveError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject("empty name");
    }
    if name.len() > usize::from(u16::MAX) {
        return reject("name longer than u16::MAX bytes");
    }
    if name.starts_with('/') {
        return reject("absolute path");
    }
    if name.contains('\\') {
        return reject("backslash separator");
    }
    if name.chars().any(char::is_control) {
        return reject("control character");
    }
    for segment in name.split('/') {
        match segment {
            "" => return reject("empty path segment"),
            "." | ".." => return reject("relative path segment"),
            _ => {}
        }
    }
    Ok(())
}

/// Filesystem-relative path for a validated entry name.
#[must_use]
pub fn entry_relative_path(name: &str) -> PathBuf {
    name.split('/').collect()
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

/// What a finished write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entry_count: u64,
    pub chain_hash: [u8; 32],
}

/// Errors writing or reading an archive. Reads are fail-closed: any
/// structural or integrity violation rejects the whole file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error {context}: {detail}")]
    Io { context: String, detail: String },
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("duplicate entry name {name:?}")]
    DuplicateEntry { name: String },
    #[error("entry {name:?} changed size while being written: expected {expected} bytes, copied {actual}")]
    SizeChanged {
        name: String,
        expected: u64,
        actual: u64,
    },
    #[error("archive is too short to be valid")]
    TooShort,
    #[error("bad archive magic")]
    BadMagic,
    #[error("unsupported archive version {got}")]
    UnsupportedVersion { got: u16 },
    #[error("entry {entry_index} is truncated")]
    EntryTruncated { entry_index: u64 },
    #[error("entry {entry_index} has a non-UTF-8 name")]
    NonUtf8Name { entry_index: u64 },
    #[error("bad footer magic")]
    BadFooterMagic,
    #[error("footer declares {expected} entries but {actual} were read")]
    EntryCountMismatch { expected: u64, actual: u64 },
    #[error("chain hash mismatch")]
    ChainHashMismatch,
    #[error("no entry named {name:?}")]
    EntryNotFound { name: String },
}

impl ArchiveError {
    pub(crate) fn io(context: impl Into<String>, e: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            detail: e.to_string(),
        }
    }
}
