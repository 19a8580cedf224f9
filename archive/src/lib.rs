//! Migrant Archive: the single-file container used for migration archives
//! and unit files.
//!
//! # Wire format
//!
//! ```text
//! [magic:4 "MGAR"][version:u16le=1]
//! [entry_0][entry_1]...[entry_N]
//! [footer: entry_count:u64le][chain_hash:32][footer_magic:4 "RAGM"]
//! ```
//!
//! Entries are framed as `[name_len:u16le][name][content_len:u64le][content]`.
//! The chain hash covers every frame, so truncation, reordering and
//! corruption are all detected on open.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{
    entry_relative_path, validate_entry_name, ArchiveError, ArchiveSummary, CONTAINER_INDEX_ENTRY,
};
pub use reader::{has_archive_magic, ArchiveReader, EntryInfo};
pub use writer::ArchiveWriter;
