//! `ArchiveWriter`: streaming archive output with a running hash chain.
//!
//! Entries are written in call order. Content from files is streamed in
//! fixed-size chunks, so archive size is not bounded by memory.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::format::{
    chain_seed, frame_prefix, validate_entry_name, ArchiveError, ArchiveSummary, ChainStep,
    ARCHIVE_FOOTER_MAGIC, ARCHIVE_MAGIC, ARCHIVE_VERSION,
};

const COPY_CHUNK: usize = 64 * 1024;

/// Streaming archive writer over any [`Write`] sink.
pub struct ArchiveWriter<W: Write> {
    out: W,
    chain_hash: [u8; 32],
    entry_count: u64,
    names: HashSet<String>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Write magic + version and seed the hash chain.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if the header cannot be written.
    pub fn new(mut out: W) -> Result<Self, ArchiveError> {
        out.write_all(&ARCHIVE_MAGIC)
            .and_then(|()| out.write_all(&ARCHIVE_VERSION.to_le_bytes()))
            .map_err(|e| ArchiveError::io("writing archive header", &e))?;
        Ok(Self {
            out,
            chain_hash: chain_seed(),
            entry_count: 0,
            names: HashSet::new(),
        })
    }

    /// Append an entry from memory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidName`] / [`ArchiveError::DuplicateEntry`]
    /// for a bad name, or [`ArchiveError::Io`] on write failure.
    pub fn add_bytes(&mut self, name: &str, content: &[u8]) -> Result<(), ArchiveError> {
        let mut step = self.begin_entry(name, content.len() as u64)?;
        step.update(content);
        self.out
            .write_all(content)
            .map_err(|e| ArchiveError::io(format!("writing entry {name:?}"), &e))?;
        self.commit_entry(step);
        Ok(())
    }

    /// Append an entry by streaming the contents of `source`.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveWriter::add_bytes`], plus [`ArchiveError::SizeChanged`]
    /// if the file's length differs from its metadata while copying.
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<(), ArchiveError> {
        let mut file = File::open(source)
            .map_err(|e| ArchiveError::io(format!("opening {}", source.display()), &e))?;
        let expected = file
            .metadata()
            .map_err(|e| ArchiveError::io(format!("stat {}", source.display()), &e))?
            .len();

        let mut step = self.begin_entry(name, expected)?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied: u64 = 0;
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| ArchiveError::io(format!("reading {}", source.display()), &e))?;
            if n == 0 {
                break;
            }
            copied += n as u64;
            if copied > expected {
                break;
            }
            step.update(&buf[..n]);
            self.out
                .write_all(&buf[..n])
                .map_err(|e| ArchiveError::io(format!("writing entry {name:?}"), &e))?;
        }
        if copied != expected {
            return Err(ArchiveError::SizeChanged {
                name: name.to_string(),
                expected,
                actual: copied,
            });
        }
        self.commit_entry(step);
        Ok(())
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Write the footer and flush.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] on write or flush failure.
    pub fn finish(mut self) -> Result<ArchiveSummary, ArchiveError> {
        self.out
            .write_all(&self.entry_count.to_le_bytes())
            .and_then(|()| self.out.write_all(&self.chain_hash))
            .and_then(|()| self.out.write_all(&ARCHIVE_FOOTER_MAGIC))
            .and_then(|()| self.out.flush())
            .map_err(|e| ArchiveError::io("writing archive footer", &e))?;
        Ok(ArchiveSummary {
            entry_count: self.entry_count,
            chain_hash: self.chain_hash,
        })
    }

    /// Validate the name, write the frame prefix, and start the chain step.
    fn begin_entry(&mut self, name: &str, content_len: u64) -> Result<ChainStep, ArchiveError> {
        validate_entry_name(name)?;
        if self.names.contains(name) {
            return Err(ArchiveError::DuplicateEntry {
                name: name.to_string(),
            });
        }
        let prefix = frame_prefix(name, content_len);
        self.out
            .write_all(&prefix)
            .map_err(|e| ArchiveError::io(format!("writing entry {name:?}"), &e))?;
        self.names.insert(name.to_string());

        let mut step = ChainStep::begin(&self.chain_hash);
        step.update(&prefix);
        Ok(step)
    }

    fn commit_entry(&mut self, step: ChainStep) {
        self.chain_hash = step.finish();
        self.entry_count += 1;
    }
}
