//! `ArchiveReader`: fail-closed open with chain verification, then random
//! access to entries by name.
//!
//! `open` scans the whole file once. Any framing, footer, count or chain
//! violation rejects the archive before a single entry is served. The file
//! handle stays open for the reader's lifetime; entry reads seek into it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use migrant_core::hash::{canonical_hash, ContentHash, HashDomain};

use crate::format::{
    chain_seed, entry_relative_path, validate_entry_name, ArchiveError, ChainStep,
    ARCHIVE_FOOTER_MAGIC, ARCHIVE_MAGIC, ARCHIVE_VERSION, FOOTER_SIZE, HEADER_SIZE,
};

const SCAN_CHUNK: usize = 64 * 1024;

/// Location of one entry's content inside the archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub offset: u64,
    pub len: u64,
}

/// A verified, open archive.
#[derive(Debug)]
pub struct ArchiveReader {
    path: PathBuf,
    file: File,
    entries: Vec<EntryInfo>,
    index: HashMap<String, usize>,
    chain_hash: [u8; 32],
}

impl ArchiveReader {
    /// Open and verify an archive.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on I/O failure or any integrity violation.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)
            .map_err(|e| ArchiveError::io(format!("opening {}", path.display()), &e))?;
        let file_len = file
            .metadata()
            .map_err(|e| ArchiveError::io(format!("stat {}", path.display()), &e))?
            .len();
        if file_len < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(ArchiveError::TooShort);
        }

        let mut cursor = FileCursor::new(&file);

        // --- Header ---
        let magic = cursor.read_array::<4>().map_err(|()| ArchiveError::TooShort)?;
        if magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = u16::from_le_bytes(
            cursor.read_array::<2>().map_err(|()| ArchiveError::TooShort)?,
        );
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion { got: version });
        }

        // --- Entries ---
        let footer_start = file_len - FOOTER_SIZE as u64;
        let mut chain_hash = chain_seed();
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut entry_index: u64 = 0;

        while cursor.pos < footer_start {
            let truncated = |()| ArchiveError::EntryTruncated { entry_index };

            let name_len_bytes = cursor.read_array::<2>().map_err(truncated)?;
            let name_len = u16::from_le_bytes(name_len_bytes);
            let name_bytes = cursor
                .read_vec(usize::from(name_len), footer_start)
                .map_err(truncated)?;
            let content_len_bytes = cursor.read_array::<8>().map_err(truncated)?;
            let content_len = u64::from_le_bytes(content_len_bytes);
            if cursor.pos > footer_start || footer_start - cursor.pos < content_len {
                return Err(ArchiveError::EntryTruncated { entry_index });
            }

            let name = String::from_utf8(name_bytes)
                .map_err(|_| ArchiveError::NonUtf8Name { entry_index })?;
            validate_entry_name(&name)?;
            if index.contains_key(&name) {
                return Err(ArchiveError::DuplicateEntry { name });
            }

            let mut step = ChainStep::begin(&chain_hash);
            step.update(&name_len_bytes);
            step.update(name.as_bytes());
            step.update(&content_len_bytes);
            let offset = cursor.pos;
            cursor
                .stream(content_len, |chunk| step.update(chunk))
                .map_err(truncated)?;
            chain_hash = step.finish();

            index.insert(name.clone(), entries.len());
            entries.push(EntryInfo {
                name,
                offset,
                len: content_len,
            });
            entry_index += 1;
        }

        // --- Footer ---
        let bad_footer = |()| ArchiveError::BadFooterMagic;
        let footer_count = u64::from_le_bytes(cursor.read_array::<8>().map_err(bad_footer)?);
        let footer_hash = cursor.read_array::<32>().map_err(bad_footer)?;
        let footer_magic = cursor.read_array::<4>().map_err(bad_footer)?;
        if footer_magic != ARCHIVE_FOOTER_MAGIC {
            return Err(ArchiveError::BadFooterMagic);
        }
        if footer_count != entry_index {
            return Err(ArchiveError::EntryCountMismatch {
                expected: footer_count,
                actual: entry_index,
            });
        }
        if footer_hash != chain_hash {
            return Err(ArchiveError::ChainHashMismatch);
        }
        drop(cursor);

        tracing::debug!(
            archive = %path.display(),
            entries = entry_index,
            "archive verified"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            entries,
            index,
            chain_hash,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in archive order.
    #[must_use]
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&EntryInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Verified chain hash from the footer.
    #[must_use]
    pub fn chain_hash(&self) -> [u8; 32] {
        self.chain_hash
    }

    /// Read one entry into memory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryNotFound`] or [`ArchiveError::Io`].
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut out = Vec::new();
        self.copy_entry(name, &mut out)?;
        Ok(out)
    }

    /// Stream one entry into `out`. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryNotFound`] or [`ArchiveError::Io`].
    pub fn copy_entry(&mut self, name: &str, out: &mut impl Write) -> Result<u64, ArchiveError> {
        let info = self
            .entry(name)
            .cloned()
            .ok_or_else(|| ArchiveError::EntryNotFound {
                name: name.to_string(),
            })?;
        self.file
            .seek(SeekFrom::Start(info.offset))
            .map_err(|e| ArchiveError::io(format!("seeking to entry {name:?}"), &e))?;
        let copied = std::io::copy(&mut (&mut self.file).take(info.len), out)
            .map_err(|e| ArchiveError::io(format!("copying entry {name:?}"), &e))?;
        if copied != info.len {
            return Err(ArchiveError::io(
                format!("copying entry {name:?}"),
                &std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
            ));
        }
        Ok(copied)
    }

    /// Write one entry to `dest`, creating parent directories.
    ///
    /// The content lands in a temporary sibling first and is renamed into
    /// place, so `dest` never exists half-written.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EntryNotFound`] or [`ArchiveError::Io`].
    pub fn extract_to(&mut self, name: &str, dest: &Path) -> Result<(), ArchiveError> {
        let parent = dest.parent().ok_or_else(|| ArchiveError::Io {
            context: format!("extracting {name:?}"),
            detail: format!("{} has no parent directory", dest.display()),
        })?;
        std::fs::create_dir_all(parent)
            .map_err(|e| ArchiveError::io(format!("creating {}", parent.display()), &e))?;

        let temp_name = format!(
            ".tmp_{}",
            dest.file_name().unwrap_or_default().to_string_lossy()
        );
        let temp_path = parent.join(temp_name);
        let mut out = File::create(&temp_path)
            .map_err(|e| ArchiveError::io(format!("creating {}", temp_path.display()), &e))?;
        self.copy_entry(name, &mut out)?;
        out.flush()
            .map_err(|e| ArchiveError::io(format!("flushing {}", temp_path.display()), &e))?;
        drop(out);

        std::fs::rename(&temp_path, dest).map_err(|e| {
            ArchiveError::io(
                format!("renaming {} to {}", temp_path.display(), dest.display()),
                &e,
            )
        })
    }

    /// Extract an entry beneath `root` at the path its name describes.
    /// Returns the destination path.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveReader::extract_to`].
    pub fn extract_under(&mut self, name: &str, root: &Path) -> Result<PathBuf, ArchiveError> {
        let dest = root.join(entry_relative_path(name));
        self.extract_to(name, &dest)?;
        Ok(dest)
    }

    /// Domain-separated content hash of one entry, as `inspect` lists it.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveReader::read_entry`].
    pub fn entry_hash(&mut self, name: &str) -> Result<ContentHash, ArchiveError> {
        let bytes = self.read_entry(name)?;
        Ok(canonical_hash(HashDomain::ArchiveEntry, &bytes))
    }
}

/// Whether `path` starts with the archive magic. Used to tell container
/// files from plain resources without a full verification pass.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if the file cannot be opened or read.
pub fn has_archive_magic(path: &Path) -> Result<bool, ArchiveError> {
    let mut file = File::open(path)
        .map_err(|e| ArchiveError::io(format!("opening {}", path.display()), &e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ARCHIVE_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ArchiveError::io(format!("reading {}", path.display()), &e)),
    }
}

// ---------------------------------------------------------------------------
// Buffered scan cursor
// ---------------------------------------------------------------------------

/// Sequential reader over the archive file that tracks its byte position.
/// Short reads map to `Err(())`; callers attach the context.
struct FileCursor<'a> {
    inner: BufReader<&'a File>,
    pos: u64,
}

impl<'a> FileCursor<'a> {
    fn new(file: &'a File) -> Self {
        Self {
            inner: BufReader::with_capacity(SCAN_CHUNK, file),
            pos: 0,
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ()> {
        let mut out = [0u8; N];
        self.inner.read_exact(&mut out).map_err(|_| ())?;
        self.pos += N as u64;
        Ok(out)
    }

    /// Read `n` bytes, refusing to cross `limit`.
    fn read_vec(&mut self, n: usize, limit: u64) -> Result<Vec<u8>, ()> {
        if self.pos + n as u64 > limit {
            return Err(());
        }
        let mut out = vec![0u8; n];
        self.inner.read_exact(&mut out).map_err(|_| ())?;
        self.pos += n as u64;
        Ok(out)
    }

    /// Feed the next `len` bytes to `sink` in chunks.
    fn stream(&mut self, mut len: u64, mut sink: impl FnMut(&[u8])) -> Result<(), ()> {
        let mut buf = vec![0u8; SCAN_CHUNK];
        while len > 0 {
            let want = usize::try_from(len.min(SCAN_CHUNK as u64)).map_err(|_| ())?;
            self.inner.read_exact(&mut buf[..want]).map_err(|_| ())?;
            sink(&buf[..want]);
            self.pos += want as u64;
            len -= want as u64;
        }
        Ok(())
    }
}
