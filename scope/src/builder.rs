//! `UnitBuilder`: assemble unit files from entry points, programs and
//! resources.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use migrant_archive::{validate_entry_name, ArchiveSummary, ArchiveWriter};
use migrant_core::identity::UnitIdentity;

use crate::error::ScopeError;
use crate::unit::{
    descriptor_entry, entry_point_name, unit_classpath_bytes, validate_entry_point_name,
    EntryPointDescriptor, CAPABILITY_MIGRATION_HANDLER, ENTRY_DIR, UNIT_CLASSPATH_ENTRY,
};

/// Where an entry's bytes come from.
#[derive(Debug, Clone)]
enum Content {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Builder for one unit file.
///
/// Entries are written in name order, so the same inputs always produce the
/// same file.
#[derive(Debug, Clone, Default)]
pub struct UnitBuilder {
    entry_points: BTreeMap<String, EntryPointDescriptor>,
    files: BTreeMap<String, Content>,
    classpath: Option<Vec<UnitIdentity>>,
}

impl UnitBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entry point. A later declaration with the same name replaces it.
    #[must_use]
    pub fn entry_point(mut self, name: impl Into<String>, descriptor: EntryPointDescriptor) -> Self {
        self.entry_points.insert(name.into(), descriptor);
        self
    }

    /// Add a program or resource from memory.
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), Content::Bytes(content.into()));
        self
    }

    /// Add a program or resource streamed from disk at write time.
    #[must_use]
    pub fn file_from(mut self, name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        self.files.insert(name.into(), Content::File(source.into()));
        self
    }

    /// Record the unit's transitive dependencies.
    #[must_use]
    pub fn classpath(mut self, dependencies: Vec<UnitIdentity>) -> Self {
        self.classpath = Some(dependencies);
        self
    }

    /// Collect a prepared directory: every `entry/<name>.json` becomes an
    /// entry point, every other regular file an entry at its relative path.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] on I/O failure, a non-UTF-8 file name, or a
    /// malformed descriptor.
    pub fn from_dir(dir: &Path) -> Result<Self, ScopeError> {
        let mut builder = Self::new();
        let mut pending = vec![(dir.to_path_buf(), String::new())];
        while let Some((path, prefix)) = pending.pop() {
            let listing = std::fs::read_dir(&path)
                .map_err(|e| ScopeError::io(format!("reading {}", path.display()), &e))?;
            for item in listing {
                let item =
                    item.map_err(|e| ScopeError::io(format!("reading {}", path.display()), &e))?;
                let file_name = item.file_name().into_string().map_err(|raw| ScopeError::Io {
                    context: format!("reading {}", path.display()),
                    detail: format!("non-UTF-8 file name {raw:?}"),
                })?;
                let name = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{prefix}/{file_name}")
                };
                let file_type = item
                    .file_type()
                    .map_err(|e| ScopeError::io(format!("stat {name}"), &e))?;
                if file_type.is_dir() {
                    pending.push((item.path(), name));
                } else if let Some(entry_point) = entry_point_name(&name) {
                    let bytes = std::fs::read(item.path())
                        .map_err(|e| ScopeError::io(format!("reading {name}"), &e))?;
                    let descriptor = EntryPointDescriptor::parse(entry_point, &bytes)?;
                    builder.entry_points.insert(entry_point.to_string(), descriptor);
                } else if file_type.is_file() {
                    builder.files.insert(name, Content::File(item.path()));
                }
            }
        }
        Ok(builder)
    }

    /// The single entry point providing the handler capability.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::HandlerCount`] when zero or several entry points
    /// provide it.
    pub fn validate(&self) -> Result<&str, ScopeError> {
        let candidates: Vec<&str> = self
            .entry_points
            .iter()
            .filter(|(_, d)| d.provides(CAPABILITY_MIGRATION_HANDLER))
            .map(|(name, _)| name.as_str())
            .collect();
        match candidates.as_slice() {
            [only] => Ok(*only),
            _ => Err(ScopeError::HandlerCount {
                found: candidates.len(),
                candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
            }),
        }
    }

    /// Check the single-handler rule, then write the unit.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::HandlerCount`] or any [`UnitBuilder::write`] error.
    pub fn prepare(&self, out: &Path) -> Result<ArchiveSummary, ScopeError> {
        let handler = self.validate()?;
        tracing::debug!(handler, unit = %out.display(), "preparing unit");
        self.write(out)
    }

    /// Write the unit file without checking the handler rule.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] for invalid names, a file entry colliding with
    /// a descriptor or the classpath entry, or I/O failure.
    pub fn write(&self, out: &Path) -> Result<ArchiveSummary, ScopeError> {
        let mut entries: BTreeMap<String, Content> = BTreeMap::new();
        for (name, descriptor) in &self.entry_points {
            validate_entry_point_name(name)?;
            let bytes = descriptor.to_bytes()?;
            entries.insert(descriptor_entry(name), Content::Bytes(bytes));
        }
        if let Some(classpath) = &self.classpath {
            entries.insert(
                UNIT_CLASSPATH_ENTRY.to_string(),
                Content::Bytes(unit_classpath_bytes(classpath)?),
            );
        }
        for (name, content) in &self.files {
            validate_entry_name(name)?;
            let reserved = name == UNIT_CLASSPATH_ENTRY
                || name.strip_prefix(ENTRY_DIR).is_some_and(|r| r.starts_with('/'));
            if reserved || entries.contains_key(name) {
                return Err(ScopeError::Descriptor {
                    name: name.clone(),
                    detail: "file entry collides with a reserved unit entry".into(),
                });
            }
            entries.insert(name.clone(), content.clone());
        }

        let file = File::create(out)
            .map_err(|e| ScopeError::io(format!("creating {}", out.display()), &e))?;
        let mut writer = ArchiveWriter::new(BufWriter::new(file))?;
        for (name, content) in &entries {
            match content {
                Content::Bytes(bytes) => writer.add_bytes(name, bytes)?,
                Content::File(source) => writer.add_file(name, source)?,
            }
        }
        Ok(writer.finish()?)
    }
}
