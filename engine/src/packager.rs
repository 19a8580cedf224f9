//! `Packager`: migration definitions in, one self-contained archive out.
//!
//! # Resource resolution
//!
//! For each unit inside the packaging window:
//!
//! 1. Resolve the unit to its file and dependency closure.
//! 2. Register every file under its canonical path in the archive-wide
//!    file table. The first file registered at a path wins; later ones are
//!    dropped (logged at `debug`).
//! 3. Open a module scope over exactly the unit and its closure.
//! 4. Load every entry point the unit's own file declares and keep those
//!    providing the handler capability. Exactly one must remain.
//!
//! Units before the window keep their identity but get no resources.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use migrant_archive::{ArchiveSummary, ArchiveWriter, CONTAINER_INDEX_ENTRY};
use migrant_core::defs::MigrationDefs;
use migrant_core::error::ConfigurationError;
use migrant_core::identity::{ResolvedDependency, UnitIdentity};
use migrant_core::model::{MigrationContainer, MigrationPackage, MigrationPath, Resources};
use migrant_scope::{ModuleScope, ScopeConfig, ScopeMember, CAPABILITY_MIGRATION_HANDLER};

use crate::error::{HandlerDiscoveryError, PackageError};
use crate::resolver::DependencyResolver;

/// How many of a path's most recent units get resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Window {
    /// Resolve every unit.
    #[default]
    All,
    /// Resolve only the last `n` units.
    MostRecent(usize),
}

impl Window {
    /// Negative values mean [`Window::All`].
    #[must_use]
    pub fn from_signed(n: i64) -> Self {
        match usize::try_from(n) {
            Ok(n) => Self::MostRecent(n),
            Err(_) if n < 0 => Self::All,
            Err(_) => Self::MostRecent(usize::MAX),
        }
    }

    /// Index of the first unit inside the window for a path of `len` units.
    #[must_use]
    pub fn start(self, len: usize) -> usize {
        match self {
            Self::All => 0,
            Self::MostRecent(n) => len.saturating_sub(n),
        }
    }
}

/// Packaging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagerConfig {
    pub include_most_recent: Window,
    /// Settings for the scopes used during handler discovery.
    pub scope: ScopeConfig,
}

/// Builds a migration container and the file table behind it.
pub struct Packager<R: DependencyResolver> {
    resolver: R,
    config: PackagerConfig,
    container: MigrationContainer,
    files: BTreeMap<String, ResolvedDependency>,
}

impl<R: DependencyResolver> Packager<R> {
    #[must_use]
    pub fn new(resolver: R, config: PackagerConfig) -> Self {
        Self {
            resolver,
            config,
            container: MigrationContainer::new(),
            files: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn container(&self) -> &MigrationContainer {
        &self.container
    }

    /// Canonical path → file table, in archive order.
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, ResolvedDependency> {
        &self.files
    }

    /// Add a migration path built from `identities`, oldest first.
    ///
    /// On error nothing is added: neither the path nor any of its files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicatePath`] (wrapped) if `name` is
    /// taken, or the first resolution, discovery or scope failure.
    pub fn add(&mut self, name: &str, identities: &[UnitIdentity]) -> Result<(), PackageError> {
        if self.container.contains(name) {
            return Err(ConfigurationError::DuplicatePath {
                name: name.to_string(),
            }
            .into());
        }

        let start = self.config.include_most_recent.start(identities.len());
        let mut staged: BTreeMap<String, ResolvedDependency> = BTreeMap::new();
        let mut path = MigrationPath::new(name);
        for (i, identity) in identities.iter().enumerate() {
            let resources = if i >= start {
                Some(self.resolve_resources(identity, &mut staged)?)
            } else {
                tracing::debug!(unit = %identity, "outside packaging window, record only");
                None
            };
            path.push(MigrationPackage::new(identity.clone(), resources));
        }

        self.container.add(path)?;
        for (canonical, dep) in staged {
            register(&mut self.files, canonical, dep);
        }
        tracing::info!(
            path = name,
            units = identities.len(),
            resolved = identities.len() - start.min(identities.len()),
            "migration path added"
        );
        Ok(())
    }

    /// Read a definitions document and add it as path `name`.
    ///
    /// # Errors
    ///
    /// Same as [`Packager::add`], plus document errors.
    pub fn add_defs(&mut self, name: &str, defs_path: &Path) -> Result<(), PackageError> {
        let defs = read_defs(defs_path)?;
        self.add(name, &defs.defs)
    }

    /// Write the archive: container index first, then every registered file
    /// in canonical-path order.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] on serialization or I/O failure.
    pub fn write(&self, out: &Path) -> Result<ArchiveSummary, PackageError> {
        let file = File::create(out).map_err(|e| PackageError::Io {
            context: format!("creating {}", out.display()),
            detail: e.to_string(),
        })?;
        self.write_to(BufWriter::new(file))
    }

    /// [`Packager::write`] to any sink.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError`] on serialization or I/O failure.
    pub fn write_to<W: Write>(&self, out: W) -> Result<ArchiveSummary, PackageError> {
        let mut writer = ArchiveWriter::new(out)?;
        writer.add_bytes(CONTAINER_INDEX_ENTRY, &self.container.to_index_bytes()?)?;
        for (canonical, dep) in &self.files {
            writer.add_file(canonical, dep.file())?;
        }
        let summary = writer.finish()?;
        tracing::info!(
            entries = summary.entry_count,
            paths = self.container.paths().len(),
            "archive written"
        );
        Ok(summary)
    }

    /// Forget every path and file.
    pub fn clear(&mut self) {
        self.container.clear();
        self.files.clear();
    }

    fn resolve_resources(
        &self,
        identity: &UnitIdentity,
        staged: &mut BTreeMap<String, ResolvedDependency>,
    ) -> Result<Resources, PackageError> {
        let resolved = self.resolver.resolve(identity)?;

        let primary = ResolvedDependency::new(identity.clone(), resolved.primary);
        let mut classpath: Vec<String> = Vec::with_capacity(1 + resolved.dependencies.len());
        let mut members: Vec<ScopeMember> = Vec::with_capacity(1 + resolved.dependencies.len());
        for dep in std::iter::once(&primary).chain(&resolved.dependencies) {
            let canonical = dep.canonical_path();
            if classpath.contains(&canonical) {
                continue;
            }
            classpath.push(canonical.clone());
            members.push(ScopeMember::new(canonical.clone(), dep.file()));
            register(staged, canonical, dep.clone());
        }

        let handler = self.discover_handler(identity, primary.file(), &members)?;
        tracing::debug!(unit = %identity, handler = %handler, files = classpath.len(), "unit resolved");
        Ok(Resources { handler, classpath })
    }

    fn discover_handler(
        &self,
        identity: &UnitIdentity,
        primary: &Path,
        members: &[ScopeMember],
    ) -> Result<String, PackageError> {
        let scope_err = |source| PackageError::Scope {
            identity: identity.clone(),
            source,
        };
        let scope = ModuleScope::open(members, &self.config.scope).map_err(scope_err)?;

        let mut candidates = Vec::new();
        for name in scope.declared_by(primary).unwrap_or_default() {
            let entry = scope.load(name).map_err(scope_err)?;
            if entry.provides(CAPABILITY_MIGRATION_HANDLER) {
                candidates.push(entry.name);
            }
        }
        scope.close().map_err(scope_err)?;

        match candidates.len() {
            0 => Err(HandlerDiscoveryError::NoImplementation {
                identity: identity.clone(),
            }
            .into()),
            1 => Ok(candidates.remove(0)),
            _ => Err(HandlerDiscoveryError::MultipleImplementations {
                identity: identity.clone(),
                candidates,
            }
            .into()),
        }
    }
}

/// Insert unless the path is taken. First writer wins.
fn register(
    files: &mut BTreeMap<String, ResolvedDependency>,
    canonical: String,
    dep: ResolvedDependency,
) {
    match files.get(&canonical) {
        Some(existing) if existing.file() != dep.file() => {
            tracing::debug!(
                path = %canonical,
                kept = %existing.file().display(),
                dropped = %dep.file().display(),
                "canonical path collision, keeping first file"
            );
        }
        Some(_) => {}
        None => {
            files.insert(canonical, dep);
        }
    }
}

/// Read a definitions document.
///
/// # Errors
///
/// Returns [`PackageError::Document`] on I/O or parse failure.
pub fn read_defs(path: &Path) -> Result<MigrationDefs, PackageError> {
    Ok(MigrationDefs::read(path)?)
}
