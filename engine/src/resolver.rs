//! Dependency resolution contract and the local repository backend.

use std::path::{Path, PathBuf};

use migrant_archive::entry_relative_path;
use migrant_core::identity::{ResolvedDependency, UnitIdentity};
use migrant_scope::unit::read_unit_classpath;

use crate::error::ResolutionError;

/// A unit resolved to local files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUnit {
    /// The unit's own file.
    pub primary: PathBuf,
    /// Its transitive dependencies, in classpath order.
    pub dependencies: Vec<ResolvedDependency>,
}

/// Resolves a unit identity to its file and dependency closure.
///
/// Backends (local cache, remote registry, build-tool integration) plug in
/// here without touching packaging.
pub trait DependencyResolver {
    /// # Errors
    ///
    /// Returns [`ResolutionError`] if the unit or any dependency cannot be
    /// located.
    fn resolve(&self, identity: &UnitIdentity) -> Result<ResolvedUnit, ResolutionError>;
}

impl<R: DependencyResolver + ?Sized> DependencyResolver for &R {
    fn resolve(&self, identity: &UnitIdentity) -> Result<ResolvedUnit, ResolutionError> {
        (**self).resolve(identity)
    }
}

/// A directory laid out by canonical path.
///
/// The unit lives at `root/<canonical path>`; its closure is the
/// `unit-classpath.json` it carries, each entry again at
/// `root/<canonical path>`. A unit without that entry has no dependencies.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    root: PathBuf,
}

impl LocalRepositoryResolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `identity` lives in this repository.
    #[must_use]
    pub fn location(&self, identity: &UnitIdentity) -> PathBuf {
        self.root.join(entry_relative_path(&identity.canonical_path()))
    }

    fn locate(&self, identity: &UnitIdentity) -> Result<PathBuf, ResolutionError> {
        let location = self.location(identity);
        if location.is_file() {
            Ok(location)
        } else {
            Err(ResolutionError::NotFound {
                identity: identity.clone(),
                location: location.display().to_string(),
            })
        }
    }
}

impl DependencyResolver for LocalRepositoryResolver {
    fn resolve(&self, identity: &UnitIdentity) -> Result<ResolvedUnit, ResolutionError> {
        let primary = self.locate(identity)?;
        let listed = read_unit_classpath(&primary).map_err(|e| ResolutionError::Classpath {
            identity: identity.clone(),
            detail: e.to_string(),
        })?;
        let listed = listed.unwrap_or_else(|| {
            tracing::debug!(unit = %identity, "unit declares no dependency list");
            Vec::new()
        });

        let mut dependencies = Vec::with_capacity(listed.len());
        for dep in listed {
            let file = self.locate(&dep)?;
            dependencies.push(ResolvedDependency::new(dep, file));
        }
        Ok(ResolvedUnit {
            primary,
            dependencies,
        })
    }
}
