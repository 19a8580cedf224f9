//! `Runner`: replay the pending units of one migration path.
//!
//! # Run algorithm
//!
//! 1. Find the path; `NotFound` if absent.
//! 2. Pending = the path's packages, in order, whose identity is not in the
//!    supplied history. Empty pending is a no-op.
//! 3. For each pending package, in order:
//!    - no resources → `MissingResource`
//!    - materialize its classpath into the workspace (skipping files
//!      already present; existing files are never re-checked)
//!    - open a fresh module scope over exactly those files
//!    - `pre_migration`, execute through the bridge, then
//!      `post_migration` or `migration_failure` + abort
//!
//! The workspace lives as long as the runner and is shared by every run.

use std::path::Path;

use migrant_archive::{entry_relative_path, validate_entry_name, ArchiveReader, CONTAINER_INDEX_ENTRY};
use migrant_core::history::{Migration, MigrationHistory};
use migrant_core::model::{MigrationContainer, MigrationPackage};
use migrant_scope::{bridge, ModuleScope, ScopeConfig, ScopeMember};
use tempfile::TempDir;

use crate::error::RunError;
use crate::listener::{ListenerId, RunListener};

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Prefix for the workspace directory name.
    pub workspace_prefix: String,
    /// Settings for the per-unit scopes.
    pub scope: ScopeConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_prefix: "migrant-workspace-".to_string(),
            scope: ScopeConfig::default(),
        }
    }
}

/// Executes pending migration units from one archive.
///
/// Not safe for concurrent `run` calls; use one runner per thread.
pub struct Runner {
    archive: ArchiveReader,
    container: MigrationContainer,
    listeners: Vec<(ListenerId, Box<dyn RunListener>)>,
    next_listener: u64,
    workspace: TempDir,
    config: RunnerConfig,
}

impl Runner {
    /// Open an archive, load its container index, create the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if the archive fails verification, has no
    /// readable index, or the workspace cannot be created.
    pub fn open(archive: &Path, config: RunnerConfig) -> Result<Self, RunError> {
        let mut reader = ArchiveReader::open(archive)?;
        let index = reader.read_entry(CONTAINER_INDEX_ENTRY)?;
        let container = MigrationContainer::from_index_bytes(&index)?;
        let workspace = tempfile::Builder::new()
            .prefix(&config.workspace_prefix)
            .tempdir()
            .map_err(|e| RunError::Io {
                context: "creating workspace".into(),
                detail: e.to_string(),
            })?;
        tracing::debug!(
            archive = %archive.display(),
            workspace = %workspace.path().display(),
            paths = container.paths().len(),
            "runner opened"
        );
        Ok(Self {
            archive: reader,
            container,
            listeners: Vec::new(),
            next_listener: 0,
            workspace,
            config,
        })
    }

    /// The archive's container index.
    #[must_use]
    pub fn container(&self) -> &MigrationContainer {
        &self.container
    }

    #[must_use]
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn add_listener(&mut self, listener: impl RunListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether a listener with this id was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    /// Execute every unit of `path_name` not yet in `history`, in order.
    /// Returns how many units executed.
    ///
    /// # Errors
    ///
    /// Returns the first [`RunError`]; no later unit is attempted.
    pub fn run(
        &mut self,
        path_name: &str,
        history: &MigrationHistory,
        payload: &[u8],
    ) -> Result<usize, RunError> {
        let path = self
            .container
            .find(path_name)
            .ok_or_else(|| RunError::NotFound {
                name: path_name.to_string(),
            })?;

        let executed = history.executed();
        let pending: Vec<MigrationPackage> = path
            .packages
            .iter()
            .filter(|p| !executed.contains(&p.identity))
            .cloned()
            .collect();
        if pending.is_empty() {
            tracing::info!(path = path_name, "nothing pending");
            return Ok(0);
        }
        tracing::info!(path = path_name, pending = pending.len(), "running migrations");

        for package in &pending {
            self.run_one(package, payload)?;
        }
        Ok(pending.len())
    }

    fn run_one(&mut self, package: &MigrationPackage, payload: &[u8]) -> Result<(), RunError> {
        let identity = &package.identity;
        let resources = package
            .resources
            .as_ref()
            .ok_or_else(|| RunError::MissingResource {
                identity: identity.clone(),
            })?;

        let members = self.materialize(&resources.classpath)?;
        let scope =
            ModuleScope::open(&members, &self.config.scope).map_err(|source| RunError::Scope {
                identity: identity.clone(),
                source,
            })?;

        let migration = Migration::now(identity.clone());
        for (_, listener) in &mut self.listeners {
            listener.pre_migration(&migration);
        }

        let _span = tracing::info_span!("migration", unit = %identity).entered();
        tracing::info!(handler = %resources.handler, "executing");
        let outcome = bridge::execute(&scope, &resources.handler, payload);
        if let Err(e) = scope.close() {
            tracing::warn!(error = %e, "failed to remove scope root");
        }

        match outcome {
            Some(diagnostic) if !diagnostic.is_empty() => {
                tracing::error!("migration failed");
                let err = RunError::ExecutionFailure {
                    identity: identity.clone(),
                    diagnostic,
                };
                for (_, listener) in &mut self.listeners {
                    listener.migration_failure(&migration, &err);
                }
                Err(err)
            }
            _ => {
                tracing::info!("migration applied");
                for (_, listener) in &mut self.listeners {
                    listener.post_migration(&migration);
                }
                Ok(())
            }
        }
    }

    /// Copy classpath entries into the workspace unless already there.
    /// Returns the workspace files in classpath order.
    fn materialize(&mut self, classpath: &[String]) -> Result<Vec<ScopeMember>, RunError> {
        let mut files = Vec::with_capacity(classpath.len());
        for canonical in classpath {
            validate_entry_name(canonical)?;
            let dest = self.workspace.path().join(entry_relative_path(canonical));
            if dest.exists() {
                tracing::debug!(path = %canonical, "already materialized");
            } else {
                self.archive.extract_to(canonical, &dest)?;
                tracing::debug!(path = %canonical, "materialized");
            }
            files.push(ScopeMember::new(canonical.clone(), dest));
        }
        Ok(files)
    }

    /// Release the archive and delete the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Io`] if any workspace file cannot be removed.
    pub fn close(self) -> Result<(), RunError> {
        drop(self.archive);
        let workspace = self.workspace.path().display().to_string();
        self.workspace.close().map_err(|e| RunError::Io {
            context: format!("removing workspace {workspace}"),
            detail: e.to_string(),
        })
    }
}
