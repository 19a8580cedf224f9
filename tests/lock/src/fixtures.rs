//! Unit-file builders, resolvers and a recording listener.
//!
//! Handlers are `/bin/sh` scripts. Scripts that must leave evidence on the
//! host write to an absolute path baked in at build time, since the scope
//! clears the environment and deletes its own root afterwards.
//!
//! Every helper panics on failure; these are test-only invariants.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use migrant_core::history::Migration;
use migrant_core::identity::{ResolvedDependency, UnitIdentity};
use migrant_engine::{
    DependencyResolver, LocalRepositoryResolver, Packager, PackagerConfig, ResolutionError,
    ResolvedUnit, RunError, RunListener,
};
use migrant_scope::{EntryPointDescriptor, UnitBuilder};

/// Entry point name every fixture handler uses.
pub const HANDLER: &str = "migrate";

/// Identity in the fixture group.
///
/// # Panics
///
/// Panics if `artifact` or `version` is not a valid identity token.
#[must_use]
pub fn id(artifact: &str, version: &str) -> UnitIdentity {
    UnitIdentity::simple("org.fixture", artifact, version).unwrap()
}

/// A unit with one handler that runs `script` under `/bin/sh`.
#[must_use]
pub fn handler_unit(script: &str) -> UnitBuilder {
    UnitBuilder::new()
        .entry_point(
            HANDLER,
            EntryPointDescriptor::handler("bin/migrate.sh", Some("/bin/sh")),
        )
        .file("bin/migrate.sh", script)
}

/// Script that appends `line` to `marker`.
#[must_use]
pub fn append_script(marker: &Path, line: &str) -> String {
    format!("echo '{line}' >> '{}'\n", marker.display())
}

/// Lines of a marker file; empty if it does not exist.
///
/// # Panics
///
/// Panics if the file exists but cannot be read.
#[must_use]
pub fn marker_lines(marker: &Path) -> Vec<String> {
    match std::fs::read_to_string(marker) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => panic!("reading {}: {e}", marker.display()),
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// A scratch directory laid out as a local repository.
pub struct Repo {
    dir: tempfile::TempDir,
}

impl Repo {
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn resolver(&self) -> LocalRepositoryResolver {
        LocalRepositoryResolver::new(self.dir.path())
    }

    /// Write `builder` at `identity`'s location. Returns the unit file.
    ///
    /// # Panics
    ///
    /// Panics if the unit cannot be written.
    pub fn publish(&self, identity: &UnitIdentity, builder: &UnitBuilder) -> PathBuf {
        let location = self.resolver().location(identity);
        std::fs::create_dir_all(location.parent().unwrap()).unwrap();
        builder.write(&location).unwrap();
        location
    }
}

impl Default for Repo {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolver over a fixed identity → resolved unit map.
#[derive(Debug, Default)]
pub struct MapResolver {
    units: HashMap<UnitIdentity, ResolvedUnit>,
}

impl MapResolver {
    pub fn insert(
        &mut self,
        identity: UnitIdentity,
        primary: impl Into<PathBuf>,
        dependencies: Vec<ResolvedDependency>,
    ) {
        self.units.insert(
            identity,
            ResolvedUnit {
                primary: primary.into(),
                dependencies,
            },
        );
    }
}

impl DependencyResolver for MapResolver {
    fn resolve(&self, identity: &UnitIdentity) -> Result<ResolvedUnit, ResolutionError> {
        self.units
            .get(identity)
            .cloned()
            .ok_or_else(|| ResolutionError::NotFound {
                identity: identity.clone(),
                location: "fixture map".into(),
            })
    }
}

/// Package `paths` in order and write the archive to `out`.
///
/// # Panics
///
/// Panics if any path fails to package or the archive cannot be written.
pub fn package<R: DependencyResolver>(
    resolver: R,
    config: PackagerConfig,
    paths: &[(&str, &[UnitIdentity])],
    out: &Path,
) -> PathBuf {
    let mut packager = Packager::new(resolver, config);
    for (name, identities) in paths {
        packager.add(name, identities).unwrap();
    }
    packager.write(out).unwrap();
    out.to_path_buf()
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// One listener callback, by unit artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pre(String),
    Post(String),
    Failure { unit: String, diagnostic: String },
}

/// Records callbacks into a log shared with the test.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }
}

impl RunListener for Recorder {
    fn pre_migration(&mut self, migration: &Migration) {
        self.log
            .borrow_mut()
            .push(Event::Pre(migration.identity.artifact().to_string()));
    }

    fn post_migration(&mut self, migration: &Migration) {
        self.log
            .borrow_mut()
            .push(Event::Post(migration.identity.artifact().to_string()));
    }

    fn migration_failure(&mut self, migration: &Migration, cause: &RunError) {
        let diagnostic = match cause {
            RunError::ExecutionFailure { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        };
        self.log.borrow_mut().push(Event::Failure {
            unit: migration.identity.artifact().to_string(),
            diagnostic,
        });
    }
}
