//! `ModuleScope`: a disposable arena over a closed set of files.
//!
//! A scope extracts its member files into a private temporary root and
//! resolves entry points only from that root. Programs run with a cleared
//! environment, the scope root as working directory, and the payload on
//! stdin. Nothing from the host process leaks in except the fixed `PATH`.
//!
//! Scopes are built per unit and discarded after use. Dropping a scope
//! deletes its root; [`ModuleScope::close`] does the same but reports
//! failures.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use migrant_archive::{
    entry_relative_path, has_archive_magic, validate_entry_name, ArchiveReader,
};
use tempfile::TempDir;

use crate::error::{InvocationError, ScopeError};
use crate::unit::{declared_entry_points, descriptor_entry, EntryPointDescriptor};

/// Scope root, as seen by programs.
pub const ENV_SCOPE_ROOT: &str = "MIGRANT_SCOPE_ROOT";
/// Name of the entry point being run.
pub const ENV_ENTRY_POINT: &str = "MIGRANT_ENTRY_POINT";
/// Member files of the scope, `:`-joined, in scope order.
pub const ENV_CLASSPATH: &str = "MIGRANT_CLASSPATH";

/// Directory plain (non-container) member files are copied into, each
/// under its member name.
pub const LIB_DIR: &str = "lib";

/// Scope construction and invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Prefix for the temporary scope root directory name.
    pub prefix: String,
    /// The only `PATH` programs see.
    pub path_env: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            prefix: "migrant-scope-".to_string(),
            path_env: "/usr/local/bin:/usr/bin:/bin".to_string(),
        }
    }
}

/// A file to build a scope from, paired with the name it is known by.
///
/// The name is the member's canonical archive path. Plain members are
/// copied to `lib/<name>`, so two plain files that share a file name but
/// not a name both stay visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMember {
    pub name: String,
    pub file: PathBuf,
}

impl ScopeMember {
    #[must_use]
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }
}

/// One file the scope was built from.
#[derive(Debug, Clone)]
struct Member {
    file: PathBuf,
    entry_points: Vec<String>,
}

/// An entry point loaded from a scope's own root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub descriptor: EntryPointDescriptor,
}

impl EntryPoint {
    #[must_use]
    pub fn provides(&self, capability: &str) -> bool {
        self.descriptor.provides(capability)
    }
}

/// Sandboxed module scope. See the module docs.
#[derive(Debug)]
pub struct ModuleScope {
    root: TempDir,
    members: Vec<Member>,
    config: ScopeConfig,
}

impl ModuleScope {
    /// Build a scope from `files`, in order. Container files are extracted
    /// entry by entry; the first file to claim an entry name wins. Other
    /// files are copied to `lib/<member name>`, again first wins.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] if the root cannot be created, a member cannot
    /// be read, a plain member's name is not a valid relative path, or a
    /// container member fails verification.
    pub fn open(files: &[ScopeMember], config: &ScopeConfig) -> Result<Self, ScopeError> {
        let root = tempfile::Builder::new()
            .prefix(&config.prefix)
            .tempdir()
            .map_err(|e| ScopeError::io("creating scope root", &e))?;

        let mut claimed: HashSet<String> = HashSet::new();
        let mut members = Vec::with_capacity(files.len());
        for ScopeMember { name: member_name, file } in files {
            let entry_points = if has_archive_magic(file)? {
                let mut reader = ArchiveReader::open(file)?;
                let declared = declared_entry_points(&reader);
                let names: Vec<String> =
                    reader.entries().iter().map(|e| e.name.clone()).collect();
                for name in names {
                    if claimed.contains(&name) {
                        tracing::debug!(
                            entry = %name,
                            member = %file.display(),
                            "entry shadowed by earlier scope member"
                        );
                        continue;
                    }
                    reader.extract_under(&name, root.path())?;
                    claimed.insert(name);
                }
                declared
            } else {
                copy_plain_member(member_name, file, root.path(), &mut claimed)?;
                Vec::new()
            };
            members.push(Member {
                file: file.clone(),
                entry_points,
            });
        }

        tracing::debug!(
            root = %root.path().display(),
            members = members.len(),
            entries = claimed.len(),
            "scope opened"
        );

        Ok(Self {
            root,
            members,
            config: config.clone(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Entry points declared by one member file, whether or not an earlier
    /// member shadows their descriptors. `None` if `file` is not a member.
    #[must_use]
    pub fn declared_by(&self, file: &Path) -> Option<&[String]> {
        self.members
            .iter()
            .find(|m| m.file == file)
            .map(|m| m.entry_points.as_slice())
    }

    /// Load an entry point's descriptor from this scope's root.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::UnknownEntryPoint`] if no descriptor is visible,
    /// or [`ScopeError::Descriptor`] if it is malformed.
    pub fn load(&self, name: &str) -> Result<EntryPoint, ScopeError> {
        crate::unit::validate_entry_point_name(name)?;
        let path = self
            .root
            .path()
            .join(entry_relative_path(&descriptor_entry(name)));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScopeError::UnknownEntryPoint {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(ScopeError::io(format!("reading {}", path.display()), &e)),
        };
        let descriptor = EntryPointDescriptor::parse(name, &bytes)?;
        Ok(EntryPoint {
            name: name.to_string(),
            descriptor,
        })
    }

    /// Run an entry point's program with `input` on stdin and return its stdout.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Spawn`] if the program cannot start,
    /// [`InvocationError::Pipe`] on a broken stdout/stderr pipe, and
    /// [`InvocationError::Exit`] with the exit status and stderr if it
    /// exits unsuccessfully.
    pub fn invoke(&self, entry: &EntryPoint, input: &[u8]) -> Result<Vec<u8>, InvocationError> {
        let root = self.root.path();
        let program = root.join(entry_relative_path(&entry.descriptor.program));

        let mut command = match &entry.descriptor.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&program);
                command
            }
            None => {
                mark_executable(&program).map_err(|e| InvocationError::Spawn {
                    entry: entry.name.clone(),
                    detail: e.to_string(),
                })?;
                Command::new(&program)
            }
        };
        command
            .env_clear()
            .env("PATH", &self.config.path_env)
            .env(ENV_SCOPE_ROOT, root)
            .env(ENV_ENTRY_POINT, &entry.name)
            .env(ENV_CLASSPATH, self.classpath_env())
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(entry = %entry.name, program = %program.display(), "invoking entry point");
        let mut child = command.spawn().map_err(|e| InvocationError::Spawn {
            entry: entry.name.clone(),
            detail: e.to_string(),
        })?;

        // Feed stdin from a second thread so a program that writes a lot
        // before reading cannot deadlock against us.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|s| {
            let feeder = s.spawn(move || match stdin {
                Some(mut stdin) => match stdin.write_all(input) {
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                },
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin feeder panicked")));
            (output, fed)
        });

        let (output, fed) = output;
        let output = output.map_err(|e| InvocationError::Pipe {
            entry: entry.name.clone(),
            detail: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(InvocationError::Exit {
                entry: entry.name.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        fed.map_err(|e| InvocationError::Pipe {
            entry: entry.name.clone(),
            detail: format!("writing stdin: {e}"),
        })?;
        Ok(output.stdout)
    }

    /// Delete the scope root.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Io`] if any file cannot be removed.
    pub fn close(self) -> Result<(), ScopeError> {
        let root = self.root.path().display().to_string();
        self.root
            .close()
            .map_err(|e| ScopeError::io(format!("removing scope root {root}"), &e))
    }

    fn classpath_env(&self) -> OsString {
        let mut joined = OsString::new();
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                joined.push(":");
            }
            joined.push(member.file.as_os_str());
        }
        joined
    }
}

fn copy_plain_member(
    member_name: &str,
    file: &Path,
    root: &Path,
    claimed: &mut HashSet<String>,
) -> Result<(), ScopeError> {
    let name = format!("{LIB_DIR}/{member_name}");
    validate_entry_name(&name)?;
    if claimed.contains(&name) {
        tracing::debug!(entry = %name, member = %file.display(), "plain member shadowed");
        return Ok(());
    }
    let dest = root.join(entry_relative_path(&name));
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScopeError::io("creating scope lib directory", &e))?;
    }
    std::fs::copy(file, &dest)
        .map_err(|e| ScopeError::io(format!("copying {}", file.display()), &e))?;
    claimed.insert(name);
    Ok(())
}

#[cfg(unix)]
fn mark_executable(program: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(program, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_program: &Path) -> std::io::Result<()> {
    Ok(())
}
