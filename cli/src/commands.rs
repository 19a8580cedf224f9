//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use migrant_archive::{ArchiveReader, CONTAINER_INDEX_ENTRY};
use migrant_core::hash::ContentHash;
use migrant_core::model::MigrationContainer;
use migrant_engine::{
    read_history, write_history, HistoryListener, LocalRepositoryResolver, Packager,
    PackagerConfig, Runner, RunnerConfig, Window,
};
use migrant_scope::UnitBuilder;

pub fn package(
    repo: &Path,
    paths: &[(String, PathBuf)],
    include_most_recent: i64,
    out: &Path,
) -> Result<()> {
    let config = PackagerConfig {
        include_most_recent: Window::from_signed(include_most_recent),
        ..PackagerConfig::default()
    };
    let mut packager = Packager::new(LocalRepositoryResolver::new(repo), config);
    for (name, defs) in paths {
        packager
            .add_defs(name, defs)
            .with_context(|| format!("packaging path {name} from {}", defs.display()))?;
    }
    let summary = packager
        .write(out)
        .with_context(|| format!("writing {}", out.display()))?;

    println!(
        "wrote {} ({} entries, chain {})",
        out.display(),
        summary.entry_count,
        ContentHash::from_sha256(&summary.chain_hash).as_str()
    );
    Ok(())
}

pub fn run(archive: &Path, path: &str, history_path: &Path, payload: Option<&Path>) -> Result<()> {
    let payload = match payload {
        Some(p) => std::fs::read(p).with_context(|| format!("reading payload {}", p.display()))?,
        None => Vec::new(),
    };
    let history = read_history(history_path)
        .with_context(|| format!("reading history {}", history_path.display()))?;

    let mut runner = Runner::open(archive, RunnerConfig::default())
        .with_context(|| format!("opening {}", archive.display()))?;

    let shared = Arc::new(Mutex::new(history.clone()));
    runner.add_listener(HistoryListener::new(Arc::clone(&shared)));
    let outcome = runner.run(path, &history, &payload);

    // Successful units are recorded even when a later one fails.
    let updated = shared.lock().unwrap_or_else(PoisonError::into_inner).clone();
    write_history(history_path, &updated)
        .with_context(|| format!("writing history {}", history_path.display()))?;
    if let Err(e) = runner.close() {
        tracing::warn!(error = %e, "failed to clean up runner workspace");
    }

    let applied = outcome.with_context(|| format!("running path {path}"))?;
    println!("applied {applied} migration(s) from path {path}");
    Ok(())
}

pub fn inspect(archive: &Path) -> Result<()> {
    let mut reader =
        ArchiveReader::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let index = reader
        .read_entry(CONTAINER_INDEX_ENTRY)
        .context("reading container index")?;
    let container = MigrationContainer::from_index_bytes(&index).context("parsing container index")?;

    for path in container.paths() {
        println!("path {} ({} units)", path.name, path.packages.len());
        for package in &path.packages {
            match &package.resources {
                Some(resources) => println!(
                    "  {}  handler={} files={}",
                    package.identity,
                    resources.handler,
                    resources.classpath.len()
                ),
                None => println!("  {}  (record only)", package.identity),
            }
        }
    }
    let entries: Vec<(String, u64)> = reader
        .entries()
        .iter()
        .map(|e| (e.name.clone(), e.len))
        .collect();
    for (name, len) in &entries {
        let hash = reader
            .entry_hash(name)
            .with_context(|| format!("hashing entry {name}"))?;
        println!("entry {name}  {len} bytes  {hash}");
    }
    println!(
        "{} entries, chain {}",
        entries.len(),
        ContentHash::from_sha256(&reader.chain_hash()).as_str()
    );
    Ok(())
}

pub fn prep(dir: &Path, out: &Path) -> Result<()> {
    let builder =
        UnitBuilder::from_dir(dir).with_context(|| format!("reading unit dir {}", dir.display()))?;
    let handler = builder.validate().context("validating unit")?.to_string();
    let summary = builder
        .prepare(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "wrote unit {} (handler {handler}, {} entries)",
        out.display(),
        summary.entry_count
    );
    Ok(())
}
