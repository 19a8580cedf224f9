//! Local repository end-to-end lock tests.
//!
//! Proves:
//! 1. A unit prepared from a directory, published to a local repository and
//!    listed in a definitions document packages and runs
//! 2. A declared payload adapter transforms the payload before the handler
//!    sees it
//! 3. Packaging several paths keeps them independent at run time

#![cfg(unix)]

use std::path::Path;

use lock_tests::fixtures::{append_script, handler_unit, id, marker_lines, Repo, HANDLER};
use migrant_core::defs::MigrationDefs;
use migrant_core::history::MigrationHistory;
use migrant_engine::{Packager, PackagerConfig, RunError, Runner, RunnerConfig};
use migrant_scope::{EntryPointDescriptor, UnitBuilder};

fn write(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

// ---------------------------------------------------------------------------
// 1. Prepared directory → repository → defs → archive → run
// ---------------------------------------------------------------------------

#[test]
fn prepared_unit_packages_from_defs_and_runs() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("marker.log");

    let unit = id("rename-column", "3");
    let unit_dir = scratch.path().join("unit");
    write(
        &unit_dir.join("entry").join(format!("{HANDLER}.json")),
        &EntryPointDescriptor::handler("bin/apply.sh", Some("/bin/sh"))
            .to_bytes()
            .unwrap(),
    );
    write(
        &unit_dir.join("bin/apply.sh"),
        format!(
            "[ -f share/columns.txt ] || exit 1\n{}",
            append_script(&marker, "renamed")
        )
        .as_bytes(),
    );
    write(&unit_dir.join("share/columns.txt"), b"old_name new_name\n");

    let builder = UnitBuilder::from_dir(&unit_dir).unwrap();
    assert_eq!(builder.validate().unwrap(), HANDLER);
    let location = repo.resolver().location(&unit);
    std::fs::create_dir_all(location.parent().unwrap()).unwrap();
    builder.prepare(&location).unwrap();

    let defs_path = scratch.path().join("defs.json");
    MigrationDefs::new(vec![unit.clone()]).write(&defs_path).unwrap();

    let mut packager = Packager::new(repo.resolver(), PackagerConfig::default());
    packager.add_defs("default", &defs_path).unwrap();
    let archive = scratch.path().join("migrations.archive");
    packager.write(&archive).unwrap();

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    assert_eq!(runner.run("default", &MigrationHistory::new(), b"").unwrap(), 1);
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["renamed"]);
}

// ---------------------------------------------------------------------------
// 2. Payload adapter
// ---------------------------------------------------------------------------

#[test]
fn declared_adapter_transforms_the_payload() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("adapted.log");

    let unit = id("adapted", "1");
    repo.publish(
        &unit,
        &UnitBuilder::new()
            .entry_point(
                HANDLER,
                EntryPointDescriptor::handler("bin/migrate.sh", Some("/bin/sh"))
                    .with_payload_adapter("upper"),
            )
            .entry_point(
                "upper",
                EntryPointDescriptor::adapter("bin/upper.sh", Some("/bin/sh")),
            )
            .file(
                "bin/migrate.sh",
                format!("cat >> '{}'\n", marker.display()),
            )
            .file("bin/upper.sh", "tr a-z A-Z\n"),
    );

    let mut packager = Packager::new(repo.resolver(), PackagerConfig::default());
    packager.add("default", &[unit]).unwrap();
    let archive = scratch.path().join("migrations.archive");
    packager.write(&archive).unwrap();

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    runner
        .run("default", &MigrationHistory::new(), b"tenant\n")
        .unwrap();
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["TENANT"]);
}

// ---------------------------------------------------------------------------
// 3. Independent paths
// ---------------------------------------------------------------------------

#[test]
fn paths_run_independently() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("marker.log");

    let core = [id("core-1", "1"), id("core-2", "1")];
    let billing = [id("billing-1", "1")];
    for unit in core.iter().chain(&billing) {
        repo.publish(unit, &handler_unit(&append_script(&marker, unit.artifact())));
    }

    let mut packager = Packager::new(repo.resolver(), PackagerConfig::default());
    packager.add("core", &core).unwrap();
    packager.add("billing", &billing).unwrap();
    let archive = scratch.path().join("migrations.archive");
    packager.write(&archive).unwrap();

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    assert_eq!(runner.run("billing", &MigrationHistory::new(), b"").unwrap(), 1);
    assert_eq!(runner.run("core", &MigrationHistory::new(), b"").unwrap(), 2);
    assert!(matches!(
        runner.run("reporting", &MigrationHistory::new(), b""),
        Err(RunError::NotFound { .. })
    ));
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["billing-1", "core-1", "core-2"]);
}
