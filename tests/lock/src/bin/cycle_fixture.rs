//! Binary that builds a small repository, packages it, runs the archive
//! twice and prints deterministic `key=value` lines for cross-process
//! comparison.
//!
//! Usage: `cycle_fixture`
//! Output:
//!   `chain_hash`=sha256:...
//!   `entries`=N
//!   `first_run`=N
//!   `second_run`=0
//!   `history`=canonical identities, comma-joined

use std::sync::{Arc, Mutex};

use lock_tests::fixtures::{handler_unit, id, package, Repo};
use migrant_archive::ArchiveReader;
use migrant_core::hash::ContentHash;
use migrant_core::history::MigrationHistory;
use migrant_engine::{HistoryListener, PackagerConfig, Runner, RunnerConfig};
use migrant_scope::UnitBuilder;

fn main() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().expect("scratch dir");

    let lib = id("lib", "1");
    repo.publish(&lib, &UnitBuilder::new().file("lib/lib.txt", "shared\n"));
    let units = [id("create", "1"), id("alter", "1"), id("backfill", "1")];
    for unit in &units {
        repo.publish(
            unit,
            &handler_unit("[ -f lib/lib.txt ] && cat > /dev/null\n").classpath(vec![lib.clone()]),
        );
    }

    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &units[..])],
        &scratch.path().join("migrations.archive"),
    );
    let reader = ArchiveReader::open(&archive).expect("archive verifies");
    println!(
        "chain_hash={}",
        ContentHash::from_sha256(&reader.chain_hash()).as_str()
    );
    println!("entries={}", reader.entries().len());
    drop(reader);

    let shared = Arc::new(Mutex::new(MigrationHistory::new()));
    let mut runner = Runner::open(&archive, RunnerConfig::default()).expect("runner opens");
    runner.add_listener(HistoryListener::new(Arc::clone(&shared)));
    let first = runner
        .run("default", &MigrationHistory::new(), b"payload")
        .expect("first run");
    let history = shared.lock().expect("history lock").clone();
    let second = runner
        .run("default", &history, b"payload")
        .expect("second run");
    runner.close().expect("workspace removed");

    println!("first_run={first}");
    println!("second_run={second}");
    let recorded: Vec<&str> = history
        .migrations()
        .iter()
        .map(|m| m.identity.canonical())
        .collect();
    println!("history={}", recorded.join(","));
}
