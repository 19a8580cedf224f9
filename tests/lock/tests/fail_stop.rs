//! Fail-stop lock tests.
//!
//! Proves:
//! 1. When unit k of N fails, units k+1..N are never attempted
//! 2. `migration_failure` fires exactly once, with a non-empty diagnostic
//!    that carries the handler's stderr
//! 3. The history listener keeps the units that succeeded and drops the one
//!    that failed, so a fixed rerun picks up where the failure left off

#![cfg(unix)]

use std::sync::{Arc, Mutex};

use lock_tests::fixtures::{
    append_script, handler_unit, id, marker_lines, package, Event, Recorder, Repo,
};
use migrant_core::history::MigrationHistory;
use migrant_engine::{HistoryListener, PackagerConfig, RunError, Runner, RunnerConfig};

#[test]
fn failure_stops_the_run_and_reports_once() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("marker.log");

    let units = [id("first", "1"), id("broken", "1"), id("last", "1")];
    repo.publish(&units[0], &handler_unit(&append_script(&marker, "first")));
    repo.publish(
        &units[1],
        &handler_unit("echo 'column already exists' >&2\nexit 3\n"),
    );
    repo.publish(&units[2], &handler_unit(&append_script(&marker, "last")));
    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &units[..])],
        &scratch.path().join("migrations.archive"),
    );

    let shared = Arc::new(Mutex::new(MigrationHistory::new()));
    let recorder = Recorder::new();
    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    runner.add_listener(HistoryListener::new(Arc::clone(&shared)));
    runner.add_listener(recorder.clone());

    let err = runner
        .run("default", &MigrationHistory::new(), b"")
        .unwrap_err();
    match &err {
        RunError::ExecutionFailure {
            identity,
            diagnostic,
        } => {
            assert_eq!(identity, &units[1]);
            assert!(diagnostic.contains("column already exists"), "{diagnostic}");
        }
        other => panic!("expected ExecutionFailure, got {other:?}"),
    }

    assert_eq!(marker_lines(&marker), ["first"]);
    let events = recorder.events();
    assert_eq!(
        &events[..3],
        [
            Event::Pre("first".into()),
            Event::Post("first".into()),
            Event::Pre("broken".into()),
        ]
    );
    assert_eq!(events.len(), 4);
    match &events[3] {
        Event::Failure { unit, diagnostic } => {
            assert_eq!(unit, "broken");
            assert!(!diagnostic.is_empty());
        }
        other => panic!("expected failure event, got {other:?}"),
    }

    let history = shared.lock().unwrap().clone();
    assert!(history.contains(&units[0]));
    assert!(!history.contains(&units[1]));
    assert_eq!(history.len(), 1);

    // The rerun starts at the broken unit and fails there again.
    let rerun = runner.run("default", &history, b"");
    assert!(matches!(rerun, Err(RunError::ExecutionFailure { .. })));
    assert_eq!(marker_lines(&marker), ["first"]);
    runner.close().unwrap();
}

#[test]
fn handler_diagnostic_carries_the_cause_chain() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let unit = id("gone", "1");
    repo.publish(&unit, &handler_unit("exec /nonexistent/program\n"));
    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &[unit][..])],
        &scratch.path().join("migrations.archive"),
    );

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    match runner.run("default", &MigrationHistory::new(), b"") {
        Err(RunError::ExecutionFailure { diagnostic, .. }) => {
            assert!(diagnostic.contains("caused by"), "{diagnostic}");
        }
        other => panic!("expected ExecutionFailure, got {other:?}"),
    }
    runner.close().unwrap();
}
