//! Scope isolation lock tests.
//!
//! Proves:
//! 1. Two units whose closures carry conflicting versions of the same
//!    library each see only their own version
//! 2. Nothing a handler leaves in its scope is visible to the next unit
//! 3. Handlers see a cleared environment
//! 4. Plain dependencies that share a file name stay distinct in the scope

#![cfg(unix)]

use lock_tests::fixtures::{handler_unit, id, marker_lines, package, MapResolver, Repo};
use migrant_core::history::MigrationHistory;
use migrant_core::identity::{ResolvedDependency, UnitIdentity};
use migrant_engine::{PackagerConfig, Runner, RunnerConfig};
use migrant_scope::UnitBuilder;

// ---------------------------------------------------------------------------
// 1. Conflicting dependency versions
// ---------------------------------------------------------------------------

#[test]
fn conflicting_dependency_versions_do_not_leak() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("seen.log");

    let lib_v1 = id("codec", "1");
    let lib_v2 = id("codec", "2");
    repo.publish(&lib_v1, &UnitBuilder::new().file("lib/codec.version", "1\n"));
    repo.publish(&lib_v2, &UnitBuilder::new().file("lib/codec.version", "2\n"));

    let check = |expected: &str| {
        format!(
            "v=$(cat lib/codec.version)\n\
             [ \"$v\" = \"{expected}\" ] || {{ echo \"saw codec $v\" >&2; exit 1; }}\n\
             echo \"$v\" >> '{}'\n",
            marker.display()
        )
    };
    let old = id("old-format", "1");
    let new = id("new-format", "1");
    repo.publish(&old, &handler_unit(&check("1")).classpath(vec![lib_v1]));
    repo.publish(&new, &handler_unit(&check("2")).classpath(vec![lib_v2]));

    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &[old, new][..])],
        &scratch.path().join("migrations.archive"),
    );

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    assert_eq!(runner.run("default", &MigrationHistory::new(), b"").unwrap(), 2);
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["1", "2"]);
}

// ---------------------------------------------------------------------------
// 2. Scope state does not carry over
// ---------------------------------------------------------------------------

#[test]
fn files_written_in_one_scope_are_gone_in_the_next() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("leak.log");

    let writer = id("writer", "1");
    let reader = id("reader", "1");
    repo.publish(&writer, &handler_unit("echo leaked > scratch.txt\n"));
    repo.publish(
        &reader,
        &handler_unit(&format!(
            "if [ -e scratch.txt ]; then echo leaked >> '{m}'; else echo clean >> '{m}'; fi\n",
            m = marker.display()
        )),
    );

    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &[writer, reader][..])],
        &scratch.path().join("migrations.archive"),
    );

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    runner.run("default", &MigrationHistory::new(), b"").unwrap();
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["clean"]);
}

// ---------------------------------------------------------------------------
// 3. Cleared environment
// ---------------------------------------------------------------------------

#[test]
fn host_environment_is_not_inherited() {
    let repo = Repo::new();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("env.log");

    let unit = id("env", "1");
    repo.publish(
        &unit,
        &handler_unit(&format!(
            "echo \"home=${{HOME:-unset}} entry=$MIGRANT_ENTRY_POINT\" >> '{}'\n",
            marker.display()
        )),
    );
    let archive = package(
        repo.resolver(),
        PackagerConfig::default(),
        &[("default", &[unit][..])],
        &scratch.path().join("migrations.archive"),
    );

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    runner.run("default", &MigrationHistory::new(), b"").unwrap();
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["home=unset entry=migrate"]);
}

// ---------------------------------------------------------------------------
// 4. Plain members with the same file name
// ---------------------------------------------------------------------------

#[test]
fn plain_dependencies_sharing_a_file_name_are_both_visible() {
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("util.log");

    let mut deps = Vec::new();
    let mut reads = String::new();
    for group in ["org.alpha", "org.beta"] {
        let util = UnitIdentity::new(group, "util", "1", "txt", None).unwrap();
        let file = scratch.path().join(group).join("util-1.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, format!("{group}\n")).unwrap();
        reads.push_str(&format!(
            "cat 'lib/{}' >> '{}'\n",
            util.canonical_path(),
            marker.display()
        ));
        deps.push(ResolvedDependency::new(util, file));
    }

    let unit = id("uses-both", "1");
    let unit_file = scratch.path().join("uses-both.archive");
    handler_unit(&reads).write(&unit_file).unwrap();
    let mut resolver = MapResolver::default();
    resolver.insert(unit.clone(), unit_file, deps);

    let archive = package(
        resolver,
        PackagerConfig::default(),
        &[("default", &[unit][..])],
        &scratch.path().join("migrations.archive"),
    );

    let mut runner = Runner::open(&archive, RunnerConfig::default()).unwrap();
    assert_eq!(runner.run("default", &MigrationHistory::new(), b"").unwrap(), 1);
    runner.close().unwrap();
    assert_eq!(marker_lines(&marker), ["org.alpha", "org.beta"]);
}
