//! Hash domain and source governance lock tests.
//!
//! Proves:
//! 1. Every hash domain has unique, null-terminated bytes
//! 2. All domains follow the `MIGRANT::*::V1\0` naming convention
//! 3. No raw `MIGRANT::` domain literals in library source outside `hash.rs`
//! 4. No `unwrap()`/`expect(` in library source outside test modules

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use migrant_core::hash::HashDomain;

const LIBRARY_DIRS: [&str; 5] = [
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../core/src"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../archive/src"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../scope/src"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../engine/src"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../cli/src"),
];

// ---------------------------------------------------------------------------
// 1. Unique, null-terminated domains
// ---------------------------------------------------------------------------

#[test]
fn hash_domains_are_unique_and_null_terminated() {
    assert_eq!(
        HashDomain::ALL.len(),
        3,
        "if you added a new domain, update this count"
    );
    let mut seen = BTreeSet::new();
    for domain in HashDomain::ALL {
        assert!(seen.insert(domain.as_bytes()), "duplicate domain bytes: {domain:?}");
        assert!(domain.as_bytes().ends_with(&[0]), "{domain:?} is not null-terminated");
    }
}

// ---------------------------------------------------------------------------
// 2. Naming convention
// ---------------------------------------------------------------------------

#[test]
fn hash_domains_follow_naming_convention() {
    for domain in HashDomain::ALL {
        let bytes = domain.as_bytes();
        assert!(bytes.starts_with(b"MIGRANT::"), "{domain:?} does not start with MIGRANT::");
        assert!(bytes.ends_with(b"::V1\0"), "{domain:?} does not end with ::V1\\0");
    }
}

// ---------------------------------------------------------------------------
// 3. Domain literals stay in one file
// ---------------------------------------------------------------------------

#[test]
fn no_raw_domain_literals_outside_hash_module() {
    let violations = scan(&["b\"MIGRANT::"], Some("hash.rs"));
    assert!(
        violations.is_empty(),
        "raw MIGRANT:: domain literals found outside hash.rs:\n{}",
        violations.join("\n")
    );
}

// ---------------------------------------------------------------------------
// 4. No panicking shortcuts in library code
// ---------------------------------------------------------------------------

#[test]
fn no_unwrap_or_expect_outside_tests() {
    let violations = scan(&[".unwrap()", ".expect("], None);
    assert!(
        violations.is_empty(),
        "unwrap/expect found in library source:\n{}",
        violations.join("\n")
    );
}

/// Non-comment lines outside `#[cfg(...test...)]` blocks that contain any of
/// `patterns`, skipping the file named `exempt`.
fn scan(patterns: &[&str], exempt: Option<&str>) -> Vec<String> {
    let mut violations = Vec::new();
    for dir in LIBRARY_DIRS {
        for path in walk(Path::new(dir)) {
            if path.extension().and_then(|e| e.to_str()) != Some("rs") {
                continue;
            }
            if exempt.is_some() && path.file_name().and_then(|n| n.to_str()) == exempt {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            scan_source(&path, &content, patterns, &mut violations);
        }
    }
    violations
}

fn scan_source(path: &Path, content: &str, patterns: &[&str], violations: &mut Vec<String>) {
    // Test modules are skipped by brace depth.
    let mut brace_depth: usize = 0;
    let mut skip_depth: Option<usize> = None;
    let mut cfg_test_pending = false;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(") && trimmed.contains("test") {
            cfg_test_pending = true;
            continue;
        }

        let opens = line.chars().filter(|&c| c == '{').count();
        let closes = line.chars().filter(|&c| c == '}').count();
        if cfg_test_pending && opens > 0 {
            skip_depth = Some(brace_depth);
            cfg_test_pending = false;
        }
        brace_depth = brace_depth.saturating_add(opens).saturating_sub(closes);

        if let Some(depth) = skip_depth {
            if brace_depth <= depth {
                skip_depth = None;
            }
            continue;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        if patterns.iter().any(|p| trimmed.contains(p)) {
            violations.push(format!("  {}:{}: {}", path.display(), i + 1, trimmed));
        }
    }
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                results.extend(walk(&path));
            } else {
                results.push(path);
            }
        }
    }
    results
}
