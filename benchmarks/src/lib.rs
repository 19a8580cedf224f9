//! Shared helpers for migrant benchmark suites.

use migrant_core::identity::UnitIdentity;
use migrant_engine::LocalRepositoryResolver;
use migrant_scope::{EntryPointDescriptor, UnitBuilder};

/// A scratch local repository holding `units` handler units that all share
/// one library unit.
pub struct BenchRepo {
    dir: tempfile::TempDir,
    /// Handler units, oldest first.
    pub units: Vec<UnitIdentity>,
}

impl BenchRepo {
    /// Build the repository. Each handler is a no-op `/bin/sh` script and
    /// carries `payload_bytes` of filler so archive sizes scale.
    ///
    /// # Panics
    ///
    /// Panics if the repository cannot be written. Bench-only invariant.
    #[must_use]
    pub fn build(units: usize, payload_bytes: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalRepositoryResolver::new(dir.path());

        let lib = identity("lib", 0);
        publish(
            &resolver,
            &lib,
            &UnitBuilder::new().file("lib/shared.txt", vec![b'x'; payload_bytes]),
        );

        let mut identities = Vec::with_capacity(units);
        for i in 0..units {
            let unit = identity("step", i);
            let builder = UnitBuilder::new()
                .entry_point(
                    "migrate",
                    EntryPointDescriptor::handler("bin/migrate.sh", Some("/bin/sh")),
                )
                .file("bin/migrate.sh", "true\n")
                .file("share/filler.bin", vec![b'y'; payload_bytes])
                .classpath(vec![lib.clone()]);
            publish(&resolver, &unit, &builder);
            identities.push(unit);
        }
        Self {
            dir,
            units: identities,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> LocalRepositoryResolver {
        LocalRepositoryResolver::new(self.dir.path())
    }
}

fn identity(prefix: &str, i: usize) -> UnitIdentity {
    UnitIdentity::simple("org.bench", format!("{prefix}-{i:04}"), "1").unwrap()
}

fn publish(resolver: &LocalRepositoryResolver, identity: &UnitIdentity, builder: &UnitBuilder) {
    let location = resolver.location(identity);
    std::fs::create_dir_all(location.parent().unwrap()).unwrap();
    builder.write(&location).unwrap();
}
