//! Demonstrates the resolver's failure modes: a missing dependency, every
//! candidate masked, a recursion limit tripped by an unbroken cycle, and a
//! strong block with nothing else to satisfy the blocked package.

use std::sync::Arc;

use paludis_resolver::resolver::DestinationType;
use paludis_resolver::{
    DepSpec, Environment, InMemoryRepository, Mask, PackageDepSpec, QualifiedPackageName,
    RepositoryName, Resolvent, Resolver, ResolverOptions, SimplePackageId, Version,
};

fn qpn(text: &str) -> QualifiedPackageName {
    QualifiedPackageName::parse(text).unwrap()
}

fn pkg(text: &str) -> DepSpec {
    DepSpec::Package(PackageDepSpec::for_package(qpn(text)))
}

fn gentoo() -> RepositoryName {
    RepositoryName::new("gentoo").unwrap()
}

fn missing_dependency() {
    println!("\n{}\nMissing dependency\n{}", "=".repeat(60), "=".repeat(60));
    let top = SimplePackageId::new(qpn("app-misc/top"), Version::parse("1.0").unwrap(), gentoo())
        .with_build_depend(pkg("app-misc/nonexistent"));
    let mut repo = InMemoryRepository::new(gentoo());
    repo.add(Arc::new(top));
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("app-misc/top"))).unwrap();
    let missing = Resolvent::new(qpn("app-misc/nonexistent"), DestinationType::Install);
    let decision = resolver.resolutions().get(&missing).and_then(|r| r.decision.as_ref());
    println!("  app-misc/nonexistent: {decision:?}");
}

fn every_candidate_masked() {
    println!("\n{}\nEvery candidate masked\n{}", "=".repeat(60), "=".repeat(60));
    let masked = SimplePackageId::new(qpn("sys-libs/glibc"), Version::parse("2.39").unwrap(), gentoo())
        .with_mask(Mask::user("explicitly masked by the administrator"));
    let mut repo = InMemoryRepository::new(gentoo());
    repo.add(Arc::new(masked));
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("sys-libs/glibc"))).unwrap();
    let resolvent = Resolvent::new(qpn("sys-libs/glibc"), DestinationType::Install);
    let decision = resolver.resolutions().get(&resolvent).and_then(|r| r.decision.as_ref());
    println!("  sys-libs/glibc: {decision:?}");
}

fn recursion_limit_tripped() {
    println!(
        "\n{}\nRecursion limit tripped by an unbroken build cycle\n{}",
        "=".repeat(60),
        "=".repeat(60)
    );
    let a = SimplePackageId::new(qpn("dev-libs/a"), Version::parse("1.0").unwrap(), gentoo())
        .with_build_depend(pkg("dev-libs/b"));
    let b = SimplePackageId::new(qpn("dev-libs/b"), Version::parse("1.0").unwrap(), gentoo())
        .with_build_depend(pkg("dev-libs/a"));
    let mut repo = InMemoryRepository::new(gentoo());
    repo.add(Arc::new(a));
    repo.add(Arc::new(b));
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));

    let mut options = ResolverOptions::default();
    options.max_stack_depth = 16;
    let mut resolver = Resolver::new(&env, options);
    match resolver.resolve_target(PackageDepSpec::for_package(qpn("dev-libs/a"))) {
        Ok(()) => println!("  resolved unexpectedly"),
        Err(e) => println!("  {e}"),
    }
}

fn strong_block_prevents_install() {
    println!("\n{}\nStrong block prevents install\n{}", "=".repeat(60), "=".repeat(60));
    let blocker = SimplePackageId::new(qpn("app-misc/a"), Version::parse("1.0").unwrap(), gentoo())
        .with_build_depend(DepSpec::Block { spec: PackageDepSpec::for_package(qpn("app-misc/b")), strong: true });
    let blocked = SimplePackageId::new(qpn("app-misc/b"), Version::parse("1.0").unwrap(), gentoo());
    let mut repo = InMemoryRepository::new(gentoo());
    repo.add(Arc::new(blocker));
    repo.add(Arc::new(blocked));
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));

    // app-misc/a's own build dependency strongly blocks app-misc/b, and
    // nothing else in this repository could satisfy app-misc/b once that
    // block is in force; the sweep that decides app-misc/b as a side
    // effect of resolving app-misc/a is what reports the failure.
    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    match resolver.resolve_target(PackageDepSpec::for_package(qpn("app-misc/a"))) {
        Ok(()) => println!("  resolved unexpectedly"),
        Err(e) => println!("  {e}"),
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    missing_dependency();
    every_candidate_masked();
    recursion_limit_tripped();
    strong_block_prevents_install();
}
