//! Resolve and order a small hand-built repository: an any-group choice
//! between `openssl`/`libressl`, a USE-conditional dependency, and a linear
//! chain feeding the orderer.

use std::sync::Arc;

use paludis_resolver::{
    ChoicePredicate, Choices, DepSpec, Environment, InMemoryRepository, Orderer, PackageDepSpec,
    QualifiedPackageName, RepositoryName, Resolver, ResolverOptions, SimplePackageId, Version,
};

fn qpn(text: &str) -> QualifiedPackageName {
    QualifiedPackageName::parse(text).unwrap()
}

fn pkg(text: &str) -> DepSpec {
    DepSpec::Package(PackageDepSpec::for_package(qpn(text)))
}

fn build_repository() -> InMemoryRepository {
    let gentoo = RepositoryName::new("gentoo").unwrap();
    let mut repo = InMemoryRepository::new(gentoo.clone());

    let openssl = SimplePackageId::new(qpn("dev-libs/openssl"), Version::parse("3.2.0").unwrap(), gentoo.clone());
    let libressl = SimplePackageId::new(qpn("dev-libs/libressl"), Version::parse("3.9.0").unwrap(), gentoo.clone());
    let zlib = SimplePackageId::new(qpn("sys-libs/zlib"), Version::parse("1.3.1").unwrap(), gentoo.clone());
    let certifi = SimplePackageId::new(qpn("dev-python/certifi"), Version::parse("2024.2.2").unwrap(), gentoo.clone());

    let curl_deps = DepSpec::All(vec![
        pkg("sys-libs/zlib"),
        DepSpec::Any(vec![pkg("dev-libs/openssl"), pkg("dev-libs/libressl")]),
        DepSpec::Conditional {
            predicate: ChoicePredicate { flag: "ssl".to_string(), inverse: false },
            children: vec![pkg("dev-python/certifi")],
        },
    ]);
    let curl = SimplePackageId::new(qpn("net-misc/curl"), Version::parse("8.7.1").unwrap(), gentoo)
        .with_build_depend(curl_deps)
        .with_choices(Choices::single("ssl", true));

    repo.add(Arc::new(openssl));
    repo.add(Arc::new(libressl));
    repo.add(Arc::new(zlib));
    repo.add(Arc::new(certifi));
    repo.add(Arc::new(curl));
    repo
}

fn main() {
    tracing_subscriber::fmt::init();

    let repo = build_repository();
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver
        .resolve_target(PackageDepSpec::for_package(qpn("net-misc/curl")))
        .expect("resolve should succeed");

    println!("Decisions:");
    for resolvent in resolver.decision_order() {
        let decision = resolver.resolutions().get(resolvent).and_then(|r| r.decision.as_ref());
        println!("  {resolvent}: {decision:?}");
    }

    let order = Orderer::new(resolver.resolutions()).order();
    println!("\nJobs:");
    for job in &order.jobs {
        println!("  {job:?}");
    }
    if !order.notes.is_empty() {
        println!("\nNotes:");
        for note in &order.notes {
            println!("  {}: {}", note.resolvent, note.message);
        }
    }
}
