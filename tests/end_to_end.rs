//! End-to-end resolve-then-order scenarios (§8), each building a small
//! `InMemoryRepository` fixture and driving `Resolver::resolve_target()` +
//! `Orderer::order()` to completion.

use std::sync::Arc;

use paludis_resolver::{
    ChoicePredicate, DepSpec, Environment, InMemoryRepository, Job, Mask, Orderer,
    PackageDepSpec, QualifiedPackageName, RepositoryName, Resolver, ResolverOptions,
    SimplePackageId, Version,
};
use pretty_assertions::assert_eq;

fn qpn(text: &str) -> QualifiedPackageName {
    QualifiedPackageName::parse(text).unwrap()
}

fn pkg(text: &str) -> DepSpec {
    DepSpec::Package(PackageDepSpec::for_package(qpn(text)))
}

fn gentoo() -> RepositoryName {
    RepositoryName::new("gentoo").unwrap()
}

fn env_with(ids: Vec<SimplePackageId>) -> Environment {
    let mut repo = InMemoryRepository::new(gentoo());
    for id in ids {
        repo.add(Arc::new(id));
    }
    let mut env = Environment::new();
    env.add_repository(Box::new(repo));
    env
}

/// The label sequence (`pretend`/`fetch`/`install`/`uninstall`) of every job
/// belonging to `name`'s resolvent, in emitted order.
fn job_labels_for(jobs: &[Job], name: &str) -> Vec<&'static str> {
    jobs.iter()
        .filter_map(|j| {
            let (resolvent, label) = match j {
                Job::Pretend { resolvent } => (resolvent, "pretend"),
                Job::Fetch { resolvent } => (resolvent, "fetch"),
                Job::Install { resolvent, .. } => (resolvent, "install"),
                Job::Uninstall { resolvent } => (resolvent, "uninstall"),
            };
            (resolvent.package.to_string() == name).then_some(label)
        })
        .collect()
}

fn install_positions(jobs: &[Job]) -> Vec<(usize, QualifiedPackageName)> {
    jobs.iter()
        .enumerate()
        .filter_map(|(i, j)| match j {
            Job::Install { resolvent, .. } => Some((i, resolvent.package.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn scenario_1_leaf_install() {
    let id = SimplePackageId::new(qpn("cat/foo"), Version::parse("1").unwrap(), gentoo());
    let env = env_with(vec![id]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/foo"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();
    assert!(order.unorderable.is_empty());
    assert!(matches!(order.jobs[0], Job::Pretend { .. }));
    assert!(matches!(order.jobs[1], Job::Fetch { .. }));
    assert!(matches!(order.jobs[2], Job::Install { .. }));
    assert_eq!(order.jobs.len(), 3);
}

#[test]
fn scenario_2_linear_dependency_chain() {
    let c = SimplePackageId::new(qpn("cat/c"), Version::parse("1").unwrap(), gentoo());
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("cat/c"));
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("cat/b"));
    let env = env_with(vec![c, b, a]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();

    // Every taken `ChangesToMake` resolvent gets exactly pretend, fetch, then
    // install, in that order (§8 orderer invariants) — checked per package
    // rather than across the whole job list, since independent branches of
    // the NAG have no ordering obligation to each other.
    for name in ["cat/a", "cat/b", "cat/c"] {
        assert_eq!(job_labels_for(&order.jobs, name), vec!["pretend", "fetch", "install"]);
    }

    let installs = install_positions(&order.jobs);
    assert_eq!(installs.len(), 3);

    let position = |name: &str| installs.iter().find(|(_, p)| p.to_string() == name).unwrap().0;
    assert!(position("cat/c") < position("cat/b"));
    assert!(position("cat/b") < position("cat/a"));

    let install_a = order
        .jobs
        .iter()
        .find_map(|j| match j {
            Job::Install { resolvent, requirements } if resolvent.package.to_string() == "cat/a" => Some(requirements),
            _ => None,
        })
        .unwrap();
    let install_b_number = position("cat/b");
    assert!(install_a.require_for_satisfied.contains(&install_b_number));
}

#[test]
fn scenario_3_any_group_falls_back_to_present_option() {
    let present = SimplePackageId::new(qpn("cat/present"), Version::parse("1").unwrap(), gentoo());
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Any(vec![pkg("cat/missing"), pkg("cat/present")]));
    let env = env_with(vec![present, a]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();
    let installs = install_positions(&order.jobs);
    assert!(installs.iter().any(|(_, p)| p.to_string() == "cat/present"));
    assert!(!installs.iter().any(|(_, p)| p.to_string() == "cat/missing"));
}

#[test]
fn scenario_3b_any_group_installs_only_the_first_viable_child() {
    // Both children of `|| ( cat/x cat/y )` are installable; §4.7.4 says
    // take the first and leave the rest alone, not install both.
    let x = SimplePackageId::new(qpn("cat/x"), Version::parse("1").unwrap(), gentoo());
    let y = SimplePackageId::new(qpn("cat/y"), Version::parse("1").unwrap(), gentoo());
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Any(vec![pkg("cat/x"), pkg("cat/y")]));
    let env = env_with(vec![x, y, a]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();
    let installs = install_positions(&order.jobs);
    assert!(installs.iter().any(|(_, p)| p.to_string() == "cat/x"));
    assert!(!installs.iter().any(|(_, p)| p.to_string() == "cat/y"));
}

#[test]
fn scenario_3c_any_group_raises_no_resolvable_option_when_every_child_fails() {
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Any(vec![pkg("cat/missing1"), pkg("cat/missing2")]));
    let env = env_with(vec![a]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    let result = resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a")));

    match result {
        Err(paludis_resolver::ResolveError::NoResolvableOption { collected }) => {
            assert_eq!(collected.len(), 2);
        }
        other => panic!("expected NoResolvableOption, got {other:?}"),
    }
}

#[test]
fn scenario_4_all_masked_yields_unable_to_make_with_candidates() {
    let masked = SimplePackageId::new(qpn("cat/only-masked"), Version::parse("1").unwrap(), gentoo())
        .with_mask(Mask::repository("package.mask", vec!["broken upstream".to_string()]));
    let env = env_with(vec![masked]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/only-masked"))).unwrap();

    let lists = Orderer::new(resolver.resolutions()).resolution_lists();
    assert_eq!(lists.errors.len(), 1);
    let error = &lists.errors[0];
    assert_eq!(error.resolvent.package, qpn("cat/only-masked"));
    assert_eq!(error.candidates.len(), 1);
    assert!(error.candidates[0].id_display.contains("cat/only-masked"));
}

#[test]
fn scenario_5_cycle_on_build_dep_is_unorderable() {
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("cat/b"));
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("cat/a"));
    let env = env_with(vec![a, b]);

    // A mutual build dependency settles at the resolver level (each
    // resolvent's decision is committed before its own dependencies are
    // recursed into, so the recursion back into the already-decided
    // resolvent is a no-op, not a re-decide) and only then reaches the
    // orderer's cycle-breaking ladder, which cannot route around an
    // unmet build-type edge in both directions (§4.7.6, §8 scenario 5).
    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();
    assert_eq!(order.unorderable.len(), 2);
    assert!(order.notes.iter().any(|n| n.message.contains("In unsolvable cycle")));
    for name in ["cat/a", "cat/b"] {
        assert!(order.unorderable.iter().any(|r| r.package.to_string() == name));
    }
}

#[test]
fn scenario_6_cycle_on_run_dep_only_is_ordered_with_a_note() {
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_run_depend(pkg("cat/b"));
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo())
        .with_run_depend(pkg("cat/a"));
    let env = env_with(vec![a, b]);

    // Same mutual cycle as scenario 5, but both edges are run-only, so the
    // orderer schedules both members instead of giving up on them (§8
    // scenario 6) — driven from a real `resolve_target()` now that cycles
    // settle instead of tripping the recursion guard.
    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let order = Orderer::new(resolver.resolutions()).order();
    assert!(order.unorderable.is_empty());
    let installs = install_positions(&order.jobs);
    assert_eq!(installs.len(), 2);
    assert!(order.notes.iter().any(|n| n.message.contains("run dependency cycle")));
}

#[test]
fn scenario_7_strong_block_prevents_install() {
    // §8 scenario 7 targets *both* packages: `cat/a` strongly blocks
    // `cat/b`, and the target set contains both, so `cat/b` does have a
    // `Require` constraint of its own (from being a target, not just from
    // being blocked). With nothing installed to remove, the block still
    // cannot be routed around, so this is a `BlockError` — but for the
    // right reason, not because `cat/b` was left out of the target set.
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Block { spec: PackageDepSpec::for_package(qpn("cat/b")), strong: true });
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo());
    let env = env_with(vec![a, b]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();
    let result = resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/b")));

    match result {
        Err(paludis_resolver::ResolveError::BlockError { message }) => {
            assert!(message.contains("cat/a"));
        }
        other => panic!("expected BlockError, got {other:?}"),
    }
}

#[test]
fn scenario_7d_strong_block_with_neither_side_required_is_vacuous() {
    // Neither `cat/a` (the blocker) nor `cat/b` (the blocked package) is
    // targeted or installed directly — only `cat/top` depends on `cat/a`.
    // `cat/b` is available in the repo but nothing requires it and nothing
    // is installed there, so the block on it is vacuously satisfied: no
    // error, and `cat/b`'s resolvent resolves to `NothingNoChange`.
    let top = SimplePackageId::new(qpn("cat/top"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("cat/a"));
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Block { spec: PackageDepSpec::for_package(qpn("cat/b")), strong: true });
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo());
    let env = env_with(vec![top, a, b]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/top"))).unwrap();

    let b_resolvent = paludis_resolver::Resolvent::new(qpn("cat/b"), paludis_resolver::resolver::DestinationType::Install);
    let decision = resolver.resolutions().get(&b_resolvent).unwrap().decision.as_ref().unwrap();
    assert!(matches!(decision, paludis_resolver::Decision::NothingNoChange));
}

#[test]
fn scenario_7c_strong_block_removes_installed_conflicting_package() {
    // Unlike scenario_7, `cat/b` is already installed, so the strong block
    // has something to remove rather than erroring out (§4.7.2 remove
    // outcome), driven straight from the real resolver this time.
    let a = SimplePackageId::new(qpn("cat/a"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Block { spec: PackageDepSpec::for_package(qpn("cat/b")), strong: true });
    let b = SimplePackageId::new(qpn("cat/b"), Version::parse("1").unwrap(), gentoo()).installed();
    let env = env_with(vec![a, b]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/a"))).unwrap();

    let b_resolvent = paludis_resolver::Resolvent::new(qpn("cat/b"), paludis_resolver::resolver::DestinationType::Install);
    let decision = resolver.resolutions().get(&b_resolvent).unwrap().decision.as_ref().unwrap();
    assert!(matches!(decision, paludis_resolver::Decision::Remove { .. }));

    let order = Orderer::new(resolver.resolutions()).order();
    let install_a = order
        .jobs
        .iter()
        .position(|j| matches!(j, Job::Install { resolvent, .. } if resolvent.package.to_string() == "cat/a"))
        .unwrap();
    let uninstall_b = order
        .jobs
        .iter()
        .position(|j| matches!(j, Job::Uninstall { resolvent } if resolvent.package.to_string() == "cat/b"))
        .unwrap();
    assert!(uninstall_b < install_a);
}

#[test]
fn scenario_7b_strong_block_orders_blocker_before_blocked_removal() {
    use paludis_resolver::resolver::{Constraint, ConstraintKind, DecisionId, DestinationType, Reason};
    use paludis_resolver::{Decision, Resolvent, UseExisting};
    use std::collections::HashMap;

    fn taken(name: &str) -> DecisionId {
        let id = SimplePackageId::new(qpn(name), Version::parse("1").unwrap(), gentoo());
        DecisionId { canonical_form: id.canonical_form(), id: Arc::new(id) }
    }

    // Hand-built resolutions standing in for a resolve where `cat/a` is
    // being installed and `cat/b`, which it strongly blocks, is already
    // scheduled for removal; the blocker/blocked NAG edge should place
    // `cat/b`'s removal before `cat/a`'s install.
    let mut resolutions = HashMap::new();
    let a = Resolvent::new(qpn("cat/a"), DestinationType::Install);
    let b = Resolvent::new(qpn("cat/b"), DestinationType::Uninstall);
    resolutions.insert(
        a.clone(),
        paludis_resolver::Resolution {
            constraints: Vec::new(),
            decision: Some(Decision::ChangesToMake { taken: taken("cat/a") }),
        },
    );
    resolutions.insert(
        b.clone(),
        paludis_resolver::Resolution {
            constraints: vec![Constraint {
                spec: PackageDepSpec::for_package(qpn("cat/b")),
                reason: Reason::Blocker {
                    blocker_display: taken("cat/a").canonical_form,
                    strong: true,
                    already_met: false,
                },
                kind: ConstraintKind::Block { strong: true },
                use_existing: UseExisting::IfPossible,
                untaken: false,
            }],
            decision: Some(Decision::Remove { taken: vec![taken("cat/b")] }),
        },
    );

    let order = Orderer::new(&resolutions).order();
    assert!(order.unorderable.is_empty());
    let install_a = order
        .jobs
        .iter()
        .position(|j| matches!(j, Job::Install { resolvent, .. } if resolvent.package.to_string() == "cat/a"))
        .unwrap();
    let uninstall_b = order
        .jobs
        .iter()
        .position(|j| matches!(j, Job::Uninstall { resolvent } if resolvent.package.to_string() == "cat/b"))
        .unwrap();
    assert!(uninstall_b < install_a);
}

#[test]
fn scenario_9_virtual_package_dependency_is_rewritten_to_its_provider() {
    // `virtual/editor` itself run-depends on the concrete provider; a
    // dependency on the virtual should resolve through to that provider
    // rather than ever settling `virtual/editor` itself (§4.7.5).
    let provider = SimplePackageId::new(qpn("app-editors/vim"), Version::parse("1").unwrap(), gentoo());
    let virt = SimplePackageId::new(qpn("virtual/editor"), Version::parse("0").unwrap(), gentoo())
        .with_run_depend(pkg("app-editors/vim"));
    let dependent = SimplePackageId::new(qpn("cat/top"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(pkg("virtual/editor"));
    let env = env_with(vec![provider, virt, dependent]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("cat/top"))).unwrap();

    let provider_resolvent =
        paludis_resolver::Resolvent::new(qpn("app-editors/vim"), paludis_resolver::resolver::DestinationType::Install);
    assert!(resolver.resolutions().contains_key(&provider_resolvent));
    let virtual_resolvent =
        paludis_resolver::Resolvent::new(qpn("virtual/editor"), paludis_resolver::resolver::DestinationType::Install);
    assert!(!resolver.resolutions().contains_key(&virtual_resolvent));
}

#[test]
fn scenario_8_use_conditional_dependency_follows_dependents_choices() {
    let ssl = SimplePackageId::new(qpn("dev-libs/openssl"), Version::parse("3.0").unwrap(), gentoo());
    let curl = SimplePackageId::new(qpn("net-misc/curl"), Version::parse("1").unwrap(), gentoo())
        .with_build_depend(DepSpec::Conditional {
            predicate: ChoicePredicate { flag: "ssl".to_string(), inverse: false },
            children: vec![pkg("dev-libs/openssl")],
        })
        .with_choices(paludis_resolver::Choices::single("ssl", false));
    let env = env_with(vec![ssl, curl]);

    let mut resolver = Resolver::new(&env, ResolverOptions::default());
    resolver.resolve_target(PackageDepSpec::for_package(qpn("net-misc/curl"))).unwrap();

    let openssl_resolvent = paludis_resolver::Resolvent::new(qpn("dev-libs/openssl"), paludis_resolver::resolver::DestinationType::Install);
    assert!(!resolver.resolutions().contains_key(&openssl_resolvent));
}
