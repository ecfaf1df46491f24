//! Repositories and the generator/filter query engine (C4, §4.4).
//!
//! Grounded on the teacher's `PackageRepository`/`InMemoryRepository` split:
//! a trait for the storage backend, plus a simple in-memory implementation
//! used by the whole test suite. The generator/filter/selection layer on
//! top is new, modeled on `paludis/generator.cc` and `paludis/filter.cc` as
//! described in §4.4 — composed as plain enums dispatching over
//! `&dyn PackageId` rather than a class hierarchy, since Rust's trait
//! objects already give us the dynamic dispatch the original used virtual
//! functions for.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::mask::Mask;
use crate::name::{QualifiedPackageName, RepositoryName};
use crate::package_id::PackageId;
use crate::spec::PackageDepSpec;
use crate::version::VersionOperator;

/// Storage backend contract: enumerate what a repository holds (§4.4).
pub trait Repository {
    fn name(&self) -> &RepositoryName;
    fn all_packages(&self) -> Vec<QualifiedPackageName>;
    fn versions_for(&self, name: &QualifiedPackageName) -> Vec<Arc<dyn PackageId>>;

    fn all_ids(&self) -> Vec<Arc<dyn PackageId>> {
        self.all_packages()
            .into_iter()
            .flat_map(|name| self.versions_for(&name))
            .collect()
    }
}

/// A plain `HashMap`-backed repository, adequate for tests and for small
/// installed-package databases.
pub struct InMemoryRepository {
    name: RepositoryName,
    by_package: HashMap<QualifiedPackageName, Vec<Arc<dyn PackageId>>>,
}

impl InMemoryRepository {
    pub fn new(name: RepositoryName) -> Self {
        Self {
            name,
            by_package: HashMap::new(),
        }
    }

    pub fn add(&mut self, id: Arc<dyn PackageId>) {
        self.by_package.entry(id.name().clone()).or_default().push(id);
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &RepositoryName {
        &self.name
    }

    fn all_packages(&self) -> Vec<QualifiedPackageName> {
        self.by_package.keys().cloned().collect()
    }

    fn versions_for(&self, name: &QualifiedPackageName) -> Vec<Arc<dyn PackageId>> {
        self.by_package.get(name).cloned().unwrap_or_default()
    }
}

/// An `Environment`-equivalent view over every repository in use, in
/// priority order (earlier repositories take precedence in `::repo`-less
/// lookups, matching the original's repository ordering).
#[derive(Default)]
pub struct Environment {
    repositories: Vec<Box<dyn Repository>>,
}

impl Environment {
    pub fn new() -> Self {
        Self { repositories: Vec::new() }
    }

    pub fn add_repository(&mut self, repo: Box<dyn Repository>) {
        self.repositories.push(repo);
    }

    pub fn repository(&self, name: &RepositoryName) -> Option<&dyn Repository> {
        self.repositories.iter().find(|r| r.name() == name).map(|r| r.as_ref())
    }

    pub fn all_ids(&self) -> Vec<Arc<dyn PackageId>> {
        self.repositories.iter().flat_map(|r| r.all_ids()).collect()
    }
}

/// A generator picks a starting candidate set (§4.4): `All`, `Package`, or
/// `InRepository`. `SomeArbitraryVersion` is expressed downstream as a
/// selection rather than a generator, since it only picks among results.
pub enum Generator {
    All,
    Package(QualifiedPackageName),
    InRepository(RepositoryName),
}

impl Generator {
    pub fn select(&self, env: &Environment) -> Vec<Arc<dyn PackageId>> {
        match self {
            Generator::All => env.all_ids(),
            Generator::Package(name) => env
                .repositories
                .iter()
                .flat_map(|r| r.versions_for(name))
                .collect(),
            Generator::InRepository(repo) => env
                .repository(repo)
                .map(|r| r.all_ids())
                .unwrap_or_default(),
        }
    }
}

/// A filter narrows a candidate set (§4.4). Composable via `Filter::and`.
pub enum Filter {
    Matches(PackageDepSpec),
    NotMasked,
    InstalledAtRoot,
    SupportsInstallAction,
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn accepts(&self, id: &dyn PackageId) -> bool {
        match self {
            Filter::Matches(spec) => match_package(spec, id, MatchOptions::default()),
            Filter::NotMasked => !id.is_strongly_masked(),
            Filter::InstalledAtRoot => id.is_installed(),
            Filter::SupportsInstallAction => !id.is_installed(),
            Filter::And(a, b) => a.accepts(id) && b.accepts(id),
        }
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }
}

/// Run a generator then a filter, the idiom every query in this crate uses.
pub fn select(env: &Environment, generator: Generator, filter: &Filter) -> Vec<Arc<dyn PackageId>> {
    generator
        .select(env)
        .into_iter()
        .filter(|id| filter.accepts(id.as_ref()))
        .collect()
}

/// `PackageIDComparator`: orders by name, then version, then slot, then
/// repository, giving a deterministic sort for the selection helpers below.
pub fn compare_ids(a: &dyn PackageId, b: &dyn PackageId) -> Ordering {
    a.name()
        .cmp(b.name())
        .then_with(|| a.version().cmp(b.version()))
        .then_with(|| a.slot().cmp(&b.slot()))
        .then_with(|| a.repository().cmp(b.repository()))
}

/// §4.4 selections, built atop [`select`].
pub struct Selections;

impl Selections {
    pub fn all_versions_sorted(mut ids: Vec<Arc<dyn PackageId>>) -> Vec<Arc<dyn PackageId>> {
        ids.sort_by(|a, b| compare_ids(a.as_ref(), b.as_ref()));
        ids
    }

    pub fn best_version_only(ids: Vec<Arc<dyn PackageId>>) -> Option<Arc<dyn PackageId>> {
        Self::all_versions_sorted(ids).into_iter().last()
    }

    pub fn best_version_in_each_slot(ids: Vec<Arc<dyn PackageId>>) -> Vec<Arc<dyn PackageId>> {
        let sorted = Self::all_versions_sorted(ids);
        let mut by_slot: Vec<(Option<crate::name::SlotName>, Arc<dyn PackageId>)> = Vec::new();
        for id in sorted {
            let slot = id.slot().cloned();
            match by_slot.iter_mut().find(|(s, _)| *s == slot) {
                Some(entry) => entry.1 = id,
                None => by_slot.push((slot, id)),
            }
        }
        by_slot.into_iter().map(|(_, id)| id).collect()
    }

    pub fn some_arbitrary_version(ids: Vec<Arc<dyn PackageId>>) -> Option<Arc<dyn PackageId>> {
        ids.into_iter().next()
    }
}

/// Options governing [`match_package`] (§4.4); mirrors the original's
/// `MatchPackageOptions` bit-set.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub ignore_additional_requirements: bool,
}

/// Does `id` satisfy `spec`? The core of the query engine, and what the
/// sanitizer/resolver call to test candidates against a `PackageDepSpec`.
pub fn match_package(spec: &PackageDepSpec, id: &dyn PackageId, options: MatchOptions) -> bool {
    if let Some(name) = &spec.package {
        if name != id.name() {
            return false;
        }
    }

    if !spec.version_requirements.is_empty() {
        let mut results = spec
            .version_requirements
            .iter()
            .map(|req| version_requirement_matches(req, id));
        let combined = match spec.version_combine {
            Some(crate::spec::VersionCombine::Or) => results.any(|r| r),
            _ => results.all(|r| r),
        };
        if !combined {
            return false;
        }
    }

    if let Some(slot_req) = &spec.slot {
        match slot_req {
            crate::spec::SlotRequirement::Exact(s) => {
                if id.slot() != Some(s) {
                    return false;
                }
            }
            crate::spec::SlotRequirement::AnyLocked | crate::spec::SlotRequirement::AnyUnlocked => {
                if id.slot().is_none() {
                    return false;
                }
            }
        }
    }

    if let Some(repo) = &spec.in_repository {
        if id.repository() != repo {
            return false;
        }
    }

    if !options.ignore_additional_requirements {
        for req in &spec.additional_requirements {
            let enabled = id.choices().flag(&req.flag);
            if enabled == req.inverse {
                return false;
            }
        }
    }

    true
}

fn version_requirement_matches(req: &crate::spec::VersionRequirement, id: &dyn PackageId) -> bool {
    let candidate = id.version();
    let constraint = req.version.as_ref();
    match req.operator {
        VersionOperator::Less => candidate.compare(constraint) == Ordering::Less,
        VersionOperator::LessOrEqual => candidate.compare(constraint) != Ordering::Greater,
        VersionOperator::Equal => candidate.compare(constraint) == Ordering::Equal,
        VersionOperator::GreaterOrEqual => candidate.compare(constraint) != Ordering::Less,
        VersionOperator::Greater => candidate.compare(constraint) == Ordering::Greater,
        VersionOperator::Tilde => candidate.tilde_compare(constraint),
        VersionOperator::TildeGreater => candidate.tilde_greater_compare(constraint),
        VersionOperator::EqualGlob => candidate.nice_equal_star_compare(constraint),
        VersionOperator::EqualGlobStupid => candidate.stupid_equal_star_compare(constraint),
    }
}

/// Masks that would be tolerated under the override set in force; kept as a
/// free function since both the repository layer and the sanitizer consult
/// it (§4.6 compatibility wart: a self-block is a QA warning, not an error,
/// whenever every mask on the offending ID is overridable).
pub fn overridable_masks(masks: &[Mask]) -> impl Iterator<Item = &Mask> {
    masks.iter().filter(|m| m.overridable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{CategoryName, PackageNamePart};
    use crate::package_id::SimplePackageId;
    use crate::version::Version;

    fn qpn(cat: &str, pkg: &str) -> QualifiedPackageName {
        QualifiedPackageName::new(CategoryName::new(cat).unwrap(), PackageNamePart::new(pkg).unwrap())
    }

    fn id(pkg: &str, version: &str) -> Arc<dyn PackageId> {
        Arc::new(SimplePackageId::new(
            qpn("cat", pkg),
            Version::parse(version).unwrap(),
            RepositoryName::new("gentoo").unwrap(),
        ))
    }

    #[test]
    fn in_memory_repository_round_trips() {
        let mut repo = InMemoryRepository::new(RepositoryName::new("gentoo").unwrap());
        repo.add(id("foo", "1.0"));
        repo.add(id("foo", "2.0"));
        assert_eq!(repo.versions_for(&qpn("cat", "foo")).len(), 2);
    }

    #[test]
    fn best_version_only_picks_highest() {
        let ids = vec![id("foo", "1.0"), id("foo", "2.0"), id("foo", "1.5")];
        let best = Selections::best_version_only(ids).unwrap();
        assert_eq!(best.version().as_str(), "2.0");
    }

    #[test]
    fn match_package_checks_name_and_version() {
        let spec = PackageDepSpec {
            version_requirements: vec![crate::spec::VersionRequirement {
                operator: VersionOperator::GreaterOrEqual,
                version: std::rc::Rc::new(Version::parse("1.5").unwrap()),
            }],
            ..PackageDepSpec::for_package(qpn("cat", "foo"))
        };
        assert!(match_package(&spec, id("foo", "2.0").as_ref(), MatchOptions::default()));
        assert!(!match_package(&spec, id("foo", "1.0").as_ref(), MatchOptions::default()));
    }

    #[test]
    fn select_combines_generator_and_filter() {
        let mut env = Environment::new();
        let mut repo = InMemoryRepository::new(RepositoryName::new("gentoo").unwrap());
        repo.add(id("foo", "1.0"));
        repo.add(id("foo", "2.0"));
        env.add_repository(Box::new(repo));
        let spec = PackageDepSpec::for_package(qpn("cat", "foo"));
        let found = select(&env, Generator::All, &Filter::Matches(spec));
        assert_eq!(found.len(), 2);
    }
}
