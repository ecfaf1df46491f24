//! Package identity and lazily-materialized metadata keys (C3, §4.3).
//!
//! `PackageId` is a contract, not a class hierarchy (§4.3): different
//! repository backends can expose wildly different storage, as long as they
//! answer the same questions. [`SimplePackageId`] is the concrete,
//! eagerly-constructed implementation used by [`crate::repository::InMemoryRepository`]
//! and by the test suite; its dependency-tree keys are still realized lazily,
//! behind a [`once_cell::sync::OnceCell`] guarded by the struct itself,
//! mirroring "materialization is idempotent" under a per-ID mutex.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::choice::Choices;
use crate::mask::Mask;
use crate::name::{QualifiedPackageName, RepositoryName, SlotName};
use crate::spec::DepSpec;
use crate::version::Version;

/// The dependency-class role a raw spec tree is fetched under (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyRole {
    Build,
    Run,
    Post,
    Suggested,
}

/// Contract every package identity (installed or installable) satisfies.
pub trait PackageId: fmt::Debug {
    fn name(&self) -> &QualifiedPackageName;
    fn version(&self) -> &Version;
    fn repository(&self) -> &RepositoryName;
    fn slot(&self) -> Option<&SlotName>;
    fn is_installed(&self) -> bool;
    fn masks(&self) -> &[Mask];
    fn choices(&self) -> &Choices;
    fn dependencies(&self, role: DependencyRole) -> Arc<DepSpec>;
    /// `name-version:slot::repository` (§4.3).
    fn canonical_form(&self) -> String {
        let slot = self.slot().map(|s| format!(":{s}")).unwrap_or_default();
        format!("{}-{}{}::{}", self.name(), self.version(), slot, self.repository())
    }
    /// True iff none of `masks()` survive override, i.e. the ID is actually
    /// installable (§3 "strongly masked").
    fn is_strongly_masked(&self) -> bool {
        self.masks().iter().any(|m| !m.overridable)
    }
}

/// Eagerly-known fields plus lazily-realized dependency trees, backing the
/// in-memory test repository.
pub struct SimplePackageId {
    pub name: QualifiedPackageName,
    pub version: Version,
    pub repository: RepositoryName,
    pub slot: Option<SlotName>,
    pub installed: bool,
    pub masks: Vec<Mask>,
    pub choices: Choices,
    build_depend: RawDep,
    run_depend: RawDep,
    post_depend: RawDep,
    suggested_depend: RawDep,
}

/// A raw spec tree plus the once-only cell it materializes into, standing in
/// for a repository-backed `build_dependencies_key()` that would otherwise
/// parse ebuild text on first access.
struct RawDep {
    built: Arc<DepSpec>,
    cell: OnceCell<Arc<DepSpec>>,
}

impl RawDep {
    fn new(tree: DepSpec) -> Self {
        Self {
            built: Arc::new(tree),
            cell: OnceCell::new(),
        }
    }

    fn get(&self) -> Arc<DepSpec> {
        self.cell.get_or_init(|| self.built.clone()).clone()
    }

    fn empty() -> Self {
        Self::new(DepSpec::All(Vec::new()))
    }
}

impl SimplePackageId {
    pub fn new(name: QualifiedPackageName, version: Version, repository: RepositoryName) -> Self {
        Self {
            name,
            version,
            repository,
            slot: None,
            installed: false,
            masks: Vec::new(),
            choices: Choices::default(),
            build_depend: RawDep::empty(),
            run_depend: RawDep::empty(),
            post_depend: RawDep::empty(),
            suggested_depend: RawDep::empty(),
        }
    }

    pub fn with_slot(mut self, slot: SlotName) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn installed(mut self) -> Self {
        self.installed = true;
        self
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.masks.push(mask);
        self
    }

    pub fn with_choices(mut self, choices: Choices) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_build_depend(mut self, tree: DepSpec) -> Self {
        self.build_depend = RawDep::new(tree);
        self
    }

    pub fn with_run_depend(mut self, tree: DepSpec) -> Self {
        self.run_depend = RawDep::new(tree);
        self
    }

    pub fn with_post_depend(mut self, tree: DepSpec) -> Self {
        self.post_depend = RawDep::new(tree);
        self
    }
}

impl fmt::Debug for SimplePackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_form())
    }
}

impl PackageId for SimplePackageId {
    fn name(&self) -> &QualifiedPackageName {
        &self.name
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    fn slot(&self) -> Option<&SlotName> {
        self.slot.as_ref()
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn masks(&self) -> &[Mask] {
        &self.masks
    }

    fn choices(&self) -> &Choices {
        &self.choices
    }

    fn dependencies(&self, role: DependencyRole) -> Arc<DepSpec> {
        match role {
            DependencyRole::Build => self.build_depend.get(),
            DependencyRole::Run => self.run_depend.get(),
            DependencyRole::Post => self.post_depend.get(),
            DependencyRole::Suggested => self.suggested_depend.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qpn() -> QualifiedPackageName {
        QualifiedPackageName::parse("cat/foo").unwrap()
    }

    #[test]
    fn canonical_form_includes_slot_and_repo() {
        let id = SimplePackageId::new(qpn(), Version::parse("1.0").unwrap(), RepositoryName::new("gentoo").unwrap())
            .with_slot(SlotName::new("0").unwrap());
        assert_eq!(id.canonical_form(), "cat/foo-1.0:0::gentoo");
    }

    #[test]
    fn dependency_materialization_is_idempotent() {
        let id = SimplePackageId::new(qpn(), Version::parse("1.0").unwrap(), RepositoryName::new("gentoo").unwrap());
        let a = id.dependencies(DependencyRole::Build);
        let b = id.dependencies(DependencyRole::Build);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn strongly_masked_without_overridable_mask() {
        let id = SimplePackageId::new(qpn(), Version::parse("1.0").unwrap(), RepositoryName::new("gentoo").unwrap())
            .with_mask(Mask::user("testing"));
        assert!(id.is_strongly_masked());
    }
}
