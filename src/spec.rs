//! Dependency specification algebra (C2, §4.2).
//!
//! A spec tree is immutable and shareable; mutation produces a clone.
//! Grounded on `paludis/dep_spec.cc`: one closed family of leaf/group/
//! conditional node kinds, modeled here as a single generic tree over a
//! leaf payload so the dependency, license, and plain-text/URI flavors
//! (§4.2) share one traversal shape.

use std::fmt;
use std::rc::Rc;

use crate::name::QualifiedPackageName;
use crate::version::{Version, VersionOperator};

/// How multiple version requirements on one `PackageDepSpec` combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCombine {
    And,
    Or,
}

/// A single `operator version` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    pub operator: VersionOperator,
    pub version: Rc<Version>,
}

/// Slot constraint on a `PackageDepSpec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRequirement {
    Exact(crate::name::SlotName),
    AnyLocked,
    AnyUnlocked,
}

/// A single choice (USE-flag-like) predicate attached to a `PackageDepSpec`,
/// e.g. `foo[ssl]`, `foo[-debug]`, `foo[ssl?]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRequirement {
    pub flag: String,
    pub inverse: bool,
    /// `foo[ssl?]` — only required if presently enabled on the dependent.
    pub conditional_on_self: bool,
}

/// A bare package constraint: `category/package[:slot][op version][::repo][[choices]]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageDepSpec {
    pub package: Option<QualifiedPackageName>,
    pub version_requirements: Vec<VersionRequirement>,
    pub version_combine: Option<VersionCombine>,
    pub slot: Option<SlotRequirement>,
    pub in_repository: Option<crate::name::RepositoryName>,
    pub from_repository: Option<crate::name::RepositoryName>,
    pub installed_at_path: Option<std::path::PathBuf>,
    pub additional_requirements: Vec<ChoiceRequirement>,
}

impl PackageDepSpec {
    pub fn for_package(name: QualifiedPackageName) -> Self {
        Self {
            package: Some(name),
            ..Default::default()
        }
    }
}

impl fmt::Display for PackageDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.package {
            write!(f, "{p}")?;
        } else {
            write!(f, "*/*")?;
        }
        for req in &self.version_requirements {
            let op = match req.operator {
                VersionOperator::Less => "<",
                VersionOperator::LessOrEqual => "<=",
                VersionOperator::Equal => "=",
                VersionOperator::GreaterOrEqual => ">=",
                VersionOperator::Greater => ">",
                VersionOperator::Tilde => "~",
                VersionOperator::TildeGreater => "~>",
                VersionOperator::EqualGlob | VersionOperator::EqualGlobStupid => "=",
            };
            write!(f, "-{op}{}", req.version)?;
        }
        if let Some(slot) = &self.slot {
            match slot {
                SlotRequirement::Exact(s) => write!(f, ":{s}")?,
                SlotRequirement::AnyLocked => write!(f, ":=")?,
                SlotRequirement::AnyUnlocked => write!(f, ":*")?,
            }
        }
        if let Some(r) = &self.in_repository {
            write!(f, "::{r}")?;
        }
        if !self.additional_requirements.is_empty() {
            write!(f, "[")?;
            for (i, c) in self.additional_requirements.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                if c.inverse {
                    write!(f, "-")?;
                }
                write!(f, "{}", c.flag)?;
                if c.conditional_on_self {
                    write!(f, "?")?;
                }
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Dependency-class / URI label, pushed onto the active-label stack by the
/// sanitizer (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyLabel {
    Build,
    Run,
    Post,
    Fetch,
    Test,
    CompileAgainst,
    Suggestion,
    Recommendation,
}

impl DependencyLabel {
    /// §4.8.1 classification into `build | run | post | fetch`.
    pub fn classify(self) -> EdgeClass {
        match self {
            DependencyLabel::Build | DependencyLabel::Test | DependencyLabel::CompileAgainst => {
                EdgeClass::Build
            }
            DependencyLabel::Fetch => EdgeClass::Fetch,
            DependencyLabel::Run => EdgeClass::Run,
            DependencyLabel::Post | DependencyLabel::Suggestion | DependencyLabel::Recommendation => {
                EdgeClass::Post
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClass {
    Build,
    Fetch,
    Run,
    Post,
}

/// An opaque condition attached to a `Conditional` node: "is the named
/// choice (optionally inverted) enabled on the evaluating ID".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePredicate {
    pub flag: String,
    pub inverse: bool,
}

/// One node of a dependency spec tree (§3, §4.2). Value-typed; `clone()` is
/// a deep structural copy, matching the source's `clone(tree)` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepSpec {
    Package(PackageDepSpec),
    Block {
        spec: PackageDepSpec,
        strong: bool,
    },
    All(Vec<DepSpec>),
    Any(Vec<DepSpec>),
    Conditional {
        predicate: ChoicePredicate,
        children: Vec<DepSpec>,
    },
    NamedSet(String),
    Label(DependencyLabel),
}

impl DepSpec {
    /// `for_each(tree, visitor)`: visits direct children of `All`/`Any`/
    /// `Conditional` without evaluating any conditional (§4.2).
    pub fn for_each_child<'a>(&'a self, mut visitor: impl FnMut(&'a DepSpec)) {
        match self {
            DepSpec::All(children) | DepSpec::Any(children) => {
                for c in children {
                    visitor(c);
                }
            }
            DepSpec::Conditional { children, .. } => {
                for c in children {
                    visitor(c);
                }
            }
            DepSpec::Package(_) | DepSpec::Block { .. } | DepSpec::NamedSet(_) | DepSpec::Label(_) => {}
        }
    }

    /// Stable string form suitable for caching and diagnostics (§4.2).
    pub fn render(&self) -> String {
        match self {
            DepSpec::Package(p) => p.to_string(),
            DepSpec::Block { spec, strong } => format!("{}{}", if *strong { "!!" } else { "!" }, spec),
            DepSpec::All(children) => children.iter().map(DepSpec::render).collect::<Vec<_>>().join(" "),
            DepSpec::Any(children) => format!(
                "|| ( {} )",
                children.iter().map(DepSpec::render).collect::<Vec<_>>().join(" ")
            ),
            DepSpec::Conditional { predicate, children } => format!(
                "{}{}? ( {} )",
                if predicate.inverse { "!" } else { "" },
                predicate.flag,
                children.iter().map(DepSpec::render).collect::<Vec<_>>().join(" ")
            ),
            DepSpec::NamedSet(name) => format!("@{name}"),
            DepSpec::Label(label) => format!("{label:?}").to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::QualifiedPackageName;

    fn pkg(name: &str) -> DepSpec {
        DepSpec::Package(PackageDepSpec::for_package(QualifiedPackageName::parse(name).unwrap()))
    }

    #[test]
    fn render_all_group() {
        let tree = DepSpec::All(vec![pkg("cat/a"), pkg("cat/b")]);
        assert_eq!(tree.render(), "cat/a cat/b");
    }

    #[test]
    fn render_any_group() {
        let tree = DepSpec::Any(vec![pkg("cat/a"), pkg("cat/b")]);
        assert_eq!(tree.render(), "|| ( cat/a cat/b )");
    }

    #[test]
    fn for_each_visits_direct_children_only() {
        let inner = DepSpec::All(vec![pkg("cat/b")]);
        let tree = DepSpec::All(vec![pkg("cat/a"), inner.clone()]);
        let mut seen = Vec::new();
        tree.for_each_child(|c| seen.push(c.clone()));
        assert_eq!(seen, vec![pkg("cat/a"), inner]);
    }

    #[test]
    fn conditional_does_not_recurse_during_for_each() {
        let tree = DepSpec::Conditional {
            predicate: ChoicePredicate {
                flag: "ssl".to_string(),
                inverse: false,
            },
            children: vec![pkg("cat/a")],
        };
        let mut count = 0;
        tree.for_each_child(|_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn block_render_distinguishes_strong() {
        let spec = PackageDepSpec::for_package(QualifiedPackageName::parse("cat/a").unwrap());
        let weak = DepSpec::Block { spec: spec.clone(), strong: false };
        let strong = DepSpec::Block { spec, strong: true };
        assert_eq!(weak.render(), "!cat/a");
        assert_eq!(strong.render(), "!!cat/a");
    }

    #[test]
    fn label_classification() {
        assert_eq!(DependencyLabel::Build.classify(), EdgeClass::Build);
        assert_eq!(DependencyLabel::Fetch.classify(), EdgeClass::Fetch);
        assert_eq!(DependencyLabel::Run.classify(), EdgeClass::Run);
        assert_eq!(DependencyLabel::Suggestion.classify(), EdgeClass::Post);
    }
}
