//! Dependency resolver and install orderer core for a source-based package
//! manager.
//!
//! This crate implements the two algorithms at the heart of a Portage-style
//! package manager's dependency handling: a fixed-point constraint resolver
//! ([`resolver`]) that decides which version of every needed package to
//! use, and an install orderer ([`orderer`]) that turns those decisions
//! into a dependency-respecting job list. Everything upstream of resolution
//! (fetching ebuild text, running sandboxes, writing to a filesystem) is
//! out of scope — this crate only decides and orders, matching the split
//! described for its originating `paludis` codebase.

pub mod choice;
pub mod error;
pub mod mask;
pub mod name;
pub mod options;
pub mod orderer;
pub mod package_id;
pub mod repository;
pub mod resolver;
pub mod sanitizer;
pub mod spec;
pub mod version;

pub use choice::{ChangedChoices, Choice, Choices, ChoiceValue};
pub use error::{ResolveError, SuggestRestart};
pub use mask::{Mask, MaskKind};
pub use name::{CategoryName, PackageNamePart, QualifiedPackageName, RepositoryName, SlotName};
pub use options::{ResolverOptions, UseExisting};
pub use orderer::{Job, OrderResult, Orderer, ResolutionError, ResolutionLists};
pub use package_id::{DependencyRole, PackageId, SimplePackageId};
pub use repository::{Environment, InMemoryRepository, Repository};
pub use resolver::{Decision, Resolution, Resolvent, Resolver};
pub use spec::{ChoicePredicate, ChoiceRequirement, DepSpec, DependencyLabel, PackageDepSpec};
pub use version::{Version, VersionOperator};
