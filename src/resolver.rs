//! The fixed-point dependency resolver (C7, §4.7).
//!
//! Grounded on `paludis/resolver/resolver.cc` and `paludis/resolver/resolutions_by_resolvent.cc`:
//! resolution state is keyed by [`Resolvent`] (package name, slot hint,
//! destination), built up by repeatedly calling [`Resolver::decide`] on
//! whatever resolvents are still undecided until a fixed point is reached.
//! `SuggestRestart` (§4.7.3) is a legitimate non-local control transfer, not
//! an error: raising it unwinds the *current* `resolve()` call so the
//! driver loop can re-run resolution with an extra constraint in place,
//! which is how a later "this suggestion turned out to be a hard
//! dependency" promotion gets applied without a full second pass over
//! everything already decided (§9, mirrored by `resolver.cc`'s comment that
//! the two-pass structure exists so suggestions-turned-hard-deps don't
//! force a restart of already-settled resolvents).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::choice::Choices;
use crate::error::{ResolveError, SuggestRestart, UnsuitableCandidate};
use crate::name::QualifiedPackageName;
use crate::options::{ResolverOptions, UseExisting};
use crate::package_id::{DependencyRole, PackageId};
use crate::repository::{match_package, Environment, Generator, MatchOptions, Selections};
use crate::sanitizer::{compute_already_met, flatten_with_labels, AnyGroupId, ActiveClass, SanitisedDependency};
use crate::spec::{DepSpec, PackageDepSpec};

/// Destination a resolution targets; §3 keeps this as a 3-way enum rather
/// than a boolean since "uninstall" is itself a first-class outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationType {
    Install,
    Fetch,
    Uninstall,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotHint {
    Any,
    Named(crate::name::SlotName),
}

/// The resolution key: which package, in which slot, going where (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resolvent {
    pub package: QualifiedPackageName,
    pub slot: SlotHint,
    pub destination: DestinationType,
}

impl Resolvent {
    pub fn new(package: QualifiedPackageName, destination: DestinationType) -> Self {
        Self { package, slot: SlotHint::Any, destination }
    }
}

impl std::fmt::Display for Resolvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.package)?;
        if let SlotHint::Named(s) = &self.slot {
            write!(f, ":{s}")?;
        }
        Ok(())
    }
}

/// Why a constraint exists, for diagnostics and for the orderer's edge
/// classification (§4.8.1 walks these back to a `Dependency` reason).
#[derive(Debug, Clone)]
pub enum Reason {
    Target,
    Dependency {
        dependent_display: String,
        label_class: crate::spec::EdgeClass,
        /// Was the conditional chain guarding this dependency already true
        /// under the dependent's real (unmodified) choices when it was
        /// sanitised (§4.6)? Feeds the orderer's `*_all_met` edge fields
        /// (§4.8.1).
        already_met: bool,
    },
    /// A `Block` node in some dependent's spec tree (§3, §4.8.1). Strong
    /// blocks get a NAG edge from the blocker to the blocked resolvent's
    /// `done` node; weak blocks are recorded but never ordered against.
    Blocker {
        blocker_display: String,
        strong: bool,
        already_met: bool,
    },
    Set { name: String },
    Virtual { virtual_name: QualifiedPackageName },
}

/// Whether a [`Constraint`] demands a matching candidate (the common case)
/// or forbids one (§3 `BlockSpec`, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Require,
    Block { strong: bool },
}

/// One requirement placed on a resolvent by some reason (§3, §4.7.2).
#[derive(Debug, Clone)]
pub struct Constraint {
    pub spec: PackageDepSpec,
    pub reason: Reason,
    pub kind: ConstraintKind,
    pub use_existing: UseExisting,
    pub untaken: bool,
}

impl Constraint {
    /// Does `id` satisfy this constraint, whether it's a positive
    /// requirement or a negative block (§4.7.2)?
    fn is_satisfied_by(&self, id: &dyn PackageId) -> bool {
        let spec_matches = match_package(&self.spec, id, MatchOptions::default());
        match self.kind {
            ConstraintKind::Require => spec_matches,
            ConstraintKind::Block { .. } => !spec_matches,
        }
    }
}

/// The accumulated state for one resolvent: every constraint seen so far,
/// and the decision reached the last time `decide` ran (§3).
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub constraints: Vec<Constraint>,
    pub decision: Option<Decision>,
}

/// The outcome of deciding a resolvent (§3, §4.7.2).
#[derive(Debug, Clone)]
pub enum Decision {
    NothingNoChange,
    ExistingNoChange { taken: DecisionId },
    ChangesToMake { taken: DecisionId },
    Remove { taken: Vec<DecisionId> },
    /// No candidate could be taken. `candidates` lists every version that
    /// was considered and rejected, empty when nothing matched the
    /// constraint set at all (§4.7.2, §4.9 `UnsuitableCandidates`).
    UnableToMake { reason: String, candidates: Vec<UnsuitableCandidate> },
    Break,
}

/// Whether applying one flattened dependency reached a taken decision or
/// failed on its candidate, so an any-group caller can try the next sibling
/// rather than erroring out immediately (§4.7.4).
#[derive(Debug)]
enum ApplyOutcome {
    Taken,
    Failed(UnsuitableCandidate),
}

/// A lightweight handle identifying the `PackageId` a `Decision` settled on,
/// without forcing `Decision` itself to carry a trait object (keeps
/// `Decision` `Clone` + cheap).
#[derive(Debug, Clone)]
pub struct DecisionId {
    pub canonical_form: String,
    pub id: Arc<dyn PackageId>,
}

impl PartialEq for DecisionId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_form == other.canonical_form
    }
}
impl Eq for DecisionId {}

/// Drives the fixed-point loop over an [`Environment`] (§4.7.1).
pub struct Resolver<'a> {
    env: &'a Environment,
    options: ResolverOptions,
    resolutions: HashMap<Resolvent, Resolution>,
    order: Vec<Resolvent>,
    depth: usize,
    next_any_group: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(env: &'a Environment, options: ResolverOptions) -> Self {
        Self {
            env,
            options,
            resolutions: HashMap::new(),
            order: Vec::new(),
            depth: 0,
            next_any_group: 0,
        }
    }

    pub fn resolutions(&self) -> &HashMap<Resolvent, Resolution> {
        &self.resolutions
    }

    pub fn decision_order(&self) -> &[Resolvent] {
        &self.order
    }

    /// Add a top-level target and resolve it, restarting as many times as
    /// `SuggestRestart` asks for (§4.7.3, §9 two-pass suggestion promotion).
    pub fn resolve_target(&mut self, spec: PackageDepSpec) -> Result<(), ResolveError> {
        loop {
            match self.resolve_target_once(spec.clone()) {
                Ok(()) => return Ok(()),
                Err(RestartOrError::Restart(_)) => continue,
                Err(RestartOrError::Error(e)) => return Err(e),
            }
        }
    }

    fn resolve_target_once(&mut self, spec: PackageDepSpec) -> Result<(), RestartOrError> {
        let resolvent = Resolvent::new(
            spec.package.clone().ok_or_else(|| {
                RestartOrError::Error(ResolveError::BlockError {
                    message: "target spec has no package name".to_string(),
                })
            })?,
            DestinationType::Install,
        );
        self.apply_constraint(
            &resolvent,
            Constraint {
                spec,
                reason: Reason::Target,
                kind: ConstraintKind::Require,
                use_existing: self.options.use_existing,
                untaken: false,
            },
        )?;
        self.decide_if_undecided(&resolvent)?;
        self.run_to_fixed_point()
    }

    /// Backstop sweep: most resolvents are decided as soon as they're first
    /// constrained (`decide` recurses straight into a package's own
    /// dependencies), but a resolvent can be introduced with no recursive
    /// caller in flight (e.g. the very first target). This mops up
    /// anything still undecided without contributing to recursion depth,
    /// since it isn't itself nested inside another `decide` call.
    fn run_to_fixed_point(&mut self) -> Result<(), RestartOrError> {
        loop {
            let pending: Vec<Resolvent> = self
                .resolutions
                .iter()
                .filter(|(_, r)| r.decision.is_none())
                .map(|(k, _)| k.clone())
                .collect();
            if pending.is_empty() {
                break;
            }
            for resolvent in pending {
                self.decide_if_undecided(&resolvent)?;
            }
        }
        Ok(())
    }

    fn decide_if_undecided(&mut self, resolvent: &Resolvent) -> Result<(), RestartOrError> {
        let already = self.resolutions.get(resolvent).map(|r| r.decision.is_some()).unwrap_or(false);
        if already {
            return Ok(());
        }
        self.decide_inner(resolvent)
    }

    /// §4.7.2: pick (or confirm) a `Decision` for `resolvent` from its
    /// accumulated constraints, recursing into its dependencies.
    fn decide(&mut self, resolvent: &Resolvent) -> Result<(), RestartOrError> {
        self.depth += 1;
        if self.depth > self.options.max_stack_depth {
            self.depth -= 1;
            return Err(RestartOrError::Error(ResolveError::StackTooDeep {
                limit: self.options.max_stack_depth,
            }));
        }
        let result = self.decide_inner(resolvent);
        self.depth -= 1;
        result
    }

    fn decide_inner(&mut self, resolvent: &Resolvent) -> Result<(), RestartOrError> {
        let _span = tracing::info_span!("deciding", resolvent = %resolvent).entered();
        let constraints = self
            .resolutions
            .get(resolvent)
            .map(|r| r.constraints.clone())
            .unwrap_or_default();

        let raw = Generator::Package(resolvent.package.clone()).select(self.env);
        let mut filtered = raw.clone();
        let mut filtered_ignoring_blocks = raw;
        let mut strong_blocker: Option<&Constraint> = None;

        for constraint in &constraints {
            filtered.retain(|id| constraint.is_satisfied_by(id.as_ref()));
            match constraint.kind {
                ConstraintKind::Require => {
                    filtered_ignoring_blocks
                        .retain(|id| match_package(&constraint.spec, id.as_ref(), MatchOptions::default()));
                }
                ConstraintKind::Block { strong } => {
                    if strong {
                        strong_blocker = Some(constraint);
                    }
                }
            }
        }
        let candidates = filtered;

        // A block is only ever a negative constraint (§3 `BlockSpec`); by
        // itself it demands nothing. If nothing else requires this resolvent
        // (no `Require` constraint) and nothing is already installed into
        // it, the block is vacuously satisfied — `!!cat/b` with `cat/b`
        // neither installed nor wanted is not an error, it's a no-op (§8
        // scenario 7 with both packages in the target set). Skip the
        // strong-block removal/error path entirely in that case rather than
        // falling through to `UnableToMake` below, which would be just as
        // spurious.
        let has_require = constraints.iter().any(|c| matches!(c.kind, ConstraintKind::Require));
        let something_installed = filtered_ignoring_blocks.iter().any(|id| id.is_installed());
        if !has_require && !something_installed {
            debug!(resolvent = %resolvent, "pure block constraint, nothing installed and nothing requires it");
            self.resolutions.entry(resolvent.clone()).or_default().decision = Some(Decision::NothingNoChange);
            self.order.push(resolvent.clone());
            return Ok(());
        }

        // §4.8.1/§7: a strong block that ate every candidate that would
        // otherwise have satisfied this resolvent's other constraints either
        // forces the removal of whatever's currently installed there, or —
        // if nothing is installed to remove — is a `BlockError`, not a
        // silent `UnableToMake`: there was something to install, the block
        // is what's standing in the way.
        if candidates.is_empty() && !filtered_ignoring_blocks.is_empty() {
            if let Some(blocker) = strong_blocker {
                let to_remove: Vec<DecisionId> = filtered_ignoring_blocks
                    .iter()
                    .filter(|id| id.is_installed())
                    .map(|id| DecisionId { canonical_form: id.canonical_form(), id: id.clone() })
                    .collect();
                if !to_remove.is_empty() {
                    debug!(resolvent = %resolvent, "strong block forces removal of installed candidate");
                    self.resolutions.entry(resolvent.clone()).or_default().decision =
                        Some(Decision::Remove { taken: to_remove });
                    self.order.push(resolvent.clone());
                    return Ok(());
                }
                if let Reason::Blocker { blocker_display, .. } = &blocker.reason {
                    return Err(RestartOrError::Error(ResolveError::BlockError {
                        message: format!(
                            "{blocker_display} strongly blocks {resolvent}, and nothing else satisfies it"
                        ),
                    }));
                }
            }
        }

        let not_masked: Vec<Arc<dyn PackageId>> =
            candidates.iter().filter(|id| !id.is_strongly_masked()).cloned().collect();
        let existing = Selections::best_version_only(
            not_masked.iter().filter(|id| id.is_installed()).cloned().collect(),
        );
        let installable = Selections::best_version_only(
            not_masked.iter().filter(|id| !id.is_installed()).cloned().collect(),
        );

        // §4.7.2 step 3: obey the strictest `use_existing` policy among the
        // `Require` constraints in force.
        let strictest_use_existing = constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Require))
            .map(|c| c.use_existing)
            .min()
            .unwrap_or(UseExisting::IfPossible);

        // Build the decision and commit it to `self.resolutions` *before*
        // recursing into the chosen candidate's own dependencies below.
        // `resolver.cc`'s `_resolve_decide_with_dependencies` does the same:
        // a resolvent counts as decided as soon as its candidate is chosen,
        // not only once its whole dependency subtree has also resolved. A
        // dependency cycle (`a` depends on `b` depends on `a`) then settles
        // the moment the recursion revisits an already-committed resolvent
        // (`apply_flattened`'s `decision.is_none()` guard) instead of
        // recursing without bound until `max_stack_depth` trips — which
        // previously meant no cycle, build or run, ever reached the orderer.
        let (decision, taken_id): (Decision, Option<Arc<dyn PackageId>>) = match (existing, installable) {
            (Some(existing), Some(installable)) => match strictest_use_existing {
                UseExisting::Never | UseExisting::OnlyIfTransient => {
                    (changes_to_make(&installable), Some(installable))
                }
                UseExisting::IfSameVersion => {
                    if existing.version().compare(installable.version()) == Ordering::Equal {
                        (existing_no_change(&existing), Some(existing))
                    } else {
                        (changes_to_make(&installable), Some(installable))
                    }
                }
                UseExisting::IfSame => {
                    let same_version = existing.version().compare(installable.version()) == Ordering::Equal;
                    if same_version && choices_explicitly_agree(existing.choices(), installable.choices()) {
                        (existing_no_change(&existing), Some(existing))
                    } else {
                        (changes_to_make(&installable), Some(installable))
                    }
                }
                UseExisting::IfPossible => (existing_no_change(&existing), Some(existing)),
            },
            (None, Some(installable)) => (changes_to_make(&installable), Some(installable)),
            (Some(existing), None) => (existing_no_change(&existing), Some(existing)),
            (None, None) if candidates.is_empty() => {
                debug!("no candidates satisfy {resolvent}");
                (
                    Decision::UnableToMake {
                        reason: format!("no candidates satisfy {resolvent}"),
                        candidates: Vec::new(),
                    },
                    None,
                )
            }
            (None, None) => {
                warn!(resolvent = %resolvent, "every candidate masked");
                let masked: Vec<UnsuitableCandidate> = candidates
                    .iter()
                    .filter(|id| id.is_strongly_masked())
                    .map(|id| UnsuitableCandidate {
                        id_display: id.canonical_form(),
                        reason: id
                            .masks()
                            .iter()
                            .filter(|m| !m.overridable)
                            .map(|m| m.to_string())
                            .collect::<Vec<_>>()
                            .join("; "),
                    })
                    .collect();
                (
                    Decision::UnableToMake {
                        reason: format!("every candidate for {resolvent} is masked"),
                        candidates: masked,
                    },
                    None,
                )
            }
        };

        self.resolutions.entry(resolvent.clone()).or_default().decision = Some(decision);
        self.order.push(resolvent.clone());

        if let Some(id) = taken_id {
            self.record_dependencies(resolvent, &id)?;
        }
        Ok(())
    }

    fn record_dependencies(&mut self, resolvent: &Resolvent, id: &Arc<dyn PackageId>) -> Result<(), RestartOrError> {
        for role in [DependencyRole::Build, DependencyRole::Run, DependencyRole::Post] {
            let tree = id.dependencies(role);
            let flat = compute_already_met(flatten_with_labels(&tree, id.choices()), self.env);
            let expanded = self.expand_virtuals(flat, id.name());
            self.apply_flattened_list(resolvent, id, expanded)?;
        }
        Ok(())
    }

    /// §4.7.5: replace any flattened dependency naming a `virtual/*` package
    /// with its providers, queried from whatever `virtual/*` IDs the
    /// environment knows about. `Package(virtual/foo)` becomes an `Any`
    /// group over `Package(prov)` for each provider; `Block(virtual/foo)`
    /// becomes one `Block(prov)` per provider (excluding `dependent_name`),
    /// matching `All(Block(prov1), Block(prov2), …)`. A virtual with no
    /// known provider is left as-is, so it fails exactly like any other
    /// unsatisfiable package rather than silently vanishing.
    fn expand_virtuals(
        &mut self,
        deps: Vec<SanitisedDependency>,
        dependent_name: &QualifiedPackageName,
    ) -> Vec<SanitisedDependency> {
        let mut out = Vec::new();
        for dep in deps {
            let Some(name) = dep.spec.package.clone() else {
                out.push(dep);
                continue;
            };
            if !name.is_virtual() {
                out.push(dep);
                continue;
            }
            let mut providers = providers_for(self.env, &name);
            if dep.block.is_some() {
                providers.retain(|p| p != dependent_name);
            }
            if providers.is_empty() {
                out.push(dep);
                continue;
            }
            if dep.block.is_some() {
                for provider in providers {
                    out.push(SanitisedDependency {
                        spec: PackageDepSpec::for_package(provider),
                        ..dep.clone()
                    });
                }
            } else {
                let group = AnyGroupId(self.next_any_group);
                self.next_any_group += 1;
                for provider in providers {
                    out.push(SanitisedDependency {
                        spec: PackageDepSpec::for_package(provider),
                        any_group: Some(group),
                        ..dep.clone()
                    });
                }
            }
        }
        out
    }

    /// Walk a flattened dependency list applying each entry, grouping
    /// `Any`-group siblings (contiguous by construction, §4.6) so they can
    /// be resolved together rather than each being applied independently.
    fn apply_flattened_list(
        &mut self,
        dependent_resolvent: &Resolvent,
        dependent: &Arc<dyn PackageId>,
        deps: Vec<SanitisedDependency>,
    ) -> Result<(), RestartOrError> {
        let mut i = 0;
        while i < deps.len() {
            match deps[i].any_group {
                None => {
                    self.apply_flattened(dependent_resolvent, dependent, deps[i].clone())?;
                    i += 1;
                }
                Some(group) => {
                    let start = i;
                    while i < deps.len() && deps[i].any_group == Some(group) {
                        i += 1;
                    }
                    self.apply_any_group(dependent_resolvent, dependent, &deps[start..i])?;
                }
            }
        }
        Ok(())
    }

    /// §4.7.4: try each viable child of an `Any` dependency in turn, taking
    /// the first whose resolvent reaches a taken decision and leaving every
    /// later sibling unconstrained. If every child fails, raise
    /// `NoResolvableOption` with what each one failed on.
    fn apply_any_group(
        &mut self,
        dependent_resolvent: &Resolvent,
        dependent: &Arc<dyn PackageId>,
        group: &[SanitisedDependency],
    ) -> Result<(), RestartOrError> {
        let mut collected = Vec::new();
        for dep in group {
            match self.apply_flattened(dependent_resolvent, dependent, dep.clone())? {
                ApplyOutcome::Taken => return Ok(()),
                ApplyOutcome::Failed(candidate) => collected.push(candidate),
            }
        }
        warn!(dependent = %dependent.canonical_form(), "no viable option in any-group");
        Err(RestartOrError::Error(ResolveError::NoResolvableOption { collected }))
    }

    fn apply_flattened(
        &mut self,
        dependent_resolvent: &Resolvent,
        dependent: &Arc<dyn PackageId>,
        dep: SanitisedDependency,
    ) -> Result<ApplyOutcome, RestartOrError> {
        let Some(package) = dep.spec.package.clone() else {
            return Ok(ApplyOutcome::Taken);
        };
        if package == *dependent.name() && crate::sanitizer::self_block_is_only_a_warning(dependent.as_ref(), &dep.spec) {
            return Ok(ApplyOutcome::Taken);
        }

        if let Some(strong) = dep.block {
            // A block is a negative constraint on the blocked package's own
            // resolvent (§3 `BlockSpec`, §4.7): it never needs the blocked
            // resolvent decided as a side effect of deciding the blocker,
            // only re-checked once something else wants it (§4.8.1).
            let resolvent = Resolvent::new(package, DestinationType::Install);
            self.apply_constraint(
                &resolvent,
                Constraint {
                    spec: dep.spec,
                    reason: Reason::Blocker {
                        blocker_display: dependent.canonical_form(),
                        strong,
                        already_met: dep.already_met,
                    },
                    kind: ConstraintKind::Block { strong },
                    use_existing: self.options.use_existing,
                    untaken: false,
                },
            )?;
            return Ok(ApplyOutcome::Taken);
        }

        let destination = match dep.active_class {
            ActiveClass::Fetch => DestinationType::Fetch,
            _ => DestinationType::Install,
        };
        let resolvent = Resolvent::new(package, destination);
        let edge_class = match dep.active_class {
            ActiveClass::Build => crate::spec::EdgeClass::Build,
            ActiveClass::Run => crate::spec::EdgeClass::Run,
            ActiveClass::Post => crate::spec::EdgeClass::Post,
            ActiveClass::Fetch => crate::spec::EdgeClass::Fetch,
        };
        self.apply_constraint(
            &resolvent,
            Constraint {
                spec: dep.spec,
                reason: Reason::Dependency {
                    dependent_display: dependent.canonical_form(),
                    label_class: edge_class,
                    already_met: dep.already_met,
                },
                kind: ConstraintKind::Require,
                use_existing: self.options.use_existing,
                untaken: false,
            },
        )?;
        // Recurse immediately, the way `resolver.cc`'s `_resolve_decide_with_dependencies`
        // does: a dependency is decided as part of deciding its dependent,
        // not queued for a later sweep. This is also what makes
        // `max_stack_depth` a meaningful cycle guard (§4.7.6) rather than
        // just a count of distinct packages seen.
        if self.resolutions.get(&resolvent).map(|r| r.decision.is_none()).unwrap_or(true) {
            self.decide(&resolvent)?;
        }
        let _ = dependent_resolvent;
        let outcome = match self.resolutions.get(&resolvent).and_then(|r| r.decision.clone()) {
            Some(Decision::UnableToMake { reason, .. }) => {
                ApplyOutcome::Failed(UnsuitableCandidate { id_display: resolvent.to_string(), reason })
            }
            Some(Decision::Break) | None => ApplyOutcome::Failed(UnsuitableCandidate {
                id_display: resolvent.to_string(),
                reason: "not decided".to_string(),
            }),
            Some(_) => ApplyOutcome::Taken,
        };
        Ok(outcome)
    }

    /// §4.7.2: add one more constraint to a resolvent, re-deciding it if
    /// it had already settled and the new constraint invalidates that
    /// decision (raises `SuggestRestart` if the settled choice no longer
    /// satisfies the accumulated constraint set).
    fn apply_constraint(&mut self, resolvent: &Resolvent, constraint: Constraint) -> Result<(), RestartOrError> {
        let entry = self.resolutions.entry(resolvent.clone()).or_default();
        let already_decided = entry.decision.is_some();
        let needs_restart = match &entry.decision {
            Some(Decision::ExistingNoChange { taken }) | Some(Decision::ChangesToMake { taken }) => {
                !constraint.is_satisfied_by(taken.id.as_ref())
            }
            // `NothingNoChange` only ever gets taken when the resolvent had
            // neither a `Require` constraint nor an installed candidate
            // (see `decide_inner`'s pure-block shortcut); any new constraint
            // can change that, so always re-decide rather than silently
            // keeping a decision that was only ever a placeholder.
            Some(Decision::NothingNoChange) => true,
            _ => false,
        };
        entry.constraints.push(constraint);
        if already_decided {
            if needs_restart {
                debug!(resolvent = %resolvent, "settled decision invalidated, restarting");
                entry.decision = None;
                return Err(RestartOrError::Restart(SuggestRestart {
                    resolvent_display: resolvent.to_string(),
                    reason: "a later constraint invalidated an already-settled decision".to_string(),
                }));
            }
            return Ok(());
        }
        Ok(())
    }
}

enum RestartOrError {
    Restart(SuggestRestart),
    Error(ResolveError),
}

impl From<ResolveError> for RestartOrError {
    fn from(e: ResolveError) -> Self {
        RestartOrError::Error(e)
    }
}

fn changes_to_make(id: &Arc<dyn PackageId>) -> Decision {
    trace!(id = %id.canonical_form(), "taking installable candidate");
    Decision::ChangesToMake { taken: DecisionId { canonical_form: id.canonical_form(), id: id.clone() } }
}

fn existing_no_change(id: &Arc<dyn PackageId>) -> Decision {
    trace!(id = %id.canonical_form(), "taking installed candidate");
    Decision::ExistingNoChange { taken: DecisionId { canonical_form: id.canonical_form(), id: id.clone() } }
}

/// §4.7.2 `use_existing = if_same`: do the explicitly-listed choices on
/// `a` and `b` actually agree, rather than merely comparing the whole
/// `Choices` value for equality (an ID can gain implicit defaults that
/// were never listed on the other without that counting as a disagreement).
fn choices_explicitly_agree(a: &Choices, b: &Choices) -> bool {
    let explicit_names = |c: &Choices| -> Vec<&str> {
        c.groups
            .iter()
            .flat_map(|g| g.values.iter())
            .filter(|v| v.explicitly_listed)
            .map(|v| v.unprefixed_name.as_str())
            .collect()
    };
    explicit_names(a)
        .into_iter()
        .chain(explicit_names(b))
        .all(|name| a.flag(name) == b.flag(name))
}

/// §4.7.5: which concrete packages provide `virtual_name`, discovered from
/// the run dependencies of whatever `virtual/*` IDs the environment knows
/// about — there is no separate virtuals repository in this core, so a
/// virtual's own RDEPEND-equivalent tree is the provider list.
fn providers_for(env: &Environment, virtual_name: &QualifiedPackageName) -> Vec<QualifiedPackageName> {
    let mut names = Vec::new();
    for id in Generator::Package(virtual_name.clone()).select(env) {
        collect_package_names(&id.dependencies(DependencyRole::Run), &mut names);
    }
    names.sort();
    names.dedup();
    names
}

fn collect_package_names(tree: &DepSpec, out: &mut Vec<QualifiedPackageName>) {
    match tree {
        DepSpec::Package(spec) => {
            if let Some(name) = &spec.package {
                out.push(name.clone());
            }
        }
        DepSpec::Block { .. } => {}
        DepSpec::All(children) | DepSpec::Any(children) => {
            for c in children {
                collect_package_names(c, out);
            }
        }
        DepSpec::Conditional { children, .. } => {
            for c in children {
                collect_package_names(c, out);
            }
        }
        DepSpec::NamedSet(_) | DepSpec::Label(_) => {}
    }
}
