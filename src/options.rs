//! The `DepListOptions`-equivalent option bag (§9, §10.3).
//!
//! Every field here documents its own default; the resolver driver never
//! reads files or environment variables to populate it — that's the
//! caller's job, kept out of this core per §1.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinstall {
    Never,
    Always,
    IfUseChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinstallScm {
    Never,
    Always,
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Set,
    Package,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upgrade {
    Always,
    AsNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downgrade {
    AsNeeded,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewSlots {
    Always,
    AsNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallBack {
    Never,
    AsNeededExceptTargets,
    AsNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepsOption {
    Discard,
    Pre,
    Runtime,
    Post,
    PreOrPost,
    TryPost,
    DiscardAlways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggested {
    Show,
    Install,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circular {
    Error,
    Discard,
    DiscardSilently,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseOption {
    Standard,
    TakeAll,
    TakeAllTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocks {
    Accumulate,
    Error,
    Discard,
}

/// §4.7.2 `use_existing` policy, ordered strictest-first so `decide` can
/// pick the strictest policy in force across a resolvent's constraints with
/// a plain `min()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UseExisting {
    Never,
    OnlyIfTransient,
    IfSameVersion,
    IfSame,
    IfPossible,
}

/// The resolver's option bag (§9). `Default` supplies the documented
/// defaults, which match what a plain `paludis --pretend` run would use.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub reinstall: Reinstall,
    pub reinstall_scm: ReinstallScm,
    pub target_type: TargetType,
    pub upgrade: Upgrade,
    pub downgrade: Downgrade,
    pub new_slots: NewSlots,
    pub fall_back: FallBack,
    pub deps_pre: DepsOption,
    pub deps_runtime: DepsOption,
    pub deps_post: DepsOption,
    pub deps_suggested: DepsOption,
    pub suggested: Suggested,
    pub circular: Circular,
    pub use_option: UseOption,
    pub blocks: Blocks,
    /// Default `use_existing` policy stamped on constraints raised by this
    /// resolver (§4.7.2); individual constraints may still carry a stricter
    /// value of their own.
    pub use_existing: UseExisting,
    /// Maximum recursion depth for `decide` (§4.7.6). Exceeding it raises
    /// `StackTooDeep`.
    pub max_stack_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            reinstall: Reinstall::IfUseChanged,
            reinstall_scm: ReinstallScm::Never,
            target_type: TargetType::Package,
            upgrade: Upgrade::AsNeeded,
            downgrade: Downgrade::AsNeeded,
            new_slots: NewSlots::AsNeeded,
            fall_back: FallBack::AsNeededExceptTargets,
            deps_pre: DepsOption::Pre,
            deps_runtime: DepsOption::Runtime,
            deps_post: DepsOption::Post,
            deps_suggested: DepsOption::DiscardAlways,
            suggested: Suggested::Discard,
            circular: Circular::Error,
            use_option: UseOption::Standard,
            blocks: Blocks::Accumulate,
            use_existing: UseExisting::IfPossible,
            max_stack_depth: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = ResolverOptions::default();
        assert_eq!(opts.max_stack_depth, 100);
        assert!(matches!(opts.fall_back, FallBack::AsNeededExceptTargets));
        assert!(matches!(opts.suggested, Suggested::Discard));
    }
}
