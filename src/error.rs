//! Structured error taxonomy (C9, §7).
//!
//! `SuggestRestart` is deliberately **not** a variant of [`ResolveError`]: it is
//! an internal control signal threaded through the resolver driver loop (§4.7.3,
//! §9 "Exceptions for control flow") and must never reach a caller.

use std::fmt;

use thiserror::Error;

use crate::name::QualifiedPackageName;

/// A parsed name failed validation.
#[derive(Debug, Clone, Error)]
#[error("invalid {kind} '{input}': {reason}")]
pub struct NameError {
    pub kind: &'static str,
    pub input: String,
    pub reason: String,
}

impl NameError {
    pub fn new(kind: &'static str, input: &str, reason: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The version parser rejected its input.
#[derive(Debug, Clone, Error)]
#[error("bad version spec '{text}': {reason}")]
pub struct BadVersionSpecError {
    pub text: String,
    pub reason: String,
}

impl BadVersionSpecError {
    pub fn new(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// The dependency spec grammar rejected its input.
#[derive(Debug, Clone, Error)]
#[error("bad dependency spec '{text}': {reason}")]
pub struct ParseSpecError {
    pub text: String,
    pub reason: String,
}

/// One candidate considered and rejected while trying to decide a resolvent,
/// paired with why it didn't work out. Used by `AllMasked`/`UnableToMake`/
/// `NoResolvableOption` (§4.7.2, §4.9).
#[derive(Debug, Clone)]
pub struct UnsuitableCandidate {
    pub id_display: String,
    pub reason: String,
}

impl fmt::Display for UnsuitableCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id_display, self.reason)
    }
}

/// The core's full error taxonomy (§7). Every public fallible operation in
/// this crate returns `Result<_, ResolveError>`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    BadVersionSpec(#[from] BadVersionSpecError),

    #[error(transparent)]
    ParseSpec(#[from] ParseSpecError),

    #[error("'{name}' is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousPackageName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("no repository knows of '{name}'")]
    NoSuchPackage { name: String },

    #[error("all candidates for '{spec}' are masked")]
    AllMasked {
        spec: String,
        candidates: Vec<UnsuitableCandidate>,
    },

    #[error("choice requirements for '{spec}' not met on {id_display}: {which}")]
    UseRequirementsNotMet {
        spec: String,
        id_display: String,
        which: String,
    },

    #[error("no resolvable option in any-group: {}", collected.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    NoResolvableOption { collected: Vec<UnsuitableCandidate> },

    #[error("circular dependency: {}", path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CircularDependency { path: Vec<QualifiedPackageName> },

    #[error("recursion limit of {limit} exceeded")]
    StackTooDeep { limit: usize },

    #[error("block error: {message}")]
    BlockError { message: String },

    #[error("more than one set given as a target alongside package targets")]
    HadBothPackageAndSetTargets,

    #[error("more than one set given as a target")]
    MultipleSetTargets,
}

/// Thrown when a newly committed decision invalidates a previously taken one
/// (§4.7.3). Caught exactly once, at the resolver driver loop (§4.7.1); never
/// propagated to a caller, and deliberately not a `ResolveError` variant.
#[derive(Debug, Clone)]
pub struct SuggestRestart {
    pub resolvent_display: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_error_display() {
        let e = NameError::new("category name", "bad cat", "contains a space");
        assert_eq!(
            e.to_string(),
            "invalid category name 'bad cat': contains a space"
        );
    }

    #[test]
    fn resolve_error_wraps_name_error() {
        let e: ResolveError = NameError::new("category name", "x y", "bad").into();
        assert!(matches!(e, ResolveError::Name(_)));
    }
}
