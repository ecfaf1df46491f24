//! Masks: structured reasons an ID is not (currently) installable (C5, §3, §4.5).

use std::fmt;

/// Closed set of mask variants (§3). `overridable` records whether the
/// configured override predicate set accepts this particular mask; an ID is
/// "strongly masked" iff at least one of its masks has `overridable = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub kind: MaskKind,
    pub overridable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskKind {
    /// A key (e.g. keywords) wasn't accepted by the environment.
    Unaccepted { key: String },
    /// The EAPI or some other attribute isn't supported.
    Unsupported { reason: String },
    /// Masked because of association with another ID (e.g. a blocker).
    Association { other_id_display: String },
    /// An explicit user mask.
    User { comment: String },
    /// A repository-level mask file entry.
    Repository { file: String, comment_lines: Vec<String> },
}

impl Mask {
    pub fn user(comment: impl Into<String>) -> Self {
        Mask {
            kind: MaskKind::User { comment: comment.into() },
            overridable: false,
        }
    }

    pub fn repository(file: impl Into<String>, comment_lines: Vec<String>) -> Self {
        Mask {
            kind: MaskKind::Repository { file: file.into(), comment_lines },
            overridable: false,
        }
    }

    pub fn unaccepted(key: impl Into<String>) -> Self {
        Mask {
            kind: MaskKind::Unaccepted { key: key.into() },
            overridable: true,
        }
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MaskKind::Unaccepted { key } => write!(f, "unaccepted key '{key}'"),
            MaskKind::Unsupported { reason } => write!(f, "unsupported: {reason}"),
            MaskKind::Association { other_id_display } => write!(f, "associated with {other_id_display}"),
            MaskKind::User { comment } => write!(f, "user mask: {comment}"),
            MaskKind::Repository { file, comment_lines } => {
                write!(f, "masked by {file}")?;
                if !comment_lines.is_empty() {
                    write!(f, " ({})", comment_lines.join("; "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_mask_is_not_overridable() {
        let m = Mask::user("explicitly masked by the administrator");
        assert!(!m.overridable);
    }

    #[test]
    fn unaccepted_is_overridable() {
        let m = Mask::unaccepted("keywords");
        assert!(m.overridable);
    }

    #[test]
    fn display_includes_comment_lines() {
        let m = Mask::repository("package.mask", vec!["broken upstream".to_string()]);
        assert_eq!(m.to_string(), "masked by package.mask (broken upstream)");
    }
}
