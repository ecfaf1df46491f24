//! Version parsing, comparison, and operators (C1, §4.1).
//!
//! Grounded on `paludis/version_spec.cc`: a version is a flat sequence of
//! typed components parsed in one left-to-right pass:
//! `number -> letter? -> (alpha|beta|pre|rc|patch)* -> try? -> scm? -> revision*`.
//! Comparison walks both component sequences position-by-position, padding the
//! shorter side with an `Empty` sentinel that equals a zero revision.
//!
//! `VersionSpecOptions`' `ignore_case`/`flexible_dashes` knobs (repository
//! format dialect details) are not implemented: they are an EAPI/repository
//! parsing concern, out of this core's scope per §1 (see DESIGN.md).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::BadVersionSpecError;

/// Ordinal position determines comparison order directly: this is the
/// "strict ordering class" from §3/§4.1. Declaration order IS comparison
/// order — do not reorder these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum ComponentKind {
    Number,
    Letter,
    Alpha,
    Beta,
    Pre,
    Rc,
    /// The end-of-parts sentinel; also used for "no suffix" in the ordering
    /// class `alpha < beta < pre < rc < (no suffix) < patch`.
    Empty,
    Patch,
    Try,
    Scm,
    Revision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Component {
    kind: ComponentKind,
    number_value: String,
    text: String,
}

impl Component {
    fn sentinel() -> Self {
        Component {
            kind: ComponentKind::Empty,
            number_value: String::new(),
            text: String::new(),
        }
    }
}

/// A parsed Paludis-style version, e.g. `1.2.3_rc1-r2`.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    parts: Vec<Component>,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Strip leading (or, with `trailing=true`, trailing) `0`s, leaving at least
/// one character if the string was all zeros... unless the caller re-pads.
fn strip_leading_zeros(s: &str) -> String {
    let stripped = s.trim_start_matches('0');
    stripped.to_string()
}

fn strip_trailing_zeros(s: &str) -> String {
    let stripped = s.trim_end_matches('0');
    stripped.to_string()
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos == self.text.len()
    }

    fn consume_literal(&mut self, lit: &str) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn consume_digits(&mut self) -> Option<String> {
        let rest = self.rest();
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if end == 0 {
            None
        } else {
            let s = rest[..end].to_string();
            self.pos += end;
            Some(s)
        }
    }

    fn consume_digits_optional(&mut self) -> String {
        self.consume_digits().unwrap_or_default()
    }

    fn consume_letter(&mut self) -> Option<char> {
        let rest = self.rest();
        let c = rest.chars().next()?;
        if c.is_ascii_lowercase() {
            self.pos += 1;
            Some(c)
        } else {
            None
        }
    }

    fn peek_dot_then_digit(&self) -> bool {
        let rest = self.rest();
        rest.starts_with('.') && rest[1..].chars().next().is_some_and(|c| c.is_ascii_digit())
    }
}

fn strip_number_leading(s: &str) -> String {
    let stripped = strip_leading_zeros(s);
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped
    }
}

impl Version {
    /// Parse a version string in the canonical grammar (§3/§4.1).
    pub fn parse(text: &str) -> Result<Self, BadVersionSpecError> {
        if text.is_empty() {
            return Err(BadVersionSpecError::new(text, "cannot be empty"));
        }

        let mut cursor = Cursor::new(text);
        let mut parts = Vec::new();

        if cursor.consume_literal("scm") {
            parts.push(Component {
                kind: ComponentKind::Scm,
                number_value: String::new(),
                text: "scm".to_string(),
            });
        } else {
            let mut first_number = true;
            loop {
                let Some(number_part) = cursor.consume_digits() else {
                    return Err(BadVersionSpecError::new(
                        text,
                        format!("expected number part not found at offset {}", cursor.pos),
                    ));
                };
                parts.push(Component {
                    text: if first_number {
                        number_part.clone()
                    } else {
                        format!(".{number_part}")
                    },
                    number_value: number_part,
                    kind: ComponentKind::Number,
                });
                if !cursor.consume_literal(".") {
                    break;
                }
                first_number = false;
            }

            if let Some(l) = cursor.consume_letter() {
                parts.push(Component {
                    number_value: l.to_string(),
                    text: l.to_string(),
                    kind: ComponentKind::Letter,
                });
            }

            loop {
                let (kind, suffix_str) = if cursor.consume_literal("_alpha") {
                    (ComponentKind::Alpha, "_alpha")
                } else if cursor.consume_literal("_beta") {
                    (ComponentKind::Beta, "_beta")
                } else if cursor.consume_literal("_pre") {
                    (ComponentKind::Pre, "_pre")
                } else if cursor.consume_literal("_rc") {
                    (ComponentKind::Rc, "_rc")
                } else if cursor.consume_literal("_p") {
                    (ComponentKind::Patch, "_p")
                } else {
                    break;
                };
                let number_str = cursor.consume_digits_optional();
                let raw_text = format!("{suffix_str}{number_str}");
                let number_value = if number_str.is_empty() {
                    String::new()
                } else {
                    strip_number_leading(&number_str)
                };
                parts.push(Component {
                    kind,
                    number_value,
                    text: raw_text,
                });
            }

            if cursor.consume_literal("-try") {
                let number_str = cursor.consume_digits_optional();
                let raw_text = format!("-try{number_str}");
                let number_value = if number_str.is_empty() {
                    String::new()
                } else {
                    strip_number_leading(&number_str)
                };
                parts.push(Component {
                    kind: ComponentKind::Try,
                    number_value,
                    text: raw_text,
                });
            }

            if cursor.consume_literal("-scm") {
                if let Some(last) = parts.last_mut() {
                    if last.number_value.is_empty() {
                        last.number_value = "MAX".to_string();
                    }
                }
                parts.push(Component {
                    kind: ComponentKind::Scm,
                    number_value: String::new(),
                    text: "-scm".to_string(),
                });
            }

            for p in parts.iter_mut() {
                if p.number_value.is_empty() {
                    p.number_value = "0".to_string();
                }
            }
        }

        if cursor.consume_literal("-r") {
            let mut first_revision = true;
            loop {
                let number_str = cursor.consume_digits_optional();
                let empty = number_str.is_empty();
                let raw_text = if first_revision {
                    format!("-r{number_str}")
                } else {
                    format!(".{number_str}")
                };
                let number_value = strip_number_leading(&number_str);
                parts.push(Component {
                    kind: ComponentKind::Revision,
                    number_value,
                    text: raw_text,
                });

                if empty {
                    break;
                } else if !cursor.peek_dot_then_digit() {
                    break;
                } else if !cursor.consume_literal(".") {
                    return Err(BadVersionSpecError::new(
                        text,
                        format!("expected . or end after revision number at offset {}", cursor.pos),
                    ));
                }
                first_revision = false;
            }
        }

        if !cursor.eof() {
            return Err(BadVersionSpecError::new(
                text,
                format!("unexpected trailing text '{}'", &text[cursor.pos..]),
            ));
        }

        Ok(Version {
            text: text.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Three-way structural compare, per §4.1/§8.
    pub fn compare(&self, other: &Version) -> Ordering {
        componentwise_compare(&self.parts, &other.parts)
    }

    /// `~` operator: same version ignoring revision (§3, §4.1).
    pub fn tilde_compare(&self, other: &Version) -> bool {
        tilde_compare_parts(&self.parts, &other.parts)
    }

    /// "Nice" `=*` semantics: numeric prefix match, with a bare trailing
    /// suffix on the constraint matching any continuation.
    pub fn nice_equal_star_compare(&self, other: &Version) -> bool {
        nice_equal_star_parts(&self.parts, &other.parts)
    }

    /// "Stupid" `=*` semantics: plain string-prefix match on rendered text.
    pub fn stupid_equal_star_compare(&self, other: &Version) -> bool {
        self.text.starts_with(other.text.as_str())
    }

    /// True if tagged "scm" for policy purposes (§3, §4.1).
    pub fn is_scm(&self) -> bool {
        if self.parts.is_empty() {
            return false;
        }
        if self.parts.iter().any(|p| p.kind == ComponentKind::Scm) {
            return true;
        }
        if self
            .parts
            .iter()
            .any(|p| p.kind == ComponentKind::Revision && p.number_value == "9999")
        {
            return true;
        }
        let without_rev = self.remove_revision();
        let s = &without_rev.text;
        s.len() >= 4 && s.chars().all(|c| c == '9')
    }

    pub fn has_try_part(&self) -> bool {
        self.parts.iter().any(|p| p.kind == ComponentKind::Try)
    }

    pub fn has_scm_part(&self) -> bool {
        self.parts.iter().any(|p| p.kind == ComponentKind::Scm)
    }

    pub fn has_local_revision(&self) -> bool {
        self.parts.iter().filter(|p| p.kind == ComponentKind::Revision).count() > 1
    }

    /// Drop all revision components (`remove_revision(v).revision == "r0"`).
    pub fn remove_revision(&self) -> Version {
        let parts: Vec<_> = self
            .parts
            .iter()
            .filter(|p| p.kind != ComponentKind::Revision)
            .cloned()
            .collect();
        let mut text = self.text.clone();
        if let Some(p) = text.rfind("-r") {
            if text[p + 2..].chars().all(|c| c.is_ascii_digit() || c == '.') {
                text.truncate(p);
            }
        }
        Version { text, parts }
    }

    /// Renders just the revision part, e.g. `"r2"`, or `"r0"` if absent.
    pub fn revision_only(&self) -> String {
        let revs: Vec<_> = self
            .parts
            .iter()
            .filter(|p| p.kind == ComponentKind::Revision)
            .collect();
        if revs.is_empty() {
            return "r0".to_string();
        }
        let mut result = String::new();
        for r in revs {
            if !result.is_empty() {
                result.push('.');
            } else {
                result.push('r');
            }
            result.push_str(&r.number_value);
        }
        result
    }

    /// Increment the last purely-numeric leading component, dropping
    /// everything after it (used by `tilde_greater_compare`).
    pub fn bump(&self) -> Version {
        let mut number_parts: Vec<Component> = self
            .parts
            .iter()
            .take_while(|p| p.kind == ComponentKind::Number)
            .cloned()
            .collect();

        if number_parts.is_empty() {
            return self.clone();
        }
        if number_parts.len() > 1 {
            number_parts.pop();
        }

        let last = number_parts.last_mut().unwrap();
        let mut digits: Vec<u8> = last.number_value.bytes().collect();
        let mut add1 = true;
        for b in digits.iter_mut().rev() {
            if !add1 {
                break;
            }
            if *b != b'9' {
                *b += 1;
                add1 = false;
            } else {
                *b = b'0';
            }
        }
        let mut new_value = String::from_utf8(digits).unwrap();
        if add1 {
            new_value.insert(0, '1');
        }
        last.number_value = new_value;

        let mut s = String::new();
        for (i, p) in number_parts.iter().enumerate() {
            if i > 0 {
                s.push('.');
            }
            s.push_str(&p.number_value);
        }
        Version::parse(&s).unwrap_or(Version { text: s, parts: number_parts })
    }

    /// `~>` operator: `v >= w && v < bump(w)`.
    pub fn tilde_greater_compare(&self, other: &Version) -> bool {
        self >= other && self < &other.bump()
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for p in &self.parts {
            if p.kind == ComponentKind::Revision && p.number_value == "0" {
                continue;
            }
            (p.kind as u8).hash(state);
            p.number_value.hash(state);
        }
    }
}

fn componentwise_compare(a: &[Component], b: &[Component]) -> Ordering {
    let sentinel = Component::sentinel();
    let mut i = 0usize;
    let mut j = 0usize;
    let mut first = true;

    loop {
        let p1 = a.get(i).unwrap_or(&sentinel);
        let p2 = b.get(j).unwrap_or(&sentinel);

        let p1_is_end = i >= a.len();
        let p2_is_end = j >= b.len();

        if p1_is_end && p2_is_end {
            return Ordering::Equal;
        }

        let compared = if p1_is_end && p2.kind == ComponentKind::Revision && p2.number_value == "0" {
            0
        } else if p2_is_end && p1.kind == ComponentKind::Revision && p1.number_value == "0" {
            0
        } else if (p1.kind as u8) < (p2.kind as u8) {
            -1
        } else if (p1.kind as u8) > (p2.kind as u8) {
            1
        } else {
            compare_same_kind(p1, p2, &mut first)
        };

        match compared.cmp(&0) {
            Ordering::Equal => {
                if p1_is_end && p2_is_end {
                    return Ordering::Equal;
                }
            }
            other => return if other == Ordering::Less { Ordering::Less } else { Ordering::Greater },
        }

        if !p1_is_end {
            i += 1;
        }
        if !p2_is_end {
            j += 1;
        }
    }
}

fn compare_same_kind(p1: &Component, p2: &Component, first: &mut bool) -> i32 {
    let (p1s, p2s, length_cmp);

    if p1.kind == ComponentKind::Number {
        if *first {
            *first = false;
            p1s = strip_leading_zeros(&p1.number_value);
            p2s = strip_leading_zeros(&p2.number_value);
            length_cmp = true;
        } else if p1.number_value.starts_with('0') || p2.number_value.starts_with('0') {
            p1s = strip_trailing_zeros(&p1.number_value);
            p2s = strip_trailing_zeros(&p2.number_value);
            length_cmp = false;
        } else {
            p1s = p1.number_value.clone();
            p2s = p2.number_value.clone();
            length_cmp = true;
        }
    } else {
        let a = &p1.number_value;
        let b = &p2.number_value;
        if a == "MAX" && b == "MAX" {
            return 0;
        } else if a == "MAX" {
            return 1;
        } else if b == "MAX" {
            return -1;
        }
        p1s = a.clone();
        p2s = b.clone();
        length_cmp = true;
    }

    if length_cmp {
        match p1s.len().cmp(&p2s.len()) {
            Ordering::Less => return -1,
            Ordering::Greater => return 1,
            Ordering::Equal => {}
        }
    }

    match p1s.cmp(&p2s) {
        Ordering::Less => -1,
        Ordering::Greater => 1,
        Ordering::Equal => 0,
    }
}

fn tilde_compare_parts(a: &[Component], b: &[Component]) -> bool {
    let sentinel = Component::sentinel();
    let mut i = 0usize;
    let mut j = 0usize;
    let mut first = true;
    loop {
        let p1 = a.get(i).unwrap_or(&sentinel);
        let p2 = b.get(j).unwrap_or(&sentinel);
        let p1_is_end = i >= a.len();
        let p2_is_end = j >= b.len();

        if p1_is_end && p2_is_end {
            return true;
        }

        let compared = if p1_is_end && p2.kind == ComponentKind::Revision && p2.number_value == "0" {
            0
        } else if p2_is_end && p1.kind == ComponentKind::Revision && p1.number_value == "0" {
            0
        } else if (p1.kind as u8) < (p2.kind as u8) {
            -1
        } else if (p1.kind as u8) > (p2.kind as u8) {
            1
        } else {
            compare_same_kind(p1, p2, &mut first)
        };

        if compared != 0 {
            return p1.kind == ComponentKind::Revision
                && (p2.kind == ComponentKind::Empty || p2.kind == ComponentKind::Revision)
                && compared == 1;
        }

        if !p1_is_end {
            i += 1;
        }
        if !p2_is_end {
            j += 1;
        }
    }
}

fn nice_equal_star_parts(a: &[Component], b: &[Component]) -> bool {
    let sentinel = Component::sentinel();
    let mut i = 0usize;
    let mut j = 0usize;
    let mut first = true;
    loop {
        let p1 = a.get(i).unwrap_or(&sentinel);
        let p2 = b.get(j).unwrap_or(&sentinel);
        let p1_is_end = i >= a.len();
        let p2_is_end = j >= b.len();

        if p2.kind == ComponentKind::Empty {
            return true;
        }

        let is_bare_suffix = matches!(
            p2.kind,
            ComponentKind::Alpha | ComponentKind::Beta | ComponentKind::Pre | ComponentKind::Rc | ComponentKind::Patch
        ) && !p2.text.chars().any(|c| c.is_ascii_digit());

        if p1.kind == p2.kind && j + 1 >= b.len() && is_bare_suffix {
            return true;
        }

        let compared = if p1_is_end && p2.kind == ComponentKind::Revision && p2.number_value == "0" {
            0
        } else if p2_is_end && p1.kind == ComponentKind::Revision && p1.number_value == "0" {
            0
        } else if (p1.kind as u8) < (p2.kind as u8) {
            -1
        } else if (p1.kind as u8) > (p2.kind as u8) {
            1
        } else {
            compare_same_kind(p1, p2, &mut first)
        };

        if compared != 0 {
            return false;
        }

        if p1_is_end && p2_is_end {
            return true;
        }

        if !p1_is_end {
            i += 1;
        }
        if !p2_is_end {
            j += 1;
        }
    }
}

/// Version matching operators (§4.1), extracted so masks/spec matching can
/// reuse them without re-deriving per-operator logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOperator {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
    Tilde,
    TildeGreater,
    EqualGlob,
    EqualGlobStupid,
}

impl VersionOperator {
    pub fn matches(&self, candidate: &Version, constraint: &Version) -> bool {
        match self {
            VersionOperator::Less => candidate < constraint,
            VersionOperator::LessOrEqual => candidate <= constraint,
            VersionOperator::Equal => candidate == constraint,
            VersionOperator::GreaterOrEqual => candidate >= constraint,
            VersionOperator::Greater => candidate > constraint,
            VersionOperator::Tilde => candidate.tilde_compare(constraint),
            VersionOperator::TildeGreater => candidate.tilde_greater_compare(constraint),
            VersionOperator::EqualGlob => candidate.nice_equal_star_compare(constraint),
            VersionOperator::EqualGlobStupid => candidate.stupid_equal_star_compare(constraint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn basic_literal_table() {
        assert!(v("1.0") < v("1.0.1"));
        assert!(v("1.0.1") < v("1.0.1-r1"));
        assert!(v("1.0_alpha") < v("1.0_beta"));
        assert!(v("1.0_beta") < v("1.0_pre"));
        assert!(v("1.0_pre") < v("1.0_rc"));
        assert!(v("1.0_rc") < v("1.0"));
        assert!(v("1.0") < v("1.0_p1"));
        assert_eq!(v("1.0"), v("1.0-r0"));
    }

    #[test]
    fn scm_is_greatest() {
        assert!(v("scm") > v("9999"));
        assert!(v("1.0-scm") > v("1.0"));
    }

    #[test]
    fn antisymmetry_and_transitivity() {
        let a = v("1.0");
        let b = v("1.0.1");
        let c = v("1.0.2");
        assert!(a < b);
        assert!(!(b < a));
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn remove_revision_normalizes() {
        assert_eq!(v("1.2.3-r4").remove_revision(), v("1.2.3"));
        assert_eq!(v("1.2.3-r4").remove_revision().revision_only(), "r0");
        assert_eq!(v("1.2.3").remove_revision(), v("1.2.3"));
    }

    #[test]
    fn tilde_matches_revision_insensitively() {
        assert!(v("1.2-r5").tilde_compare(&v("1.2")));
        assert!(!v("1.3").tilde_compare(&v("1.2")));
    }

    #[test]
    fn equal_glob_matches_prefix() {
        assert!(v("1.0.1").nice_equal_star_compare(&v("1.0")));
        assert!(!v("1.1").nice_equal_star_compare(&v("1.0")));
    }

    #[test]
    fn is_scm_detection() {
        assert!(v("scm").is_scm());
        assert!(v("9999").is_scm());
        assert!(v("1.0-r9999").is_scm());
        assert!(!v("1.0").is_scm());
    }

    #[test]
    fn has_local_revision_counts_multiple() {
        assert!(!v("1.0-r1").has_local_revision());
        assert!(v("1.0-r1.2").has_local_revision());
    }

    #[test]
    fn bump_drops_trailing_components() {
        assert_eq!(v("1.2.3").bump(), v("1.3"));
        assert_eq!(v("1.9").bump(), v("2"));
    }

    #[test]
    fn tilde_greater_operator() {
        assert!(v("1.2.5").tilde_greater_compare(&v("1.2")));
        assert!(!v("1.3").tilde_greater_compare(&v("1.2")));
    }

    #[test]
    fn operator_table() {
        assert!(VersionOperator::Less.matches(&v("1.2.3"), &v("1.2.4")));
        assert!(VersionOperator::GreaterOrEqual.matches(&v("1.2.4"), &v("1.2.3")));
        assert!(VersionOperator::Equal.matches(&v("1.2.3-r1"), &v("1.2.3-r1")));
        assert!(!VersionOperator::Equal.matches(&v("1.2.3-r1"), &v("1.2.3")));
    }

    #[test]
    fn hash_ignores_r0() {
        use std::collections::hash_map::DefaultHasher;
        fn hash_of(v: &Version) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }
        assert_eq!(hash_of(&v("1.0")), hash_of(&v("1.0-r0")));
    }

    proptest::proptest! {
        #[test]
        fn antisymmetry_prop(a in 1u32..50, b in 0u32..50, c in 1u32..50) {
            let v1 = Version::parse(&format!("{a}.{b}.{c}")).unwrap();
            let v2 = Version::parse(&format!("{a}.{b}.{}", c + 1)).unwrap();
            proptest::prop_assert!(v1 < v2);
            proptest::prop_assert!(!(v2 < v1));
        }
    }
}
