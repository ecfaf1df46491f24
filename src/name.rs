//! Category, package, slot, and repository names (C1).
//!
//! Names are short, validated strings over a restricted character class.
//! Validation happens once at construction; every other operation works on
//! the already-validated form.

use std::fmt;

use crate::error::NameError;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+' || c == '.'
}

fn validate(kind: &'static str, text: &str) -> Result<(), NameError> {
    if text.is_empty() {
        return Err(NameError::new(kind, text, "cannot be empty"));
    }
    if !text.chars().next().unwrap().is_ascii_alphanumeric() {
        return Err(NameError::new(kind, text, "must start with a letter or digit"));
    }
    if let Some(bad) = text.chars().find(|c| !is_name_char(*c)) {
        return Err(NameError::new(
            kind,
            text,
            &format!("contains disallowed character '{bad}'"),
        ));
    }
    Ok(())
}

macro_rules! simple_name {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Box<str>);

        impl $name {
            pub fn new(text: impl AsRef<str>) -> Result<Self, NameError> {
                let text = text.as_ref();
                validate($kind, text)?;
                Ok(Self(text.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

simple_name!(CategoryName, "category name");
simple_name!(PackageNamePart, "package name");
simple_name!(SlotName, "slot name");
simple_name!(RepositoryName, "repository name");
simple_name!(KeywordName, "keyword");
simple_name!(ChoicePrefixName, "choice prefix");

/// `category/package`, the identity of a package family independent of version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedPackageName {
    pub category: CategoryName,
    pub package: PackageNamePart,
}

impl QualifiedPackageName {
    pub fn new(category: CategoryName, package: PackageNamePart) -> Self {
        Self { category, package }
    }

    /// Parse `cat/pkg`, failing if there isn't exactly one `/`.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        let mut parts = text.splitn(2, '/');
        let cat = parts.next().unwrap_or("");
        let pkg = match parts.next() {
            Some(p) => p,
            None => {
                return Err(NameError::new(
                    "qualified package name",
                    text,
                    "expected 'category/package'",
                ))
            }
        };
        Ok(Self {
            category: CategoryName::new(cat)?,
            package: PackageNamePart::new(pkg)?,
        })
    }

    /// True iff this name lives in the reserved `virtual` category (§4.7.5).
    pub fn is_virtual(&self) -> bool {
        self.category.as_str() == "virtual"
    }
}

impl fmt::Display for QualifiedPackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_name() {
        let qpn = QualifiedPackageName::parse("dev-lang/rust").unwrap();
        assert_eq!(qpn.category.as_str(), "dev-lang");
        assert_eq!(qpn.package.as_str(), "rust");
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(QualifiedPackageName::parse("rust").is_err());
    }

    #[test]
    fn rejects_empty_category() {
        assert!(QualifiedPackageName::parse("/rust").is_err());
    }

    #[test]
    fn virtual_category_is_detected() {
        let qpn = QualifiedPackageName::parse("virtual/libc").unwrap();
        assert!(qpn.is_virtual());
        let qpn = QualifiedPackageName::parse("dev-lang/rust").unwrap();
        assert!(!qpn.is_virtual());
    }

    #[test]
    fn rejects_disallowed_character() {
        assert!(CategoryName::new("dev lang").is_err());
    }

    #[test]
    fn display_round_trips() {
        let qpn = QualifiedPackageName::parse("app-editors/vim").unwrap();
        assert_eq!(qpn.to_string(), "app-editors/vim");
    }
}
