//! Choice (USE-flag-like) groups and value resolution (C5, §3, §4.5).

use std::collections::HashMap;
use std::fmt;

/// One value within a [`Choice`] group: `{enabled, locked, explicitly_listed,
/// description, unprefixed_name, name_with_prefix}` (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceValue {
    pub unprefixed_name: String,
    pub enabled: bool,
    pub locked: bool,
    pub explicitly_listed: bool,
    pub description: String,
}

impl ChoiceValue {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            unprefixed_name: name.into(),
            enabled,
            locked: false,
            explicitly_listed: true,
            description: String::new(),
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// An ordered Choice group: a prefix (possibly empty), visibility flags, and
/// an ordered list of values (§3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Choice {
    pub prefix: String,
    pub show_with_no_prefix: bool,
    pub hidden: bool,
    pub values: Vec<ChoiceValue>,
}

impl Choice {
    /// `prefix + separator + unprefixed`; the separator is `_` in this core
    /// (EAPI-defined in the original, out of scope per §1).
    pub fn name_with_prefix(&self, value: &ChoiceValue) -> String {
        if self.prefix.is_empty() {
            value.unprefixed_name.clone()
        } else {
            format!("{}_{}", self.prefix, value.unprefixed_name)
        }
    }
}

/// An ordered collection of [`Choice`] groups attached to a `PackageId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choices {
    pub groups: Vec<Choice>,
}

impl Choices {
    pub fn flag(&self, name: &str) -> bool {
        self.groups
            .iter()
            .flat_map(|g| g.values.iter().map(move |v| (g, v)))
            .find(|(g, v)| g.name_with_prefix(v) == name || v.unprefixed_name == name)
            .map(|(_, v)| v.enabled)
            .unwrap_or(false)
    }

    pub fn explicitly_listed(&self, name: &str) -> bool {
        self.groups
            .iter()
            .flat_map(|g| g.values.iter())
            .find(|v| v.unprefixed_name == name)
            .map(|v| v.explicitly_listed)
            .unwrap_or(false)
    }

    pub fn single(name: &str, enabled: bool) -> Self {
        Self {
            groups: vec![Choice {
                prefix: String::new(),
                show_with_no_prefix: true,
                hidden: false,
                values: vec![ChoiceValue::new(name, enabled)],
            }],
        }
    }

    pub fn with(mut self, name: &str, enabled: bool) -> Self {
        self.groups.push(Choice {
            prefix: String::new(),
            show_with_no_prefix: true,
            hidden: false,
            values: vec![ChoiceValue::new(name, enabled)],
        });
        self
    }
}

/// A shadow map used by the resolver to ask "would this conditional be met
/// if we changed these flags" without mutating the ID's real choices (§4.5).
#[derive(Debug, Clone, Default)]
pub struct ChangedChoices {
    overrides: HashMap<String, bool>,
}

impl ChangedChoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: impl Into<String>, enabled: bool) {
        self.overrides.insert(flag.into(), enabled);
    }

    /// Resolve a flag, consulting the override map before falling back to
    /// the ID's real choices.
    pub fn resolve(&self, flag: &str, choices: &Choices) -> bool {
        self.overrides.get(flag).copied().unwrap_or_else(|| choices.flag(flag))
    }
}

impl fmt::Display for Choices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for g in &self.groups {
            for v in &g.values {
                if !first {
                    write!(f, " ")?;
                }
                first = false;
                if !v.enabled {
                    write!(f, "-")?;
                }
                write!(f, "{}", g.name_with_prefix(v))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_lookup_by_unprefixed_name() {
        let choices = Choices::single("ssl", true);
        assert!(choices.flag("ssl"));
        assert!(!choices.flag("debug"));
    }

    #[test]
    fn name_with_prefix_joins_with_underscore() {
        let choice = Choice {
            prefix: "cpu_flags_x86".to_string(),
            show_with_no_prefix: false,
            hidden: false,
            values: vec![ChoiceValue::new("sse2", true)],
        };
        assert_eq!(choice.name_with_prefix(&choice.values[0]), "cpu_flags_x86_sse2");
    }

    #[test]
    fn changed_choices_overrides_without_mutating() {
        let choices = Choices::single("ssl", false);
        let mut changed = ChangedChoices::new();
        changed.set("ssl", true);
        assert!(changed.resolve("ssl", &choices));
        assert!(!choices.flag("ssl"));
    }
}
