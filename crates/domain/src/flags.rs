//! Node command-line flags and their mutations.
//!
//! A node's flags persist across relaunches. Relaunching applies a list of
//! [`FlagMutation`]s to the persisted [`FlagSet`], and the mutated set
//! becomes the baseline for the next relaunch.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Flag selecting the node's read-mode.
pub const READ_MODE_FLAG: &str = "--read-mode";

/// Flag asking the node to rebuild state from its block log on startup.
pub const REPLAY_FLAG: &str = "--replay";

/// Errors produced while parsing a flag string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagParseError {
    /// A value appeared before any flag name.
    #[error("value {0:?} is not preceded by a flag")]
    DanglingValue(String),
    /// A flag name was empty, e.g. a bare `--`.
    #[error("empty flag name")]
    EmptyName,
    /// The read-mode flag carried an unknown value.
    #[error("unknown read-mode {0:?}")]
    UnknownReadMode(String),
}

/// Whether the node exposes speculative chain state or only irreversible state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Head follows the fork database head.
    #[default]
    Speculative,
    /// Head is pinned to the last irreversible block.
    Irreversible,
}

impl ReadMode {
    /// Flag value understood by the node.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speculative => "speculative",
            Self::Irreversible => "irreversible",
        }
    }

    /// The other read-mode.
    pub const fn toggled(self) -> Self {
        match self {
            Self::Speculative => Self::Irreversible,
            Self::Irreversible => Self::Speculative,
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadMode {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speculative" => Ok(Self::Speculative),
            "irreversible" => Ok(Self::Irreversible),
            other => Err(FlagParseError::UnknownReadMode(other.to_string())),
        }
    }
}

/// A single command-line flag, e.g. `--read-mode irreversible` or `--replay`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Flag {
    /// Flag name including the leading `--`.
    pub name: String,
    /// Value, if the flag takes one.
    pub value: Option<String>,
}

impl Flag {
    /// Build a flag, normalising the name to carry a leading `--`.
    pub fn new(name: impl AsRef<str>, value: Option<impl Into<String>>) -> Self {
        Self { name: normalize_name(name.as_ref()), value: value.map(Into::into) }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

fn normalize_name(name: &str) -> String {
    if name.starts_with("--") { name.to_string() } else { format!("--{name}") }
}

/// Ordered set of flags passed to a node process.
///
/// Repeated flags (several `--p2p-peer-address` entries, say) are kept in
/// order. [`FlagSet::set`] replaces every occurrence of a name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<Flag>,
}

impl FlagSet {
    /// Empty flag set.
    pub const fn new() -> Self {
        Self { flags: Vec::new() }
    }

    /// Parse a whitespace separated flag string such as
    /// `"--read-mode irreversible --replay"`.
    ///
    /// `--name=value` is accepted and stored as `--name value`.
    pub fn parse(s: &str) -> Result<Self, FlagParseError> {
        let mut flags: Vec<Flag> = Vec::new();
        for token in s.split_whitespace() {
            if let Some(stripped) = token.strip_prefix("--") {
                let (name, value) = match stripped.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (stripped, None),
                };
                if name.is_empty() {
                    return Err(FlagParseError::EmptyName);
                }
                flags.push(Flag::new(name, value));
                continue;
            }
            match flags.last_mut() {
                Some(last) if last.value.is_none() => last.value = Some(token.to_string()),
                _ => return Err(FlagParseError::DanglingValue(token.to_string())),
            }
        }
        Ok(Self { flags })
    }

    /// Append a flag without touching existing occurrences.
    pub fn push(&mut self, flag: Flag) {
        self.flags.push(flag);
    }

    /// Append every flag of `other`, keeping existing ones.
    pub fn append(&mut self, other: &Self) {
        self.flags.extend(other.flags.iter().cloned());
    }

    /// Remove every occurrence of `name`, then add it once with `value`.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        self.remove(name);
        self.flags.push(Flag::new(name, value));
    }

    /// Remove every occurrence of `name`. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let name = normalize_name(name);
        let before = self.flags.len();
        self.flags.retain(|flag| flag.name != name);
        before != self.flags.len()
    }

    /// Whether the flag is present.
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.flags.iter().any(|flag| flag.name == name)
    }

    /// Value of the first occurrence of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize_name(name);
        self.flags.iter().find(|flag| flag.name == name).and_then(|flag| flag.value.as_deref())
    }

    /// Number of occurrences of `name`.
    pub fn count(&self, name: &str) -> usize {
        let name = normalize_name(name);
        self.flags.iter().filter(|flag| flag.name == name).count()
    }

    /// Configured read-mode; speculative when the flag is absent.
    pub fn read_mode(&self) -> Result<ReadMode, FlagParseError> {
        self.get(READ_MODE_FLAG).map_or(Ok(ReadMode::default()), str::parse)
    }

    /// Apply a mutation in place.
    pub fn apply(&mut self, mutation: &FlagMutation) {
        match mutation {
            FlagMutation::ReplaceAll(flags) => *self = flags.clone(),
            FlagMutation::Set { name, value } => self.set(name, value.as_deref()),
            FlagMutation::Remove(name) => {
                self.remove(name);
            }
        }
    }

    /// Flags rendered as process arguments.
    pub fn to_args(&self) -> Vec<String> {
        self.flags
            .iter()
            .flat_map(|flag| std::iter::once(flag.name.clone()).chain(flag.value.clone()))
            .collect()
    }

    /// Iterate over the flags in order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Number of flags.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.flags.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

impl FromStr for FlagSet {
    type Err = FlagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self { flags: iter.into_iter().collect() }
    }
}

/// A change to a node's persisted flag set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagMutation {
    /// Replace the entire flag set.
    ReplaceAll(FlagSet),
    /// Add a flag, overriding every existing occurrence.
    Set {
        /// Flag name.
        name: String,
        /// Optional value.
        value: Option<String>,
    },
    /// Remove every occurrence of a flag.
    Remove(String),
}

impl FlagMutation {
    /// Add or override a flag that takes a value.
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set { name: name.into(), value: Some(value.into()) }
    }

    /// Add or override a switch flag with no value.
    pub fn enable(name: impl Into<String>) -> Self {
        Self::Set { name: name.into(), value: None }
    }

    /// Remove a flag.
    pub fn remove(name: impl Into<String>) -> Self {
        Self::Remove(name.into())
    }

    /// Switch the read-mode, leaving every other flag untouched.
    pub fn read_mode(mode: ReadMode) -> Self {
        Self::set(READ_MODE_FLAG, mode.as_str())
    }

    /// Request a replay on the next launch.
    pub fn replay() -> Self {
        Self::enable(REPLAY_FLAG)
    }
}

impl fmt::Display for FlagMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceAll(flags) => write!(f, "replace [{flags}]"),
            Self::Set { name, value: Some(value) } => write!(f, "set {name} {value}"),
            Self::Set { name, value: None } => write!(f, "set {name}"),
            Self::Remove(name) => write!(f, "remove {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_keeps_order_and_values() {
        let flags = FlagSet::parse("--read-mode irreversible --replay --p2p-peer-address a:1")
            .unwrap();
        assert_eq!(flags.len(), 3);
        assert_eq!(flags.get("--read-mode"), Some("irreversible"));
        assert!(flags.contains("--replay"));
        assert_eq!(flags.get("replay"), None);
        assert_eq!(
            flags.to_args(),
            vec!["--read-mode", "irreversible", "--replay", "--p2p-peer-address", "a:1"]
        );
    }

    #[test]
    fn test_parse_equals_syntax() {
        let flags = FlagSet::parse("--read-mode=irreversible").unwrap();
        assert_eq!(flags.read_mode().unwrap(), ReadMode::Irreversible);
        assert_eq!(flags.to_string(), "--read-mode irreversible");
    }

    #[test]
    fn test_parse_rejects_dangling_value() {
        assert_eq!(
            FlagSet::parse("irreversible --replay"),
            Err(FlagParseError::DanglingValue("irreversible".into()))
        );
        assert_eq!(
            FlagSet::parse("--read-mode a b"),
            Err(FlagParseError::DanglingValue("b".into()))
        );
        assert_eq!(FlagSet::parse("--"), Err(FlagParseError::EmptyName));
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(FlagSet::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_read_mode_defaults_to_speculative() {
        assert_eq!(FlagSet::new().read_mode().unwrap(), ReadMode::Speculative);
        let bad = FlagSet::parse("--read-mode head").unwrap();
        assert!(matches!(bad.read_mode(), Err(FlagParseError::UnknownReadMode(_))));
    }

    #[test]
    fn test_read_mode_switch_preserves_other_flags() {
        let mut flags =
            FlagSet::parse("--p2p-peer-address a:1 --read-mode speculative --plugin x").unwrap();
        flags.apply(&FlagMutation::read_mode(ReadMode::Irreversible));
        assert_eq!(flags.read_mode().unwrap(), ReadMode::Irreversible);
        assert_eq!(flags.count(READ_MODE_FLAG), 1);
        assert_eq!(flags.get("--p2p-peer-address"), Some("a:1"));
        assert_eq!(flags.get("--plugin"), Some("x"));
    }

    #[test]
    fn test_set_overrides_repeated_flag() {
        let mut flags = FlagSet::parse("--producer-name a --producer-name b").unwrap();
        flags.set("producer-name", Some("c"));
        assert_eq!(flags.count("--producer-name"), 1);
        assert_eq!(flags.get("--producer-name"), Some("c"));
    }

    #[test]
    fn test_remove_and_replace_all() {
        let mut flags = FlagSet::parse("--replay --read-mode irreversible").unwrap();
        flags.apply(&FlagMutation::remove(REPLAY_FLAG));
        assert!(!flags.contains(REPLAY_FLAG));
        assert!(!flags.remove(REPLAY_FLAG));

        let replacement = FlagSet::parse("--plugin y").unwrap();
        flags.apply(&FlagMutation::ReplaceAll(replacement.clone()));
        assert_eq!(flags, replacement);
    }

    fn mutation_strategy() -> impl Strategy<Value = FlagMutation> {
        prop_oneof![
            any::<bool>().prop_map(|irr| FlagMutation::read_mode(if irr {
                ReadMode::Irreversible
            } else {
                ReadMode::Speculative
            })),
            Just(FlagMutation::replay()),
            Just(FlagMutation::remove(REPLAY_FLAG)),
            Just(FlagMutation::remove(READ_MODE_FLAG)),
            Just(FlagMutation::set("--p2p-peer-address", "127.0.0.1:9877")),
            Just(FlagMutation::ReplaceAll(
                FlagSet::parse("--read-mode irreversible --plugin x").unwrap()
            )),
        ]
    }

    proptest! {
        #[test]
        fn prop_read_mode_is_never_ambiguous(mutations in prop::collection::vec(mutation_strategy(), 0..32)) {
            let mut flags = FlagSet::parse("--read-mode speculative --plugin base").unwrap();
            for mutation in &mutations {
                flags.apply(mutation);
                prop_assert!(flags.count(READ_MODE_FLAG) <= 1);
                prop_assert!(flags.read_mode().is_ok());
            }
        }

        #[test]
        fn prop_rendered_flags_parse_back(mutations in prop::collection::vec(mutation_strategy(), 0..16)) {
            let mut flags = FlagSet::new();
            for mutation in &mutations {
                flags.apply(mutation);
            }
            prop_assert_eq!(FlagSet::parse(&flags.to_string()).unwrap(), flags);
        }
    }
}
