//! Configuration layer types
//!
//! A configuration chain is an ordered sequence of [`ConfigElement`]s.
//! This module holds the element itself, its typed attributes, and
//! [`ConfigData`], the serde-facing shape of a raw configuration file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RelintError, Result};

/// Rule severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Disable the rule
    Off,
    /// Report without failing the run
    Warn,
    /// Report and fail the run
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Off => "off",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "off" => Some(Severity::Off),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    fn from_number(value: u64) -> Option<Self> {
        match value {
            0 => Some(Severity::Off),
            1 => Some(Severity::Warn),
            2 => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SeverityVisitor;

        impl<'de> Visitor<'de> for SeverityVisitor {
            type Value = Severity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"off\", \"warn\", \"error\", 0, 1, or 2")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Severity, E> {
                Severity::from_name(value)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Severity, E> {
                Severity::from_number(value)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Severity, E> {
                u64::try_from(value)
                    .ok()
                    .and_then(Severity::from_number)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }
        }

        deserializer.deserialize_any(SeverityVisitor)
    }
}

/// One rule setting: a severity followed by rule-specific option values.
///
/// Deserializes from either a bare severity (`"error"`, `2`) or an array
/// whose first element is the severity (`["error", { "max": 3 }]`).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub severity: Severity,
    pub options: Vec<Value>,
}

impl RuleEntry {
    pub fn new(severity: Severity, options: Vec<Value>) -> Self {
        Self { severity, options }
    }

    pub fn severity_only(severity: Severity) -> Self {
        Self {
            severity,
            options: Vec::new(),
        }
    }
}

impl Serialize for RuleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.options.is_empty() {
            self.severity.serialize(serializer)
        } else {
            let mut seq = serializer.serialize_seq(Some(1 + self.options.len()))?;
            seq.serialize_element(&self.severity)?;
            for option in &self.options {
                seq.serialize_element(option)?;
            }
            seq.end()
        }
    }
}

impl<'de> Deserialize<'de> for RuleEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RuleEntryVisitor;

        impl<'de> Visitor<'de> for RuleEntryVisitor {
            type Value = RuleEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a severity or an array starting with a severity")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<RuleEntry, E> {
                Severity::from_name(value)
                    .map(RuleEntry::severity_only)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<RuleEntry, E> {
                Severity::from_number(value)
                    .map(RuleEntry::severity_only)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<RuleEntry, E> {
                u64::try_from(value)
                    .ok()
                    .and_then(Severity::from_number)
                    .map(RuleEntry::severity_only)
                    .ok_or_else(|| E::custom(format!("invalid severity '{value}'")))
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<RuleEntry, A::Error> {
                let severity: Severity = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("rule entry is missing its severity"))?;
                let mut options = Vec::new();
                while let Some(value) = seq.next_element::<Value>()? {
                    options.push(value);
                }
                Ok(RuleEntry { severity, options })
            }
        }

        deserializer.deserialize_any(RuleEntryVisitor)
    }
}

/// Access mode of a declared global variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAccess {
    Readonly,
    Writable,
    Off,
}

impl GlobalAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalAccess::Readonly => "readonly",
            GlobalAccess::Writable => "writable",
            GlobalAccess::Off => "off",
        }
    }
}

impl Serialize for GlobalAccess {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GlobalAccess {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct GlobalAccessVisitor;

        impl<'de> Visitor<'de> for GlobalAccessVisitor {
            type Value = GlobalAccess;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"readonly\", \"writable\", \"off\", or a boolean")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<GlobalAccess, E> {
                // "readable" and "writeable" are accepted legacy aliases.
                match value {
                    "readonly" | "readable" => Ok(GlobalAccess::Readonly),
                    "writable" | "writeable" => Ok(GlobalAccess::Writable),
                    "off" => Ok(GlobalAccess::Off),
                    _ => Err(E::custom(format!("invalid global access '{value}'"))),
                }
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<GlobalAccess, E> {
                Ok(if value {
                    GlobalAccess::Writable
                } else {
                    GlobalAccess::Readonly
                })
            }
        }

        deserializer.deserialize_any(GlobalAccessVisitor)
    }
}

/// Parser named by a configuration file, with its path resolved against
/// the file's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserDescriptor {
    /// The parser specifier as written in the configuration
    pub id: String,
    /// Resolved location of the parser source
    pub file_path: Option<PathBuf>,
}

/// Plugin referenced by a configuration element.
///
/// The synthetic `--rulesdir` plugin carries a populated `rules` table;
/// plugins named in configuration files carry an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginDescriptor {
    pub id: String,
    pub file_path: Option<PathBuf>,
    /// Rule id to rule source file
    pub rules: BTreeMap<String, PathBuf>,
}

impl PluginDescriptor {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Compiled matcher for one `overrides` block.
///
/// Patterns containing a separator match the path relative to the
/// declaring configuration file's directory; bare patterns match the
/// file name alone.
#[derive(Debug, Clone)]
pub struct OverrideTester {
    patterns: Vec<String>,
    excluded_patterns: Vec<String>,
    base_path: PathBuf,
    path_set: GlobSet,
    basename_set: GlobSet,
    excluded_path_set: GlobSet,
    excluded_basename_set: GlobSet,
}

impl OverrideTester {
    pub fn new(files: &[String], excluded_files: &[String], base_path: &Path) -> Result<Self> {
        let (path_set, basename_set) = Self::compile(files)?;
        let (excluded_path_set, excluded_basename_set) = Self::compile(excluded_files)?;
        Ok(Self {
            patterns: files.to_vec(),
            excluded_patterns: excluded_files.to_vec(),
            base_path: base_path.to_path_buf(),
            path_set,
            basename_set,
            excluded_path_set,
            excluded_basename_set,
        })
    }

    fn compile(patterns: &[String]) -> Result<(GlobSet, GlobSet)> {
        let mut paths = GlobSetBuilder::new();
        let mut basenames = GlobSetBuilder::new();
        for pattern in patterns {
            let trimmed = pattern.strip_prefix("./").unwrap_or(pattern);
            let glob = GlobBuilder::new(trimmed)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    RelintError::config_error(format!("Invalid override pattern '{pattern}': {e}"))
                })?;
            if trimmed.contains('/') {
                paths.add(glob);
            } else {
                basenames.add(glob);
            }
        }
        let paths = paths
            .build()
            .map_err(|e| RelintError::config_error(format!("Invalid override patterns: {e}")))?;
        let basenames = basenames
            .build()
            .map_err(|e| RelintError::config_error(format!("Invalid override patterns: {e}")))?;
        Ok((paths, basenames))
    }

    /// Whether the block applies to `file_path`.
    pub fn matches(&self, file_path: &Path) -> bool {
        let relative = match file_path.strip_prefix(&self.base_path) {
            Ok(relative) => relative,
            Err(_) => return false,
        };
        let basename = match file_path.file_name() {
            Some(name) => name,
            None => return false,
        };
        let included = self.path_set.is_match(relative) || self.basename_set.is_match(basename);
        if !included {
            return false;
        }
        let excluded = self.excluded_path_set.is_match(relative)
            || self.excluded_basename_set.is_match(basename);
        !excluded
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn excluded_patterns(&self) -> &[String] {
        &self.excluded_patterns
    }
}

/// One `overrides` block: its matcher plus the nested configuration it
/// switches on.
#[derive(Debug, Clone)]
pub struct OverrideEntry {
    pub tester: OverrideTester,
    pub config: ConfigElement,
}

/// One layer of configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigElement {
    /// Diagnostic name of the layer
    pub name: String,
    /// Source file, absent for synthetic layers
    pub file_path: Option<PathBuf>,
    /// Halts the upward ancestor walk when set
    pub root: bool,
    pub env: BTreeMap<String, bool>,
    pub globals: BTreeMap<String, GlobalAccess>,
    pub parser: Option<ParserDescriptor>,
    pub parser_options: Map<String, Value>,
    pub plugins: IndexMap<String, PluginDescriptor>,
    pub processor: Option<String>,
    pub rules: BTreeMap<String, RuleEntry>,
    pub settings: Map<String, Value>,
    pub overrides: Vec<OverrideEntry>,
}

impl ConfigElement {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn string_or_seq<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Raw shape of a configuration file or of inline configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigData {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub root: bool,

    #[serde(
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extends: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, GlobalAccess>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parser_options: Map<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, RuleEntry>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideData>,
}

/// Raw shape of one `overrides` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideData {
    #[serde(deserialize_with = "string_or_seq")]
    pub files: Vec<String>,

    #[serde(
        default,
        deserialize_with = "string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub excluded_files: Vec<String>,

    #[serde(flatten)]
    pub config: ConfigData,
}
