//! Ordered configuration chains with shared identity
//!
//! A [`ConfigArray`] is the ordered sequence of layers that applies to a
//! directory, lowest precedence first. Arrays are handed out as shared
//! handles: every file in a directory receives the same instance, and
//! downstream caches key on that identity. [`ExtractedConfig`] is the
//! flattened view obtained by folding an array against one target file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::element::{
    ConfigElement, GlobalAccess, ParserDescriptor, PluginDescriptor, RuleEntry,
};

/// An ordered, immutable-once-constructed sequence of configuration layers
#[derive(Debug, Clone)]
pub struct ConfigArray {
    elements: Arc<Vec<ConfigElement>>,
}

impl ConfigArray {
    pub fn new(elements: Vec<ConfigElement>) -> Self {
        Self {
            elements: Arc::new(elements),
        }
    }

    /// A fresh empty array. Every call returns a distinct instance.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConfigElement> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigElement> {
        self.elements.iter()
    }

    /// Whether any layer carries the `root` stop marker
    pub fn is_root(&self) -> bool {
        self.elements.iter().any(|element| element.root)
    }

    /// Whether any layer originates from a real file on disk
    pub fn uses_config_file(&self) -> bool {
        self.elements.iter().any(|element| element.file_path.is_some())
    }

    /// Whether two handles refer to the exact same array instance
    pub fn same_instance(a: &ConfigArray, b: &ConfigArray) -> bool {
        Arc::ptr_eq(&a.elements, &b.elements)
    }

    /// Stable identity of this instance, used as a memoization key. Valid
    /// for as long as a handle to the array is retained.
    pub(crate) fn instance_key(&self) -> usize {
        Arc::as_ptr(&self.elements) as *const () as usize
    }

    /// A new array holding `parent`'s layers followed by this array's
    pub fn layered_on(&self, parent: &ConfigArray) -> ConfigArray {
        let mut elements = Vec::with_capacity(parent.len() + self.len());
        elements.extend(parent.iter().cloned());
        elements.extend(self.iter().cloned());
        ConfigArray::new(elements)
    }

    /// A new array holding this array's layers followed by `tail`'s
    pub fn concat(&self, tail: &ConfigArray) -> ConfigArray {
        tail.layered_on(self)
    }

    /// Fold the chain against one target file, applying every matching
    /// `overrides` block in element order.
    pub fn extract_config(&self, file_path: &Path) -> ExtractedConfig {
        let mut extracted = ExtractedConfig::default();
        for element in self.iter() {
            extracted.apply(element, file_path);
        }
        extracted
    }
}

impl<'a> IntoIterator for &'a ConfigArray {
    type Item = &'a ConfigElement;
    type IntoIter = std::slice::Iter<'a, ConfigElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The flattened configuration the lint engine consumes
#[derive(Debug, Clone, Default)]
pub struct ExtractedConfig {
    pub env: BTreeMap<String, bool>,
    pub globals: BTreeMap<String, GlobalAccess>,
    pub parser: Option<ParserDescriptor>,
    pub parser_options: Map<String, Value>,
    pub plugins: IndexMap<String, PluginDescriptor>,
    pub processor: Option<String>,
    pub rules: BTreeMap<String, RuleEntry>,
    pub settings: Map<String, Value>,
}

impl ExtractedConfig {
    fn apply(&mut self, element: &ConfigElement, file_path: &Path) {
        for (name, enabled) in &element.env {
            self.env.insert(name.clone(), *enabled);
        }
        for (name, access) in &element.globals {
            self.globals.insert(name.clone(), *access);
        }
        if let Some(parser) = &element.parser {
            self.parser = Some(parser.clone());
        }
        deep_merge(&mut self.parser_options, &element.parser_options);
        for (id, descriptor) in &element.plugins {
            // IndexMap keeps the first insertion position on overwrite.
            self.plugins.insert(id.clone(), descriptor.clone());
        }
        if element.processor.is_some() {
            self.processor = element.processor.clone();
        }
        for (id, entry) in &element.rules {
            match self.rules.get_mut(id) {
                // A severity-only layer keeps the options set below it.
                Some(existing) if entry.options.is_empty() && !existing.options.is_empty() => {
                    existing.severity = entry.severity;
                }
                _ => {
                    self.rules.insert(id.clone(), entry.clone());
                }
            }
        }
        deep_merge(&mut self.settings, &element.settings);
        for entry in &element.overrides {
            if entry.tester.matches(file_path) {
                self.apply(&entry.config, file_path);
            }
        }
    }

    /// Render the compat form used by `--print-config` style callers: the
    /// parser becomes its file path, plugins become their ids in reverse
    /// insertion order, and the processor is omitted.
    pub fn to_config_file_content(&self) -> Value {
        let parser = match &self.parser {
            Some(descriptor) => match &descriptor.file_path {
                Some(path) => Value::String(path.to_string_lossy().into_owned()),
                None => Value::Null,
            },
            None => Value::Null,
        };
        let globals: Map<String, Value> = self
            .globals
            .iter()
            .map(|(name, access)| (name.clone(), Value::String(access.as_str().to_string())))
            .collect();
        let rules: Map<String, Value> = self
            .rules
            .iter()
            .map(|(id, entry)| {
                (
                    id.clone(),
                    serde_json::to_value(entry).unwrap_or(Value::Null),
                )
            })
            .collect();
        let plugins: Vec<Value> = self
            .plugins
            .keys()
            .rev()
            .map(|id| Value::String(id.clone()))
            .collect();

        json!({
            "env": self.env,
            "globals": globals,
            "parser": parser,
            "parserOptions": self.parser_options,
            "plugins": plugins,
            "rules": rules,
            "settings": self.settings,
        })
    }
}

fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
