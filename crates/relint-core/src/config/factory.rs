//! Materializing configuration arrays from inline data, explicit files,
//! and directory scans
//!
//! The factory turns raw [`ConfigData`] into [`ConfigArray`]s: it resolves
//! `extends` chains, resolves parser paths against the declaring file's
//! directory, compiles `overrides` matchers, and validates the composed
//! result. Directory loading probes the recognized filenames in order and
//! takes the first hit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RelintError, Result};
use crate::paths;

use super::array::ConfigArray;
use super::element::{
    ConfigData, ConfigElement, OverrideEntry, OverrideTester, ParserDescriptor, PluginDescriptor,
};

/// Recognized configuration filenames, in scan order
pub const CONFIG_FILENAMES: &[&str] = &[
    ".relintrc.json",
    ".relintrc.yaml",
    ".relintrc.yml",
    ".relintrc",
];

/// Environments a configuration may enable
const KNOWN_ENVIRONMENTS: &[&str] = &[
    "amd",
    "browser",
    "commonjs",
    "es6",
    "es2015",
    "es2017",
    "es2020",
    "es2021",
    "jasmine",
    "jest",
    "mocha",
    "node",
    "shared-node-browser",
    "worker",
];

/// Creates configuration arrays from in-memory data, single files, or
/// directory scans
pub struct ConfigArrayFactory {
    cwd: PathBuf,
}

impl ConfigArrayFactory {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Materialize inline configuration data. `None` yields an empty array.
    pub fn create(
        &self,
        data: Option<&ConfigData>,
        name: &str,
        base_dir: &Path,
    ) -> Result<ConfigArray> {
        let data = match data {
            Some(data) => data,
            None => return Ok(ConfigArray::empty()),
        };
        let mut chain = Vec::new();
        let elements = self.normalize(data, name, None, base_dir, &mut chain)?;
        Ok(ConfigArray::new(elements))
    }

    /// Load one explicit configuration file, resolving its `extends` chain.
    pub fn load_file(&self, file_path: &Path, name: Option<&str>) -> Result<ConfigArray> {
        let content = fs::read_to_string(file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelintError::config_error(format!(
                    "Cannot read config file: {}",
                    file_path.display()
                ))
            } else {
                RelintError::io_error(file_path, e)
            }
        })?;
        let data = self.parse_config_content(&content, file_path)?;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.relative_name(file_path));
        let base_dir = file_path.parent().unwrap_or(&self.cwd).to_path_buf();
        let mut chain = vec![file_path.to_path_buf()];
        let elements = self.normalize(&data, &name, Some(file_path), &base_dir, &mut chain)?;
        Ok(ConfigArray::new(elements))
    }

    /// Scan `dir` for a recognized configuration file. The first filename
    /// that exists wins; an empty array is returned when none do.
    ///
    /// A permission failure while probing surfaces as an I/O error so the
    /// cascading resolver can stop the ancestor walk there.
    pub fn load_on_directory(&self, dir: &Path, name: Option<&str>) -> Result<ConfigArray> {
        for filename in CONFIG_FILENAMES {
            let file_path = dir.join(filename);
            let metadata = match fs::metadata(&file_path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(RelintError::io_error(&file_path, e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let content = fs::read_to_string(&file_path)
                .map_err(|e| RelintError::io_error(&file_path, e))?;
            let data = self.parse_config_content(&content, &file_path)?;
            let name = name
                .map(str::to_string)
                .unwrap_or_else(|| self.relative_name(&file_path));
            debug!("Config file found: {}", file_path.display());
            let mut chain = vec![file_path.clone()];
            let elements = self.normalize(&data, &name, Some(&file_path), dir, &mut chain)?;
            return Ok(ConfigArray::new(elements));
        }
        Ok(ConfigArray::empty())
    }

    /// Validate a composed array. Failures are fatal.
    pub fn validate(&self, array: &ConfigArray) -> Result<()> {
        for element in array.iter() {
            for env_name in element.env.keys() {
                if !KNOWN_ENVIRONMENTS.contains(&env_name.as_str()) {
                    return Err(RelintError::config_error(format!(
                        "Environment '{}' is not known (in {})",
                        env_name, element.name
                    )));
                }
            }
            if let Some(processor) = &element.processor {
                if !processor.contains('/') {
                    return Err(RelintError::config_error(format!(
                        "Processor '{}' must be in 'plugin/processor-name' form (in {})",
                        processor, element.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn parse_config_content(&self, content: &str, file_path: &Path) -> Result<ConfigData> {
        let content = content.trim_start_matches('\u{feff}');
        let extension = file_path.extension().and_then(|e| e.to_str());
        match extension {
            Some("json") => serde_json::from_str(content).map_err(|e| {
                RelintError::config_error(format!(
                    "Failed to parse '{}': {}",
                    file_path.display(),
                    e
                ))
            }),
            Some("yaml") | Some("yml") => serde_yaml::from_str(content).map_err(|e| {
                RelintError::config_error(format!(
                    "Failed to parse '{}': {}",
                    file_path.display(),
                    e
                ))
            }),
            // The extensionless legacy form may hold either format.
            _ => serde_json::from_str(content).or_else(|_| {
                serde_yaml::from_str(content).map_err(|e| {
                    RelintError::config_error(format!(
                        "Failed to parse '{}': {}",
                        file_path.display(),
                        e
                    ))
                })
            }),
        }
    }

    /// Normalize raw data into elements: extended configurations first,
    /// the data's own element last.
    fn normalize(
        &self,
        data: &ConfigData,
        name: &str,
        file_path: Option<&Path>,
        base_dir: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Vec<ConfigElement>> {
        let mut elements = Vec::new();
        for extend in &data.extends {
            elements.extend(self.load_extends(extend, name, base_dir, chain)?);
        }
        elements.push(self.materialize_element(data, name, file_path, base_dir)?);
        Ok(elements)
    }

    fn load_extends(
        &self,
        specifier: &str,
        child_name: &str,
        base_dir: &Path,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Vec<ConfigElement>> {
        let is_path = specifier.starts_with("./")
            || specifier.starts_with("../")
            || Path::new(specifier).is_absolute();
        if !is_path {
            return Err(RelintError::config_error(format!(
                "Failed to extend '{specifier}' from '{child_name}': only file paths can be extended"
            )));
        }
        let file_path = paths::normalize_lexically(&base_dir.join(specifier));
        if chain.contains(&file_path) {
            return Err(RelintError::config_error(format!(
                "Circular extends detected at '{}' (from '{}')",
                file_path.display(),
                child_name
            )));
        }
        let content = fs::read_to_string(&file_path).map_err(|e| {
            RelintError::config_error(format!(
                "Failed to extend '{}' from '{}': {}",
                specifier, child_name, e
            ))
        })?;
        let data = self.parse_config_content(&content, &file_path)?;
        let name = format!("{child_name} » {}", self.relative_name(&file_path));
        let parent_dir = file_path.parent().unwrap_or(base_dir).to_path_buf();
        chain.push(file_path.clone());
        let result = self.normalize(&data, &name, Some(&file_path), &parent_dir, chain);
        chain.pop();
        result
    }

    fn materialize_element(
        &self,
        data: &ConfigData,
        name: &str,
        file_path: Option<&Path>,
        base_dir: &Path,
    ) -> Result<ConfigElement> {
        let mut element = ConfigElement::named(name);
        element.file_path = file_path.map(Path::to_path_buf);
        element.root = data.root;
        element.env = data.env.clone();
        element.globals = data.globals.clone();
        element.parser_options = data.parser_options.clone();
        element.processor = data.processor.clone();
        element.rules = data.rules.clone();
        element.settings = data.settings.clone();

        if let Some(parser) = &data.parser {
            element.parser = Some(ParserDescriptor {
                id: parser.clone(),
                file_path: Some(self.resolve_parser_path(parser, base_dir)),
            });
        }

        for plugin_id in &data.plugins {
            if plugin_id.is_empty() {
                return Err(RelintError::config_error(format!(
                    "Empty plugin id (in {name})"
                )));
            }
            element
                .plugins
                .insert(plugin_id.clone(), PluginDescriptor::named(plugin_id.clone()));
        }

        for (index, block) in data.overrides.iter().enumerate() {
            if block.files.is_empty() {
                return Err(RelintError::config_error(format!(
                    "Override block {index} of '{name}' must declare at least one file pattern"
                )));
            }
            if block.config.root {
                return Err(RelintError::config_error(format!(
                    "'root' is not allowed inside overrides (in {name})"
                )));
            }
            if !block.config.extends.is_empty() {
                return Err(RelintError::config_error(format!(
                    "'extends' is not allowed inside overrides (in {name})"
                )));
            }
            if !block.config.overrides.is_empty() {
                return Err(RelintError::config_error(format!(
                    "'overrides' cannot be nested (in {name})"
                )));
            }
            let nested_name = format!("{name}#overrides[{index}]");
            let nested =
                self.materialize_element(&block.config, &nested_name, file_path, base_dir)?;
            element.overrides.push(OverrideEntry {
                tester: OverrideTester::new(&block.files, &block.excluded_files, base_dir)?,
                config: nested,
            });
        }

        Ok(element)
    }

    /// Resolve a parser specifier against the declaring directory. A bare
    /// specifier without extension resolves to its `.js` source when that
    /// exists on disk.
    fn resolve_parser_path(&self, specifier: &str, base_dir: &Path) -> PathBuf {
        let candidate = paths::normalize_lexically(&base_dir.join(specifier));
        if candidate.is_file() {
            return candidate;
        }
        if candidate.extension().is_none() {
            let with_extension = candidate.with_extension("js");
            if with_extension.is_file() {
                return with_extension;
            }
        }
        candidate
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.cwd)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Collect rule sources from a rules directory: every `*.js` file, keyed
/// by its stem.
pub(crate) fn load_rules_from_directory(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut rules = BTreeMap::new();
    let entries = fs::read_dir(dir).map_err(|e| RelintError::io_error(dir, e))?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RelintError::io_error(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();
    for path in paths {
        if path.extension().and_then(|e| e.to_str()) != Some("js") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            rules.insert(stem.to_string(), path.clone());
        }
    }
    Ok(rules)
}
