//! Cascading resolution of configuration arrays across ancestor
//! directories
//!
//! The resolver walks upward from a file's directory, loading and caching
//! one configuration array per directory. The walk stops at a `root`
//! marker, at the user's home directory (unless the tool runs inside it),
//! at the filesystem root, or where reading configs is denied. Finalizing
//! appends the CLI layers and, when no real config file took part, the
//! personal configuration from the home directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RelintError, Result};

use super::array::ConfigArray;
use super::element::{ConfigData, ConfigElement, PluginDescriptor};
use super::factory::{load_rules_from_directory, ConfigArrayFactory};

/// Options for [`CascadingConfigResolver::new`]
#[derive(Debug, Clone)]
pub struct CascadingResolverOptions {
    /// Working directory; defaults to the process working directory
    pub cwd: Option<PathBuf>,
    /// Home directory override; defaults to the user's home directory
    pub home_dir: Option<PathBuf>,
    /// Configuration appended below everything else
    pub base_config: Option<ConfigData>,
    /// Configuration appended above everything else
    pub cli_config: Option<ConfigData>,
    /// Explicit configuration file whose layers precede the CLI layers
    pub config_file: Option<PathBuf>,
    /// Directories of extra rule sources, exposed through a synthetic
    /// plugin on the base array
    pub rule_paths: Vec<PathBuf>,
    /// Whether configuration files are consulted at all
    pub use_config_files: bool,
}

impl Default for CascadingResolverOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            home_dir: None,
            base_config: None,
            cli_config: None,
            config_file: None,
            rule_paths: Vec::new(),
            use_config_files: true,
        }
    }
}

struct FinalizeEntry {
    /// Kept so the raw array's identity key stays pinned while cached
    _raw: ConfigArray,
    finalized: ConfigArray,
}

/// Resolves the merged configuration array for any path, caching per
/// directory and per raw-array identity.
///
/// All methods take `&self`; the caches use interior mutability under the
/// crate's single-threaded contract.
pub struct CascadingConfigResolver {
    factory: ConfigArrayFactory,
    cwd: PathBuf,
    home_dir: Option<PathBuf>,
    use_config_files: bool,
    base_config: Option<ConfigData>,
    cli_config: Option<ConfigData>,
    config_file: Option<PathBuf>,
    rule_paths: Vec<PathBuf>,
    base_array: ConfigArray,
    cli_array: ConfigArray,
    directory_cache: RefCell<HashMap<PathBuf, ConfigArray>>,
    finalize_cache: RefCell<HashMap<usize, FinalizeEntry>>,
}

impl CascadingConfigResolver {
    pub fn new(options: CascadingResolverOptions) -> Result<Self> {
        let cwd = match options.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir().map_err(|e| RelintError::io_error(".", e))?,
        };
        let home_dir = options.home_dir.or_else(dirs::home_dir);
        let factory = ConfigArrayFactory::new(cwd.clone());
        let base_array = create_base_config_array(
            &factory,
            options.base_config.as_ref(),
            &options.rule_paths,
            &cwd,
        )?;
        let cli_array = create_cli_config_array(
            &factory,
            options.cli_config.as_ref(),
            options.config_file.as_deref(),
            &cwd,
        )?;

        Ok(Self {
            factory,
            cwd,
            home_dir,
            use_config_files: options.use_config_files,
            base_config: options.base_config,
            cli_config: options.cli_config,
            config_file: options.config_file,
            rule_paths: options.rule_paths,
            base_array,
            cli_array,
            directory_cache: RefCell::new(HashMap::new()),
            finalize_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The finalized configuration array for `file_path` (absolute).
    pub fn config_array_for_file(&self, file_path: &Path) -> Result<ConfigArray> {
        debug!("Resolve config for file: {}", file_path.display());
        let dir = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone());
        let raw = self.config_array_for_directory(&dir)?;
        self.finalize(&raw, &dir)
    }

    /// The raw (unfinalized) merged array for files inside `dir`.
    pub fn config_array_for_directory(&self, dir: &Path) -> Result<ConfigArray> {
        if !self.use_config_files {
            return Ok(self.base_array.clone());
        }
        self.resolve_dir(dir)
    }

    fn resolve_dir(&self, dir: &Path) -> Result<ConfigArray> {
        if let Some(hit) = self.directory_cache.borrow().get(dir) {
            return Ok(hit.clone());
        }
        if let Some(home) = &self.home_dir {
            // The personal config is applied by finalization, not here;
            // when the tool runs inside home, configs below home cascade.
            if dir == home && home != &self.cwd {
                debug!("Stop traversing at the home directory: {}", dir.display());
                return Ok(self.cache_directory(dir, self.base_array.clone()));
            }
        }
        let own = match self.factory.load_on_directory(dir, None) {
            Ok(own) => own,
            Err(e) if e.is_permission_denied() => {
                debug!("Stop traversing because of denied access: {}", dir.display());
                return Ok(self.cache_directory(dir, self.base_array.clone()));
            }
            Err(e) => return Err(e),
        };
        if !own.is_empty() && own.is_root() {
            debug!("Stop traversing because of 'root: true': {}", dir.display());
            return Ok(self.cache_directory(dir, own));
        }
        let parent = match dir.parent() {
            Some(parent) => self.resolve_dir(parent)?,
            None => self.base_array.clone(),
        };
        let merged = if own.is_empty() {
            parent
        } else {
            own.layered_on(&parent)
        };
        Ok(self.cache_directory(dir, merged))
    }

    fn cache_directory(&self, dir: &Path, array: ConfigArray) -> ConfigArray {
        self.directory_cache
            .borrow_mut()
            .insert(dir.to_path_buf(), array.clone());
        array
    }

    /// Finalize a raw array for consumers: personal-config fallback, CLI
    /// layers, validation. Memoized by the raw array's identity.
    pub fn finalize(&self, array: &ConfigArray, dir: &Path) -> Result<ConfigArray> {
        let key = array.instance_key();
        let cached = self
            .finalize_cache
            .borrow()
            .get(&key)
            .map(|entry| entry.finalized.clone());
        let finalized = match cached {
            Some(finalized) => finalized,
            None => {
                let mut result = array.clone();
                if self.use_config_files
                    && !array.uses_config_file()
                    && !self.cli_array.uses_config_file()
                {
                    if let Some(home) = &self.home_dir {
                        debug!("Load the personal config: {}", home.display());
                        let personal = match self
                            .factory
                            .load_on_directory(home, Some("PersonalConfig"))
                        {
                            Ok(personal) => personal,
                            Err(e) if e.is_permission_denied() => ConfigArray::empty(),
                            Err(e) => return Err(e),
                        };
                        if !personal.is_empty() {
                            result = result.concat(&personal);
                        }
                    }
                }
                if !self.cli_array.is_empty() {
                    result = result.concat(&self.cli_array);
                }
                self.factory.validate(&result)?;
                self.finalize_cache.borrow_mut().insert(
                    key,
                    FinalizeEntry {
                        _raw: array.clone(),
                        finalized: result.clone(),
                    },
                );
                result
            }
        };
        if self.use_config_files && finalized.is_empty() {
            return Err(RelintError::configuration_not_found(dir));
        }
        Ok(finalized)
    }

    /// Rebuild the base and CLI arrays from the retained inputs and drop
    /// both caches. Arrays handed out before the call keep their (now
    /// stale) identities.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.base_array = create_base_config_array(
            &self.factory,
            self.base_config.as_ref(),
            &self.rule_paths,
            &self.cwd,
        )?;
        self.cli_array = create_cli_config_array(
            &self.factory,
            self.cli_config.as_ref(),
            self.config_file.as_deref(),
            &self.cwd,
        )?;
        self.directory_cache.borrow_mut().clear();
        self.finalize_cache.borrow_mut().clear();
        Ok(())
    }
}

/// The immutable tail of every chain: the base configuration plus, when
/// rule directories were supplied, a synthetic `--rulesdir` element whose
/// empty-string plugin exposes the collected rules. The synthetic element
/// has no file path, so it never counts as a real config file.
fn create_base_config_array(
    factory: &ConfigArrayFactory,
    base_config: Option<&ConfigData>,
    rule_paths: &[PathBuf],
    cwd: &Path,
) -> Result<ConfigArray> {
    let base = factory.create(base_config, "BaseConfig", cwd)?;
    if rule_paths.is_empty() {
        return Ok(base);
    }
    let mut rules = std::collections::BTreeMap::new();
    for dir in rule_paths {
        // Later directories overwrite earlier ones on rule id collision.
        rules.extend(load_rules_from_directory(dir)?);
    }
    let mut element = ConfigElement::named("--rulesdir");
    element.plugins.insert(
        String::new(),
        PluginDescriptor {
            id: String::new(),
            file_path: None,
            rules,
        },
    );
    Ok(base.concat(&ConfigArray::new(vec![element])))
}

/// The head of the final chain: an explicit `--config` file's layers
/// followed by the CLI-inline layers.
fn create_cli_config_array(
    factory: &ConfigArrayFactory,
    cli_config: Option<&ConfigData>,
    config_file: Option<&Path>,
    cwd: &Path,
) -> Result<ConfigArray> {
    let cli = factory.create(cli_config, "CLIOptions", cwd)?;
    match config_file {
        None => Ok(cli),
        Some(file) => {
            let file_path = crate::paths::resolve_path(cwd, &file.to_string_lossy());
            let loaded = factory.load_file(&file_path, Some("--config"))?;
            Ok(cli.layered_on(&loaded))
        }
    }
}
