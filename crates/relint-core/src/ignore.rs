//! Ignore predicate for discovered and directly named files
//!
//! Built-in defaults always apply: dotfiles (unless the with-dotfiles
//! variant is requested), `node_modules`, and `bower_components`. User
//! patterns and the ignore file are layered on top of the defaults only
//! while the ignore option is on, so the defaults-only form is exactly
//! what remains when it is off. Patterns use gitignore semantics,
//! including `!` re-includes, which is why the dotfiles variant is a
//! separate instance instead of a per-call switch: user patterns keep
//! their position relative to the dotfile exclusion.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{RelintError, Result};

/// Ignore file consulted when no explicit path is configured
pub const IGNORE_FILENAME: &str = ".relintignore";

const DEFAULT_IGNORE_PATTERNS: &[&str] = &["/node_modules/*", "/bower_components/*"];
const DOTFILE_PATTERN: &str = ".*";

/// Options for [`IgnoreMatcher::new`]
#[derive(Debug, Clone)]
pub struct IgnoreOptions {
    /// Directory the patterns are anchored to
    pub cwd: PathBuf,
    /// Whether user-supplied patterns and the ignore file are honored
    pub ignore: bool,
    /// Explicit ignore file; `.relintignore` under `cwd` otherwise
    pub ignore_path: Option<PathBuf>,
    /// Extra patterns, appended after the ignore file's
    pub ignore_patterns: Vec<String>,
    /// Whether dotfiles stay matchable (drops the `.*` default)
    pub dotfiles: bool,
}

/// Answers whether a path is ignored
#[derive(Debug)]
pub struct IgnoreMatcher {
    cwd: PathBuf,
    defaults: Gitignore,
    full: Gitignore,
}

impl IgnoreMatcher {
    pub fn new(options: &IgnoreOptions) -> Result<Self> {
        let defaults = Self::default_builder(options)?
            .build()
            .map_err(invalid_pattern)?;

        let mut builder = Self::default_builder(options)?;
        if options.ignore {
            match &options.ignore_path {
                Some(path) => {
                    let path = if path.is_absolute() {
                        path.clone()
                    } else {
                        options.cwd.join(path)
                    };
                    let content = fs::read_to_string(&path).map_err(|e| {
                        RelintError::config_error(format!(
                            "Cannot read ignore file: {} ({})",
                            path.display(),
                            e
                        ))
                    })?;
                    Self::add_lines(&mut builder, &content)?;
                }
                None => {
                    let path = options.cwd.join(IGNORE_FILENAME);
                    match fs::read_to_string(&path) {
                        Ok(content) => Self::add_lines(&mut builder, &content)?,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(RelintError::io_error(&path, e)),
                    }
                }
            }
            for pattern in &options.ignore_patterns {
                builder.add_line(None, pattern).map_err(invalid_pattern)?;
            }
        }
        let full = builder.build().map_err(invalid_pattern)?;

        Ok(Self {
            cwd: options.cwd.clone(),
            defaults,
            full,
        })
    }

    fn default_builder(options: &IgnoreOptions) -> Result<GitignoreBuilder> {
        let mut builder = GitignoreBuilder::new(&options.cwd);
        if !options.dotfiles {
            builder
                .add_line(None, DOTFILE_PATTERN)
                .map_err(invalid_pattern)?;
        }
        for pattern in DEFAULT_IGNORE_PATTERNS {
            builder.add_line(None, pattern).map_err(invalid_pattern)?;
        }
        Ok(builder)
    }

    fn add_lines(builder: &mut GitignoreBuilder, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder.add_line(None, line).map_err(invalid_pattern)?;
        }
        Ok(())
    }

    /// Whether the full pattern set ignores `path`.
    pub fn contains(&self, path: &Path, is_dir: bool) -> bool {
        self.matched(&self.full, path, is_dir)
    }

    /// Whether the built-in defaults alone ignore `path`.
    pub fn contains_default(&self, path: &Path, is_dir: bool) -> bool {
        self.matched(&self.defaults, path, is_dir)
    }

    fn matched(&self, gitignore: &Gitignore, path: &Path, is_dir: bool) -> bool {
        let relative = match path.strip_prefix(&self.cwd) {
            Ok(relative) => relative,
            // Paths outside the working directory are never ignored.
            Err(_) => return false,
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        gitignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

fn invalid_pattern(error: ignore::Error) -> RelintError {
    RelintError::config_error(format!("Invalid ignore pattern: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn matcher(temp: &TempDir, patterns: &[&str], dotfiles: bool) -> IgnoreMatcher {
        IgnoreMatcher::new(&IgnoreOptions {
            cwd: temp.path().to_path_buf(),
            ignore: true,
            ignore_path: None,
            ignore_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            dotfiles,
        })
        .unwrap()
    }

    #[test]
    fn test_default_patterns() {
        let temp = TempDir::new().unwrap();
        let m = matcher(&temp, &[], false);

        assert!(m.contains(&temp.path().join(".hidden.js"), false));
        assert!(m.contains(&temp.path().join("node_modules/dep"), true));
        assert!(m.contains(&temp.path().join("node_modules/dep/index.js"), false));
        assert!(m.contains(&temp.path().join("bower_components/x/y.js"), false));
        assert!(!m.contains(&temp.path().join("src/app.js"), false));
    }

    #[test]
    fn test_dotfiles_variant_keeps_user_patterns() {
        let temp = TempDir::new().unwrap();
        let m = matcher(&temp, &["ignored.js"], true);

        assert!(!m.contains(&temp.path().join(".hidden.js"), false));
        assert!(m.contains(&temp.path().join("lib/ignored.js"), false));
    }

    #[test]
    fn test_files_under_dotted_directories_are_ignored() {
        let temp = TempDir::new().unwrap();
        let m = matcher(&temp, &[], false);
        assert!(m.contains(&temp.path().join(".cache/app.js"), false));
    }

    #[test]
    fn test_ignore_file_is_loaded() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(IGNORE_FILENAME),
            "# comment\n/lib/nested/parser.js\n",
        )
        .unwrap();
        let m = matcher(&temp, &[], false);

        assert!(m.contains(&temp.path().join("lib/nested/parser.js"), false));
        assert!(!m.contains(&temp.path().join("lib/nested/other.js"), false));
        // Built-in defaults alone do not know the user pattern.
        assert!(!m.contains_default(&temp.path().join("lib/nested/parser.js"), false));
    }

    #[test]
    fn test_negation_reincludes() {
        let temp = TempDir::new().unwrap();
        let m = matcher(&temp, &["build/**", "!build/keep.js"], false);
        assert!(m.contains(&temp.path().join("build/out.js"), false));
        assert!(!m.contains(&temp.path().join("build/keep.js"), false));
    }

    #[test]
    fn test_paths_outside_cwd_are_not_ignored() {
        let temp = TempDir::new().unwrap();
        let m = matcher(&temp, &[], false);
        assert!(!m.contains(Path::new("/elsewhere/.hidden.js"), false));
    }

    #[test]
    fn test_explicit_ignore_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let result = IgnoreMatcher::new(&IgnoreOptions {
            cwd: temp.path().to_path_buf(),
            ignore: true,
            ignore_path: Some(PathBuf::from("missing-ignore-file")),
            ignore_patterns: Vec::new(),
            dotfiles: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_ignore_off_keeps_defaults_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(IGNORE_FILENAME), "foo.js\n").unwrap();
        let m = IgnoreMatcher::new(&IgnoreOptions {
            cwd: temp.path().to_path_buf(),
            ignore: false,
            ignore_path: None,
            ignore_patterns: Vec::new(),
            dotfiles: false,
        })
        .unwrap();

        assert!(!m.contains(&temp.path().join("foo.js"), false));
        assert!(m.contains(&temp.path().join(".hidden.js"), false));
    }
}
