//! File discovery bound to cascading configuration resolution
//!
//! [`FileEnumerator`] expands input patterns into the concrete files to
//! process, each paired with its finalized configuration array. Patterns
//! dispatch to one of three strategies, in this order: glob, existing
//! directory, existing file. Iteration is pull-based; no filesystem work
//! happens beyond what the consumer demands.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use tracing::debug;

use crate::config::{CascadingConfigResolver, CascadingResolverOptions, ConfigArray};
use crate::error::{RelintError, Result};
use crate::ignore::{IgnoreMatcher, IgnoreOptions};
use crate::paths;

/// Extensions selected by directory walks when none are configured
const DEFAULT_EXTENSIONS: &[&str] = &[".js"];

/// Options for [`FileEnumerator::new`]
#[derive(Debug, Clone)]
pub struct EnumeratorOptions {
    /// Working directory; defaults to the process working directory
    pub cwd: Option<PathBuf>,
    /// Extensions selected by directory walks (with or without dots)
    pub extensions: Option<Vec<String>>,
    /// Whether patterns with glob metacharacters are expanded
    pub glob_input_paths: bool,
    /// Whether user ignore patterns and the ignore file are honored
    pub ignore: bool,
    /// Explicit ignore file path
    pub ignore_path: Option<PathBuf>,
    /// Extra ignore patterns
    pub ignore_patterns: Vec<String>,
    /// Options forwarded to the cascading configuration resolver
    pub resolver: CascadingResolverOptions,
}

impl Default for EnumeratorOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            extensions: None,
            glob_input_paths: true,
            ignore: true,
            ignore_path: None,
            ignore_patterns: Vec::new(),
            resolver: CascadingResolverOptions::default(),
        }
    }
}

/// One enumerated file with its finalized configuration
#[derive(Debug, Clone)]
pub struct FileAndConfig {
    pub file_path: PathBuf,
    pub config: ConfigArray,
    /// True when the caller named this file directly even though it is
    /// ignored
    pub ignored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryFlag {
    /// A target file
    None,
    /// Skipped without notice: an ignore rule matched a discovered file
    IgnoredSilently,
    /// The caller named this file directly, yet it is ignored
    Ignored,
}

struct InternalEntry {
    path: PathBuf,
    config: ConfigArray,
    flag: EntryFlag,
}

/// A list of input patterns. Accepts a single pattern or a sequence.
pub struct PatternList(Vec<String>);

impl From<&str> for PatternList {
    fn from(pattern: &str) -> Self {
        Self(vec![pattern.to_string()])
    }
}

impl From<String> for PatternList {
    fn from(pattern: String) -> Self {
        Self(vec![pattern])
    }
}

impl From<Vec<String>> for PatternList {
    fn from(patterns: Vec<String>) -> Self {
        Self(patterns)
    }
}

impl From<Vec<&str>> for PatternList {
    fn from(patterns: Vec<&str>) -> Self {
        Self(patterns.iter().map(|p| p.to_string()).collect())
    }
}

impl From<&[&str]> for PatternList {
    fn from(patterns: &[&str]) -> Self {
        Self(patterns.iter().map(|p| p.to_string()).collect())
    }
}

impl From<&[String]> for PatternList {
    fn from(patterns: &[String]) -> Self {
        Self(patterns.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for PatternList {
    fn from(patterns: [&str; N]) -> Self {
        Self(patterns.iter().map(|p| p.to_string()).collect())
    }
}

impl<const N: usize> From<[String; N]> for PatternList {
    fn from(patterns: [String; N]) -> Self {
        Self(patterns.to_vec())
    }
}

/// Enumerates target files and their configurations
pub struct FileEnumerator {
    cwd: PathBuf,
    resolver: CascadingConfigResolver,
    default_ignores: IgnoreMatcher,
    dotfile_ignores: IgnoreMatcher,
    extension_regex: Regex,
    glob_input_paths: bool,
    ignore_flag: bool,
}

impl FileEnumerator {
    pub fn new(mut options: EnumeratorOptions) -> Result<Self> {
        let cwd = match options.cwd.take() {
            Some(cwd) => cwd,
            None => std::env::current_dir().map_err(|e| RelintError::io_error(".", e))?,
        };
        if options.resolver.cwd.is_none() {
            options.resolver.cwd = Some(cwd.clone());
        }
        let resolver = CascadingConfigResolver::new(options.resolver)?;

        let ignore_options = IgnoreOptions {
            cwd: cwd.clone(),
            ignore: options.ignore,
            ignore_path: options.ignore_path.clone(),
            ignore_patterns: options.ignore_patterns.clone(),
            dotfiles: false,
        };
        let default_ignores = IgnoreMatcher::new(&ignore_options)?;
        let dotfile_ignores = IgnoreMatcher::new(&IgnoreOptions {
            dotfiles: true,
            ..ignore_options
        })?;

        let extensions = options
            .extensions
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
        let extension_regex = build_extension_regex(&extensions)?;

        Ok(Self {
            cwd,
            resolver,
            default_ignores,
            dotfile_ignores,
            extension_regex,
            glob_input_paths: options.glob_input_paths,
            ignore_flag: options.ignore,
        })
    }

    /// The configured working directory
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Lazily enumerate the files matched by `patterns`, in pattern order,
    /// deduplicated across patterns by absolute path.
    pub fn iterate_files<'a>(&'a self, patterns: impl Into<PatternList>) -> FileIterator<'a> {
        let PatternList(patterns) = patterns.into();
        debug!("Start to iterate files: {:?}", patterns);
        FileIterator {
            enumerator: self,
            patterns: patterns.into_iter(),
            current: None,
            seen: HashSet::new(),
            halted: false,
        }
    }

    /// The finalized configuration array for one file. Without an
    /// argument, resolves `a.js` in the working directory, which is the
    /// hook for print-config style callers.
    pub fn config_array_for_file(&self, file_path: Option<&Path>) -> Result<ConfigArray> {
        let input = file_path.unwrap_or_else(|| Path::new("a.js"));
        let absolute = paths::resolve_path(&self.cwd, &input.to_string_lossy());
        self.resolver.config_array_for_file(&absolute)
    }

    /// Rebuild the base and CLI configuration layers and drop all cached
    /// arrays.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.resolver.clear_cache()
    }

    fn is_target_path(&self, path: &Path) -> bool {
        self.extension_regex.is_match(&paths::to_glob_string(path))
    }

    fn is_ignored(&self, path: &Path, is_dir: bool, dot: bool) -> bool {
        let matcher = if dot {
            &self.dotfile_ignores
        } else {
            &self.default_ignores
        };
        if self.ignore_flag {
            matcher.contains(path, is_dir)
        } else {
            matcher.contains_default(path, is_dir)
        }
    }

    /// Pick the strategy for one pattern: glob, then directory, then file.
    fn dispatch(&self, pattern: &str) -> Result<PatternSource> {
        let absolute = paths::resolve_path(&self.cwd, pattern);
        let dot = paths::is_dot_pattern(pattern);

        if self.glob_input_paths && paths::is_glob_pattern(pattern) {
            debug!("Glob: {}", absolute.display());
            return self.glob_source(&absolute, pattern, dot);
        }
        match fs::metadata(&absolute) {
            Ok(metadata) if metadata.is_dir() => {
                debug!("Directory: {}", absolute.display());
                Ok(PatternSource::Walk(DirWalker::new(
                    absolute, None, true, dot,
                )?))
            }
            Ok(_) => {
                debug!("File: {}", absolute.display());
                Ok(PatternSource::Single(Some(absolute)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PatternSource::Nothing),
            Err(e) => Err(RelintError::io_error(&absolute, e)),
        }
    }

    fn glob_source(&self, absolute: &Path, pattern: &str, dot: bool) -> Result<PatternSource> {
        let glob_text = paths::to_glob_string(absolute);
        let (start, tail) = paths::split_glob_pattern(&glob_text);
        let recursive = tail.contains("**") || tail.contains('/');
        let selector = GlobBuilder::new(&glob_text)
            .literal_separator(true)
            .build()
            .map_err(|e| RelintError::config_error(format!("Invalid pattern '{pattern}': {e}")))?
            .compile_matcher();
        debug!(
            "Glob walk in {} (recursive: {})",
            start.display(),
            recursive
        );
        Ok(PatternSource::Walk(DirWalker::new(
            start,
            Some(selector),
            recursive,
            dot,
        )?))
    }
}

enum PatternSource {
    /// The pattern matched nothing at dispatch time
    Nothing,
    /// A directly named existing file
    Single(Option<PathBuf>),
    /// A directory or glob walk
    Walk(DirWalker),
}

struct PatternState {
    pattern: String,
    source: PatternSource,
    found_any: bool,
    found_target: bool,
}

impl PatternState {
    fn next_entry(&mut self, enumerator: &FileEnumerator) -> Option<Result<InternalEntry>> {
        match &mut self.source {
            PatternSource::Nothing => None,
            PatternSource::Single(slot) => {
                let path = slot.take()?;
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| enumerator.cwd.clone());
                let config = match enumerator.resolver.config_array_for_directory(&dir) {
                    Ok(config) => config,
                    Err(e) => return Some(Err(e)),
                };
                // Directly named files always use the default instance;
                // a match means the caller must be told, not silence.
                let flag = if enumerator.is_ignored(&path, false, false) {
                    EntryFlag::Ignored
                } else {
                    EntryFlag::None
                };
                Some(Ok(InternalEntry { path, config, flag }))
            }
            PatternSource::Walk(walker) => walker.next_entry(enumerator),
        }
    }
}

struct Frame {
    dir: PathBuf,
    /// Resolved lazily on the first matched file in this directory
    config: Option<ConfigArray>,
    entries: std::vec::IntoIter<(PathBuf, bool)>,
}

/// Depth-first walk over sorted directory listings, selecting files by a
/// glob (glob origin) or by the extension regex (directory origin).
struct DirWalker {
    selector: Option<GlobMatcher>,
    recursive: bool,
    dot: bool,
    frames: Vec<Frame>,
}

impl DirWalker {
    fn new(
        start: PathBuf,
        selector: Option<GlobMatcher>,
        recursive: bool,
        dot: bool,
    ) -> Result<Self> {
        let entries = list_directory(&start)?;
        Ok(Self {
            selector,
            recursive,
            dot,
            frames: vec![Frame {
                dir: start,
                config: None,
                entries: entries.into_iter(),
            }],
        })
    }

    fn next_entry(&mut self, enumerator: &FileEnumerator) -> Option<Result<InternalEntry>> {
        loop {
            let next = {
                let frame = self.frames.last_mut()?;
                frame.entries.next()
            };
            let (path, is_dir) = match next {
                Some(entry) => entry,
                None => {
                    if let Some(frame) = self.frames.pop() {
                        debug!("Leave the directory: {}", frame.dir.display());
                    }
                    continue;
                }
            };

            if is_dir {
                if !self.recursive {
                    continue;
                }
                if enumerator.is_ignored(&path, true, self.dot) {
                    debug!("Prune the directory: {}", path.display());
                    continue;
                }
                match list_directory(&path) {
                    Ok(entries) => {
                        debug!("Enter the directory: {}", path.display());
                        self.frames.push(Frame {
                            dir: path,
                            config: None,
                            entries: entries.into_iter(),
                        });
                    }
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }

            let matched = match &self.selector {
                Some(selector) => selector.is_match(&path),
                None => enumerator.is_target_path(&path),
            };
            if !matched {
                continue;
            }

            let frame = self.frames.last_mut()?;
            if frame.config.is_none() {
                match enumerator.resolver.config_array_for_directory(&frame.dir) {
                    Ok(config) => frame.config = Some(config),
                    Err(e) => return Some(Err(e)),
                }
            }
            let ignored = enumerator.is_ignored(&path, false, self.dot);
            if ignored {
                debug!("Yield (but ignored): {}", path.display());
            } else {
                debug!("Yield: {}", path.display());
            }
            return Some(Ok(InternalEntry {
                path,
                config: frame.config.clone().expect("config resolved above"),
                flag: if ignored {
                    EntryFlag::IgnoredSilently
                } else {
                    EntryFlag::None
                },
            }));
        }
    }
}

/// List a directory sorted by name. A missing directory is an empty
/// listing; broken entries are skipped; other errors propagate.
fn list_directory(dir: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RelintError::io_error(dir, e)),
    };
    let mut entries = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| RelintError::io_error(dir, e))?;
        let path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(file_type) if file_type.is_symlink() => match fs::metadata(&path) {
                Ok(metadata) => metadata.is_dir(),
                Err(_) => continue,
            },
            Ok(file_type) => file_type.is_dir(),
            Err(_) => continue,
        };
        entries.push((path, is_dir));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}

fn build_extension_regex(extensions: &[String]) -> Result<Regex> {
    if extensions.is_empty() {
        return Err(RelintError::config_error(
            "At least one target extension is required",
        ));
    }
    let alternatives: Vec<String> = extensions
        .iter()
        .map(|extension| regex::escape(extension.trim_start_matches('.')))
        .collect();
    let pattern = format!(r"\.(?:{})$", alternatives.join("|"));
    Regex::new(&pattern)
        .map_err(|e| RelintError::config_error(format!("Invalid extension list: {e}")))
}

/// Lazy sequence of enumerated files. Halts after the first error.
pub struct FileIterator<'a> {
    enumerator: &'a FileEnumerator,
    patterns: std::vec::IntoIter<String>,
    current: Option<PatternState>,
    seen: HashSet<PathBuf>,
    halted: bool,
}

impl<'a> Iterator for FileIterator<'a> {
    type Item = Result<FileAndConfig>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        loop {
            if self.current.is_none() {
                let pattern = loop {
                    match self.patterns.next() {
                        // Empty patterns are dropped silently.
                        Some(pattern) if pattern.is_empty() => continue,
                        Some(pattern) => break pattern,
                        None => return None,
                    }
                };
                let source = match self.enumerator.dispatch(&pattern) {
                    Ok(source) => source,
                    Err(e) => {
                        self.halted = true;
                        return Some(Err(e));
                    }
                };
                self.current = Some(PatternState {
                    pattern,
                    source,
                    found_any: false,
                    found_target: false,
                });
            }

            let state = self.current.as_mut().expect("pattern state set above");
            match state.next_entry(self.enumerator) {
                Some(Err(e)) => {
                    self.halted = true;
                    return Some(Err(e));
                }
                Some(Ok(entry)) => {
                    state.found_any = true;
                    if entry.flag == EntryFlag::IgnoredSilently {
                        continue;
                    }
                    state.found_target = true;
                    if !self.seen.insert(entry.path.clone()) {
                        continue;
                    }
                    let dir = entry
                        .path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.enumerator.cwd.clone());
                    match self.enumerator.resolver.finalize(&entry.config, &dir) {
                        Ok(config) => {
                            return Some(Ok(FileAndConfig {
                                file_path: entry.path,
                                config,
                                ignored: entry.flag == EntryFlag::Ignored,
                            }))
                        }
                        Err(e) => {
                            self.halted = true;
                            return Some(Err(e));
                        }
                    }
                }
                None => {
                    let state = self.current.take().expect("pattern state set above");
                    if !state.found_any {
                        self.halted = true;
                        let glob_disabled = !self.enumerator.glob_input_paths
                            && paths::is_glob_pattern(&state.pattern);
                        return Some(Err(RelintError::no_files_found(
                            state.pattern,
                            glob_disabled,
                        )));
                    }
                    if !state.found_target {
                        self.halted = true;
                        return Some(Err(RelintError::all_files_ignored(state.pattern)));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn enumerator_in(temp: &TempDir) -> FileEnumerator {
        FileEnumerator::new(EnumeratorOptions {
            cwd: Some(temp.path().to_path_buf()),
            resolver: CascadingResolverOptions {
                home_dir: Some(temp.path().join("__no_home__")),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn collect(
        enumerator: &FileEnumerator,
        patterns: impl Into<PatternList>,
    ) -> Result<Vec<FileAndConfig>> {
        enumerator.iterate_files(patterns).collect()
    }

    fn file_names(entries: &[FileAndConfig]) -> Vec<String> {
        entries
            .iter()
            .map(|e| {
                e.file_path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_extension_regex() {
        let regex = build_extension_regex(&[".js".to_string(), "jsx".to_string()]).unwrap();
        assert!(regex.is_match("a.js"));
        assert!(regex.is_match("a.jsx"));
        assert!(!regex.is_match("a.ts"));
        assert!(!regex.is_match("ajs"));
        assert!(build_extension_regex(&[]).is_err());
    }

    #[test]
    fn test_directory_walk_selects_by_extension() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("a.js"), "").unwrap();
        fs::write(temp.path().join("b.ts"), "").unwrap();
        let enumerator = enumerator_in(&temp);

        let entries = collect(&enumerator, ".").unwrap();
        assert_eq!(file_names(&entries), vec!["a.js"]);
    }

    #[test]
    fn test_glob_takes_precedence_over_literal_paths() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        // A directory whose name looks like a glob.
        let weird = temp.path().join("[lib]");
        fs::create_dir(&weird).unwrap();
        fs::write(weird.join("a.js"), "").unwrap();
        fs::write(temp.path().join("lib.js"), "").unwrap();
        let enumerator = enumerator_in(&temp);

        // "[lib]" is a character class matching "l", "i", or "b"; with
        // globbing on, the glob branch runs and matches nothing.
        let result = collect(&enumerator, "[lib].js");
        assert!(matches!(
            result.unwrap_err(),
            RelintError::NoFilesFound { .. }
        ));
    }

    #[test]
    fn test_glob_disabled_reports_hint_only_for_missing_literal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("a.js"), "").unwrap();
        let enumerator = FileEnumerator::new(EnumeratorOptions {
            cwd: Some(temp.path().to_path_buf()),
            glob_input_paths: false,
            resolver: CascadingResolverOptions {
                home_dir: Some(temp.path().join("__no_home__")),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

        let err = collect(&enumerator, "*.js").unwrap_err();
        match err {
            RelintError::NoFilesFound {
                pattern,
                glob_disabled,
            } => {
                assert_eq!(pattern, "*.js");
                assert!(glob_disabled);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The literal file exists, so the file branch wins.
        let entries = collect(&enumerator, "a.js").unwrap();
        assert_eq!(file_names(&entries), vec!["a.js"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_glob_disabled_literal_metacharacter_file_wins() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("b*.js"), "").unwrap();
        let enumerator = FileEnumerator::new(EnumeratorOptions {
            cwd: Some(temp.path().to_path_buf()),
            glob_input_paths: false,
            resolver: CascadingResolverOptions {
                home_dir: Some(temp.path().join("__no_home__")),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

        let entries = collect(&enumerator, "b*.js").unwrap();
        assert_eq!(file_names(&entries), vec!["b*.js"]);
    }

    #[test]
    fn test_missing_pattern_reports_no_files_found() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        let enumerator = enumerator_in(&temp);

        let err = collect(&enumerator, "missing.js").unwrap_err();
        match err {
            RelintError::NoFilesFound {
                pattern,
                glob_disabled,
            } => {
                assert_eq!(pattern, "missing.js");
                assert!(!glob_disabled);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_patterns_are_dropped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("a.js"), "").unwrap();
        let enumerator = enumerator_in(&temp);

        let entries = collect(&enumerator, vec!["", "a.js"]).unwrap();
        assert_eq!(file_names(&entries), vec!["a.js"]);
        // An empty pattern alone yields an empty, error-free sequence.
        let entries = collect(&enumerator, vec![""]).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_deduplication_across_patterns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("a.js"), "").unwrap();
        let enumerator = enumerator_in(&temp);

        let entries = collect(&enumerator, vec!["a.js", "a.js"]).unwrap();
        assert_eq!(entries.len(), 1);

        let once = collect(&enumerator, vec!["*.js"]).unwrap();
        let twice = collect(&enumerator, vec!["*.js", "*.js"]).unwrap();
        assert_eq!(file_names(&once), file_names(&twice));
    }

    #[test]
    fn test_iteration_halts_after_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".relintrc.json"), "{}").unwrap();
        fs::write(temp.path().join("a.js"), "").unwrap();
        let enumerator = enumerator_in(&temp);

        let mut iterator = enumerator.iterate_files(vec!["missing.js", "a.js"]);
        assert!(iterator.next().unwrap().is_err());
        assert!(iterator.next().is_none());
    }
}
