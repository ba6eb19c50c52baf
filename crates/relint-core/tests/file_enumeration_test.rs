//! Integration tests for file enumeration over real directory trees

use std::fs;
use std::path::Path;

use relint_core::{
    CascadingResolverOptions, ConfigArray, EnumeratorOptions, FileAndConfig, FileEnumerator,
    PatternList, RelintError,
};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn enumerator(root: &Path, configure: impl FnOnce(&mut EnumeratorOptions)) -> FileEnumerator {
    let mut options = EnumeratorOptions {
        cwd: Some(root.to_path_buf()),
        resolver: CascadingResolverOptions {
            // Tests must not observe the developer's real home directory.
            home_dir: Some(root.join("__no_home__")),
            ..Default::default()
        },
        ..Default::default()
    };
    configure(&mut options);
    FileEnumerator::new(options).unwrap()
}

fn collect(
    enumerator: &FileEnumerator,
    patterns: impl Into<PatternList>,
) -> Result<Vec<FileAndConfig>, RelintError> {
    enumerator.iterate_files(patterns).collect()
}

fn relative_paths(root: &Path, entries: &[FileAndConfig]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            entry
                .file_path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn test_simple_glob_shares_one_config_instance() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        ".relintrc.json",
        r#"{ "rules": { "no-undef": "error", "no-unused-vars": "error" } }"#,
    );
    write(root, "lib/one.js", "");
    write(root, "lib/two.js", "");

    let enumerator = enumerator(root, |_| {});
    let entries = collect(&enumerator, "lib/*.js").unwrap();

    assert_eq!(
        relative_paths(root, &entries),
        vec!["lib/one.js", "lib/two.js"]
    );
    assert!(ConfigArray::same_instance(
        &entries[0].config,
        &entries[1].config
    ));
    assert_eq!(entries[0].config.len(), 1);
    let element = entries[0].config.get(0).unwrap();
    assert_eq!(
        element.file_path.as_deref(),
        Some(root.join(".relintrc.json").as_path())
    );
    assert!(entries.iter().all(|entry| !entry.ignored));
}

#[test]
fn test_cascading_walk_with_nested_config_and_ignore_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        ".relintrc.json",
        r#"{ "rules": { "no-undef": "error" } }"#,
    );
    write(root, ".relintignore", "/lib/nested/parser.js\n");
    write(root, "lib/one.js", "");
    write(root, "lib/two.js", "");
    write(root, "lib/nested/.relintrc.yml", "parser: './parser'\n");
    write(root, "lib/nested/one.js", "");
    write(root, "lib/nested/two.js", "");
    write(root, "lib/nested/parser.js", "");

    let enumerator = enumerator(root, |_| {});
    let entries = collect(&enumerator, "lib/**/*.js").unwrap();

    // parser.js is silently ignored; nested entries come first because
    // the walk descends in listing order.
    assert_eq!(
        relative_paths(root, &entries),
        vec![
            "lib/nested/one.js",
            "lib/nested/two.js",
            "lib/one.js",
            "lib/two.js"
        ]
    );

    let nested = &entries[0].config;
    assert!(ConfigArray::same_instance(nested, &entries[1].config));
    assert_eq!(nested.len(), 2);
    let yaml_element = nested.get(1).unwrap();
    assert_eq!(
        yaml_element.file_path.as_deref(),
        Some(root.join("lib/nested/.relintrc.yml").as_path())
    );
    let parser = yaml_element.parser.as_ref().unwrap();
    assert_eq!(
        parser.file_path.as_deref(),
        Some(root.join("lib/nested/parser.js").as_path())
    );

    let outer = &entries[2].config;
    assert!(ConfigArray::same_instance(outer, &entries[3].config));
    assert_eq!(outer.len(), 1);
    assert!(!ConfigArray::same_instance(nested, outer));
}

#[test]
fn test_directly_named_ignored_file_is_reported() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "glob-util/ignored/foo.js", "");

    let enumerator = enumerator(root, |options| {
        options.ignore_patterns = vec!["foo.js".to_string()];
    });
    let entries = collect(&enumerator, "glob-util/ignored/foo.js").unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ignored);
}

#[test]
fn test_directly_named_file_with_ignore_disabled() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "glob-util/ignored/foo.js", "");

    let enumerator = enumerator(root, |options| {
        options.ignore = false;
        options.ignore_patterns = vec!["foo.js".to_string()];
    });
    let entries = collect(&enumerator, "glob-util/ignored/foo.js").unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].ignored);
}

#[test]
fn test_dotfiles_are_pruned_unless_named() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "glob-util/hidden/.foo.js", "");

    let enumerator = enumerator(root, |_| {});

    // A plain glob only finds the dotfile in ignored form.
    let err = collect(&enumerator, "glob-util/hidden/**/*.js").unwrap_err();
    match err {
        RelintError::AllFilesIgnored { pattern } => {
            assert_eq!(pattern, "glob-util/hidden/**/*.js")
        }
        other => panic!("unexpected error: {other}"),
    }

    // A dotfile glob selects the with-dotfiles predicate.
    let entries = collect(&enumerator, "glob-util/hidden/**/.*.js").unwrap();
    assert_eq!(relative_paths(root, &entries), vec!["glob-util/hidden/.foo.js"]);
    assert!(!entries[0].ignored);

    // Naming the file directly reports it as ignored.
    let entries = collect(&enumerator, "glob-util/hidden/.foo.js").unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ignored);
}

#[test]
fn test_all_files_ignored_via_ignore_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, ".relintignore", "/build\n");
    write(root, "build/out.js", "");

    let enumerator = enumerator(root, |_| {});
    let err = collect(&enumerator, "build/*.js").unwrap_err();
    assert!(matches!(err, RelintError::AllFilesIgnored { .. }));
}

#[test]
fn test_no_files_found_aborts_the_whole_call() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "lib/one.js", "");

    let enumerator = enumerator(root, |_| {});
    let mut iterator = enumerator.iterate_files(vec!["lib/*.js", "missing/*.js", "lib/one.js"]);

    // The first pattern still yields.
    assert!(iterator.next().unwrap().is_ok());
    // The second fails, and nothing follows.
    assert!(iterator.next().unwrap().is_err());
    assert!(iterator.next().is_none());
}

#[test]
fn test_duplicate_patterns_yield_once() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "lib/one.js", "");
    write(root, "lib/two.js", "");

    let enumerator = enumerator(root, |_| {});
    let once = collect(&enumerator, "lib/*.js").unwrap();
    let twice = collect(&enumerator, vec!["lib/*.js", "lib/*.js"]).unwrap();
    assert_eq!(relative_paths(root, &once), relative_paths(root, &twice));
}

#[test]
fn test_empty_pattern_does_not_affect_the_outcome() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "lib/one.js", "");

    let enumerator = enumerator(root, |_| {});
    let plain = collect(&enumerator, "lib/*.js").unwrap();
    let with_empty = collect(&enumerator, vec!["", "lib/*.js"]).unwrap();
    assert_eq!(relative_paths(root, &plain), relative_paths(root, &with_empty));
}

#[test]
fn test_walk_prunes_ignored_directories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "src/app.js", "");
    write(root, "node_modules/dep/index.js", "");

    let enumerator = enumerator(root, |_| {});
    let entries = collect(&enumerator, ".").unwrap();
    assert_eq!(relative_paths(root, &entries), vec!["src/app.js"]);
}

#[test]
fn test_enumerated_and_queried_configs_share_identity() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, ".relintrc.json", "{}");
    write(root, "lib/one.js", "");

    let enumerator = enumerator(root, |_| {});
    let entries = collect(&enumerator, "lib/*.js").unwrap();
    let queried = enumerator
        .config_array_for_file(Some(Path::new("lib/one.js")))
        .unwrap();
    assert!(ConfigArray::same_instance(&entries[0].config, &queried));
}
