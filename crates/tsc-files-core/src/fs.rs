//! File-system helpers: glob matching, pattern expansion and source-file
//! classification.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::CheckError;

/// Extensions the compiler treats as TypeScript sources.
pub const TS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts"];
/// Extensions loaded only under `allowJs`.
pub const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".mjs", ".cjs"];
/// Ambient declaration file suffixes.
pub const DECLARATION_SUFFIXES: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

/// Lexically normalize a path, dropping `.` and resolving `..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Normal(_) | Component::Prefix(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }

    normalized
}

/// Absolute, normalized form of `path` relative to `cwd`.
pub fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&cwd.join(path))
    }
}

pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

pub fn is_declaration_file(path: &Path) -> bool {
    let name = file_name(path);
    DECLARATION_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Whether the compiler would accept `path` as a source file.
pub fn is_source_file(path: &Path, allow_js: bool) -> bool {
    let name = file_name(path);
    TS_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        || (allow_js && JS_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

pub fn is_in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == "node_modules")
}

pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

/// Directory entries skipped by every project walk.
pub(crate) fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "node_modules" || name.starts_with('.')
}

/// Compiled include/exclude globs in tsconfig semantics: a pattern without an
/// extension or wildcard in its last segment also matches everything below it.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    set: GlobSet,
    empty: bool,
}

impl FileMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, CheckError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            for expanded in expand_directory_pattern(pattern) {
                builder.add(build_glob(&expanded)?);
            }
        }
        let set = builder
            .build()
            .map_err(|err| CheckError::InvalidOptions(format!("invalid glob pattern: {err}")))?;
        Ok(Self {
            set,
            empty: patterns.is_empty(),
        })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        !self.empty && self.set.is_match(path)
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

fn build_glob(pattern: &str) -> Result<Glob, CheckError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|err| CheckError::InvalidOptions(format!("invalid glob pattern '{pattern}': {err}")))
}

fn expand_directory_pattern(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim_end_matches('/');
    let last = pattern.rsplit('/').next().unwrap_or(pattern);
    if last.contains('.') || last.contains('*') {
        vec![pattern.to_string()]
    } else {
        vec![pattern.to_string(), format!("{pattern}/**/*")]
    }
}

/// Expand raw input patterns into concrete absolute files.
///
/// Concrete paths are kept even when they do not exist so the compiler can
/// report them. Glob patterns are matched against a walk of `cwd` that skips
/// `node_modules` and hidden directories. Returns the expanded files in input
/// order plus the glob patterns that matched nothing.
pub fn expand_patterns(
    patterns: &[String],
    cwd: &Path,
) -> Result<(Vec<PathBuf>, Vec<String>), CheckError> {
    let mut files = Vec::new();
    let mut unmatched = Vec::new();
    let mut seen = rustc_hash::FxHashSet::default();

    for pattern in patterns {
        if !is_glob_pattern(pattern) {
            let path = absolutize(cwd, Path::new(pattern));
            if seen.insert(path.clone()) {
                files.push(path);
            }
            continue;
        }

        let absolute = if Path::new(pattern).is_absolute() {
            pattern.replace('\\', "/")
        } else {
            crate::config::path_to_slash(&cwd.join(pattern))
        };
        let glob = build_glob(&crate::config::path_to_slash(&normalize_path(Path::new(
            &absolute,
        ))))?
        .compile_matcher();

        let walk_root = glob_walk_root(&absolute);
        let mut matched = Vec::new();
        for entry in WalkDir::new(&walk_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() && glob.is_match(entry.path()) {
                matched.push(normalize_path(entry.path()));
            }
        }
        matched.sort();

        if matched.is_empty() {
            unmatched.push(pattern.clone());
        }
        for path in matched {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    Ok((files, unmatched))
}

/// The longest literal directory prefix of a glob.
fn glob_walk_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for segment in pattern.split('/') {
        if is_glob_pattern(segment) {
            break;
        }
        if segment.is_empty() {
            if root.as_os_str().is_empty() {
                root.push("/");
            }
            continue;
        }
        root.push(segment);
    }
    if root.is_file() {
        root.pop();
    }
    root
}

/// Files under `root` that match `include`, are not excluded and satisfy `accept`.
pub fn walk_matching(
    root: &Path,
    include: &FileMatcher,
    exclude: &FileMatcher,
    accept: impl Fn(&Path) -> bool,
) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry) && !exclude.is_match(entry.path()))
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if include.is_match(path) && accept(path) {
            found.push(normalize_path(path));
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_resolves_dots() {
        assert_eq!(
            normalize_path(Path::new("/proj/./src/../lib/a.ts")),
            PathBuf::from("/proj/lib/a.ts")
        );
    }

    #[test]
    fn detects_globs() {
        assert!(is_glob_pattern("src/**/*.ts"));
        assert!(is_glob_pattern("src/{a,b}.ts"));
        assert!(!is_glob_pattern("src/index.ts"));
    }

    #[test]
    fn classifies_source_files() {
        assert!(is_source_file(Path::new("a.ts"), false));
        assert!(is_source_file(Path::new("a.d.ts"), false));
        assert!(!is_source_file(Path::new("a.js"), false));
        assert!(is_source_file(Path::new("a.js"), true));
        assert!(!is_source_file(Path::new("a.json"), true));
        assert!(is_declaration_file(Path::new("/p/global.d.ts")));
        assert!(!is_declaration_file(Path::new("/p/global.ts")));
    }

    #[test]
    fn directory_patterns_match_descendants() {
        let matcher = FileMatcher::new(&["/proj/src".to_string()]).unwrap();
        assert!(matcher.is_match(Path::new("/proj/src/a/b.ts")));
        assert!(!matcher.is_match(Path::new("/proj/lib/b.ts")));

        let matcher = FileMatcher::new(&["/proj/src/*.ts".to_string()]).unwrap();
        assert!(matcher.is_match(Path::new("/proj/src/b.ts")));
        assert!(!matcher.is_match(Path::new("/proj/src/nested/b.ts")));
    }

    #[test]
    fn walk_root_stops_at_first_wildcard() {
        assert_eq!(
            glob_walk_root("/proj/packages/*/src/**/*.ts"),
            PathBuf::from("/proj/packages")
        );
    }

    #[test]
    fn expands_globs_and_keeps_concrete_paths() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/a.ts"), "").unwrap();
        std::fs::write(root.join("src/nested/b.ts"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/c.ts"), "").unwrap();

        let (files, unmatched) = expand_patterns(
            &[
                "**/*.ts".to_string(),
                "missing.ts".to_string(),
                "*.vue".to_string(),
            ],
            root,
        )
        .unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("src/a.ts"),
                PathBuf::from("src/nested/b.ts"),
                PathBuf::from("missing.ts"),
            ]
        );
        assert_eq!(unmatched, vec!["*.vue".to_string()]);
    }
}
