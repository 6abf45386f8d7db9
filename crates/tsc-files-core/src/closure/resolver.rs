//! Module specifier resolution against `paths`, `baseUrl` and the file system.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ResolvedConfig;
use crate::fs::{is_in_node_modules, normalize_path};

static TS_EXTENSION_CANDIDATES: [&str; 7] =
    [".ts", ".tsx", ".d.ts", ".mts", ".cts", ".d.mts", ".d.cts"];
static JS_EXTENSION_CANDIDATES: [&str; 4] = [".js", ".jsx", ".mjs", ".cjs"];
static TS_SOURCE_SUFFIXES: [&str; 4] = [".ts", ".tsx", ".mts", ".cts"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A user-authored file on disk.
    File(PathBuf),
    /// A third-party package (or a file inside `node_modules`); never followed.
    External,
    Unresolved,
}

#[derive(Debug, Clone)]
pub(crate) struct PathMapping {
    pub(crate) pattern: String,
    pub(crate) prefix: String,
    pub(crate) suffix: String,
    pub(crate) targets: Vec<String>,
}

impl PathMapping {
    pub(crate) fn match_specifier(&self, specifier: &str) -> Option<String> {
        if !self.pattern.contains('*') {
            return if self.pattern == specifier {
                Some(String::new())
            } else {
                None
            };
        }

        if !specifier.starts_with(&self.prefix) || !specifier.ends_with(&self.suffix) {
            return None;
        }

        let start = self.prefix.len();
        let end = specifier.len().saturating_sub(self.suffix.len());
        if end < start {
            return None;
        }

        Some(specifier[start..end].to_string())
    }

    pub(crate) fn specificity(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }
}

/// Resolver configured from a [`ResolvedConfig`].
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    base_url: Option<PathBuf>,
    paths_anchor: PathBuf,
    paths: Vec<PathMapping>,
    allow_js: bool,
}

impl ModuleResolver {
    pub fn new(config: &ResolvedConfig) -> Self {
        let paths = config
            .compiler_options
            .paths
            .as_ref()
            .map(|paths| build_path_mappings(paths.iter()))
            .unwrap_or_default();

        Self {
            base_url: config
                .compiler_options
                .base_url
                .as_deref()
                .map(PathBuf::from),
            paths_anchor: config.paths_anchor(),
            paths,
            allow_js: config.allow_js(),
        }
    }

    /// Resolve `specifier` as imported from `from_file`.
    pub fn resolve(&self, from_file: &Path, specifier: &str) -> Resolution {
        let specifier = specifier.trim().replace('\\', "/");
        if specifier.is_empty() {
            return Resolution::Unresolved;
        }
        // package.json "imports" subpaths always belong to a package boundary
        if specifier.starts_with('#') {
            return Resolution::External;
        }

        let from_dir = from_file.parent().unwrap_or_else(|| Path::new("/"));

        if Path::new(&specifier).is_absolute() {
            return self.first_existing(&PathBuf::from(&specifier));
        }

        if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == ".."
        {
            return self.first_existing(&from_dir.join(&specifier));
        }

        if let Some((mapping, wildcard)) = select_path_mapping(&self.paths, &specifier) {
            for target in &mapping.targets {
                let substituted = substitute_path_target(target, &wildcard);
                let path = if Path::new(&substituted).is_absolute() {
                    PathBuf::from(substituted)
                } else {
                    self.paths_anchor.join(substituted)
                };
                if let Resolution::File(found) = self.first_existing(&path) {
                    return Resolution::File(found);
                }
            }
        }

        if let Some(base_url) = self.base_url.as_ref()
            && let Resolution::File(found) = self.first_existing(&base_url.join(&specifier))
        {
            return Resolution::File(found);
        }

        Resolution::External
    }

    fn first_existing(&self, path: &Path) -> Resolution {
        for candidate in self.candidates(path) {
            if candidate.is_file() {
                if is_in_node_modules(&candidate) {
                    return Resolution::External;
                }
                return Resolution::File(candidate);
            }
        }
        Resolution::Unresolved
    }

    fn candidates(&self, path: &Path) -> Vec<PathBuf> {
        let base = normalize_path(path);
        let name = base.to_string_lossy().into_owned();
        let mut candidates = Vec::new();

        if TS_SOURCE_SUFFIXES.iter().any(|ext| name.ends_with(ext)) {
            candidates.push(base.clone());
        } else if let Some(rewritten) = js_extension_substitution(&name) {
            candidates.extend(rewritten);
            if self.allow_js {
                candidates.push(base.clone());
            }
        }

        for ext in self.extensions() {
            candidates.push(append_extension(&base, ext));
        }
        for ext in self.extensions() {
            candidates.push(append_extension(&base.join("index"), ext));
        }
        candidates
    }

    fn extensions(&self) -> impl Iterator<Item = &'static str> {
        let js: &[&'static str] = if self.allow_js {
            &JS_EXTENSION_CANDIDATES
        } else {
            &[]
        };
        TS_EXTENSION_CANDIDATES.iter().chain(js.iter()).copied()
    }
}

/// `./a.js` in TypeScript source refers to `./a.ts` (or `.tsx`, `.d.ts`).
fn js_extension_substitution(name: &str) -> Option<Vec<PathBuf>> {
    let (stem, replacements): (&str, &[&str]) = if let Some(stem) = name.strip_suffix(".js") {
        (stem, &[".ts", ".tsx", ".d.ts"])
    } else if let Some(stem) = name.strip_suffix(".jsx") {
        (stem, &[".tsx", ".d.ts"])
    } else if let Some(stem) = name.strip_suffix(".mjs") {
        (stem, &[".mts", ".d.mts"])
    } else if let Some(stem) = name.strip_suffix(".cjs") {
        (stem, &[".cts", ".d.cts"])
    } else {
        return None;
    };

    Some(
        replacements
            .iter()
            .map(|ext| PathBuf::from(format!("{stem}{ext}")))
            .collect(),
    )
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(ext);
    PathBuf::from(raw)
}

pub(crate) fn build_path_mappings<'a>(
    paths: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
) -> Vec<PathMapping> {
    let mut mappings = Vec::new();
    for (pattern, targets) in paths {
        if targets.is_empty() {
            continue;
        }
        let pattern = normalize_path_pattern(pattern);
        let targets = targets
            .iter()
            .map(|target| normalize_path_pattern(target))
            .collect();
        let (prefix, suffix) = split_path_pattern(&pattern);
        mappings.push(PathMapping {
            pattern,
            prefix,
            suffix,
            targets,
        });
    }
    mappings.sort_by(|left, right| {
        right
            .specificity()
            .cmp(&left.specificity())
            .then_with(|| right.pattern.len().cmp(&left.pattern.len()))
            .then_with(|| left.pattern.cmp(&right.pattern))
    });
    mappings
}

fn select_path_mapping<'a>(
    mappings: &'a [PathMapping],
    specifier: &str,
) -> Option<(&'a PathMapping, String)> {
    // mappings are pre-sorted by specificity, so the first match wins
    mappings.iter().find_map(|mapping| {
        mapping
            .match_specifier(specifier)
            .map(|wildcard| (mapping, wildcard))
    })
}

fn substitute_path_target(target: &str, wildcard: &str) -> String {
    if target.contains('*') {
        target.replace('*', wildcard)
    } else {
        target.to_string()
    }
}

fn normalize_path_pattern(value: &str) -> String {
    value.trim().replace('\\', "/")
}

fn split_path_pattern(pattern: &str) -> (String, String) {
    match pattern.find('*') {
        Some(star_idx) => {
            let (prefix, rest) = pattern.split_at(star_idx);
            (prefix.to_string(), rest[1..].to_string())
        }
        None => (pattern.to_string(), String::new()),
    }
}
