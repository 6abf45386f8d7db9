//! Test-root detection and test-setup file discovery.
//!
//! Both are heuristics, so every pattern lives in [`DiscoveryHeuristics`] and
//! can be replaced by the caller.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

use crate::fs::{is_in_node_modules, is_skipped_dir, is_source_file, normalize_path};

/// Project-relative globs and suffixes that drive the discovery heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryHeuristics {
    /// A root file matching any of these is treated as a test file.
    pub test_file_globs: Vec<String>,
    /// Conventional setup-file locations.
    pub setup_file_globs: Vec<String>,
    /// Test-runner config files scanned for `setupFiles`/`setupFilesAfterEnv`.
    pub runner_config_files: Vec<String>,
    /// File-name suffixes marking code-generation output.
    pub generated_suffixes: Vec<String>,
}

impl Default for DiscoveryHeuristics {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|item| item.to_string()).collect();
        Self {
            test_file_globs: strings(&[
                "**/*.{test,spec}.{ts,tsx,mts,cts,js,jsx,mjs,cjs}",
                "**/__tests__/**",
                "**/{test,tests}/**",
            ]),
            setup_file_globs: strings(&[
                "{setupTests,setup-tests,test-setup,testSetup,jest.setup,vitest.setup}.{ts,tsx,mts,cts,js,jsx}",
                "src/{setupTests,setup-tests,test-setup,testSetup}.{ts,tsx,mts,cts,js,jsx}",
                "{test,tests,__tests__,spec,src/test,src/tests,src/__tests__}/{setup,setupTests,setup-tests,test-setup,global-setup,globalSetup}.{ts,tsx,mts,cts,js,jsx}",
            ]),
            runner_config_files: strings(&[
                "jest.config.ts",
                "jest.config.js",
                "jest.config.mjs",
                "jest.config.cjs",
                "jest.config.json",
                "vitest.config.ts",
                "vitest.config.mts",
                "vitest.config.js",
                "vitest.config.mjs",
                "vite.config.ts",
                "vite.config.mts",
                "vite.config.js",
                "vite.config.mjs",
                "package.json",
            ]),
            generated_suffixes: strings(&[
                ".gen.ts",
                ".gen.tsx",
                ".generated.ts",
                ".generated.tsx",
                ".gen.d.ts",
                ".generated.d.ts",
            ]),
        }
    }
}

/// Heuristics with their globs compiled once per discovery run.
pub(crate) struct CompiledHeuristics<'a> {
    pub(crate) source: &'a DiscoveryHeuristics,
    test_files: GlobSet,
    setup_files: GlobSet,
}

impl<'a> CompiledHeuristics<'a> {
    pub(crate) fn new(source: &'a DiscoveryHeuristics) -> Result<Self> {
        Ok(Self {
            source,
            test_files: compile(&source.test_file_globs)?,
            setup_files: compile(&source.setup_file_globs)?,
        })
    }

    pub(crate) fn is_test_file(&self, project_dir: &Path, path: &Path) -> bool {
        self.test_files.is_match(relative_to(project_dir, path))
    }

    pub(crate) fn is_generated_file(&self, path: &Path) -> bool {
        let name = crate::fs::file_name(path);
        self.source
            .generated_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Setup files declared by test-runner configs plus files at
    /// conventional setup locations, sorted and de-duplicated.
    pub(crate) fn find_setup_files(&self, project_dir: &Path, allow_js: bool) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();

        for name in &self.source.runner_config_files {
            let config_path = project_dir.join(name);
            if !config_path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            let entries = if name.ends_with("package.json") {
                setup_entries_from_package_json(&text)
            } else {
                setup_entries_from_source(&text)
            };
            trace!(config = %config_path.display(), count = entries.len(), "runner config setup entries");
            found.extend(
                entries
                    .iter()
                    .filter_map(|entry| resolve_setup_entry(project_dir, entry)),
            );
        }

        for entry in WalkDir::new(project_dir)
            .max_depth(4)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(|entry| entry.ok())
        {
            if entry.file_type().is_file()
                && self
                    .setup_files
                    .is_match(relative_to(project_dir, entry.path()))
            {
                found.push(normalize_path(entry.path()));
            }
        }

        found.retain(|path| !is_in_node_modules(path) && is_source_file(path, allow_js));
        found.sort();
        found.dedup();
        Ok(found)
    }
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid heuristic glob '{pattern}'"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn relative_to<'p>(project_dir: &Path, path: &'p Path) -> &'p Path {
    path.strip_prefix(project_dir)
        .unwrap_or_else(|_| path.strip_prefix("/").unwrap_or(path))
}

static SETUP_ARRAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?setupFiles(?:AfterEnv)?["']?\s*:\s*\[([^\]]*)\]"#).expect("valid regex")
});
static SETUP_SINGLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?setupFiles(?:AfterEnv)?["']?\s*:\s*["'`]([^"'`]+)["'`]"#)
        .expect("valid regex")
});
static STRING_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'`]([^"'`]+)["'`]"#).expect("valid regex"));

/// `setupFiles` entries from a JS/TS/JSON runner config, read textually.
fn setup_entries_from_source(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for caps in SETUP_ARRAY_RE.captures_iter(text) {
        for literal in STRING_LITERAL_RE.captures_iter(&caps[1]) {
            entries.push(literal[1].to_string());
        }
    }
    for caps in SETUP_SINGLE_RE.captures_iter(text) {
        entries.push(caps[1].to_string());
    }
    entries
}

fn setup_entries_from_package_json(text: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return Vec::new();
    };
    let Some(jest) = value.get("jest") else {
        return Vec::new();
    };
    ["setupFiles", "setupFilesAfterEnv"]
        .iter()
        .filter_map(|key| jest.get(*key).and_then(|entry| entry.as_array()))
        .flatten()
        .filter_map(|entry| entry.as_str().map(str::to_string))
        .collect()
}

fn resolve_setup_entry(project_dir: &Path, entry: &str) -> Option<PathBuf> {
    let entry = entry.replace("<rootDir>", &project_dir.to_string_lossy());
    let path = if Path::new(&entry).is_absolute() {
        PathBuf::from(&entry)
    } else {
        project_dir.join(&entry)
    };
    let path = normalize_path(&path);
    if path.is_file() {
        return Some(path);
    }
    [".ts", ".tsx", ".mts", ".cts", ".js", ".jsx"]
        .iter()
        .map(|ext| PathBuf::from(format!("{}{ext}", path.display())))
        .find(|candidate| candidate.is_file())
}
