//! One walk over the project tree collecting files that import-chain
//! following cannot see: ambient declarations and code-generation output.

use std::path::{Path, PathBuf};

use crate::config::{ResolvedConfig, path_to_slash};
use crate::error::CheckError;
use crate::fs::{FileMatcher, is_declaration_file, walk_matching};

use super::setup::CompiledHeuristics;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ProjectScan {
    /// User-authored `.d.ts`/`.d.mts`/`.d.cts` files.
    pub(crate) ambient: Vec<PathBuf>,
    /// Non-declaration files carrying a generated-file suffix.
    pub(crate) generated: Vec<PathBuf>,
}

/// Scan the config directory and every referenced project directory,
/// honouring the config's `include` (or `**/*`) and `exclude` patterns.
pub(crate) fn scan_project(
    config: &ResolvedConfig,
    heuristics: &CompiledHeuristics<'_>,
) -> Result<ProjectScan, CheckError> {
    let mut include = config.include_patterns();
    if include.is_empty() {
        include.push(path_to_slash(&config.config_dir().join("**/*")));
    }
    let mut roots: Vec<PathBuf> = vec![config.config_dir().to_path_buf()];
    for reference in &config.references {
        if let Some(dir) = reference.parent() {
            include.push(path_to_slash(&dir.join("**/*")));
            roots.push(dir.to_path_buf());
        }
    }
    roots.sort();
    roots.dedup();
    // a referenced project nested under another root is already covered
    let roots: Vec<&Path> = roots
        .iter()
        .filter(|root| {
            !roots
                .iter()
                .any(|other| other != *root && root.starts_with(other))
        })
        .map(PathBuf::as_path)
        .collect();

    let include = FileMatcher::new(&include)?;
    let exclude = FileMatcher::new(&config.exclude_patterns())?;

    let mut scan = ProjectScan::default();
    for root in roots {
        let found = walk_matching(root, &include, &exclude, |path| {
            is_declaration_file(path) || heuristics.is_generated_file(path)
        });
        for path in found {
            if is_declaration_file(&path) {
                scan.ambient.push(path);
            } else {
                scan.generated.push(path);
            }
        }
    }
    scan.ambient.sort();
    scan.ambient.dedup();
    scan.generated.sort();
    scan.generated.dedup();
    Ok(scan)
}
