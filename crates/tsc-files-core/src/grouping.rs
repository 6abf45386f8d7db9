//! Binds input files to the tsconfig that governs them.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::{find_config_upward, resolve_config_path};
use crate::error::CheckError;
use crate::fs::{expand_patterns, is_glob_pattern};

/// Files that share one config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub config_path: PathBuf,
    /// Raw input patterns that contributed to this group.
    pub patterns: Vec<String>,
    /// Concrete absolute files, in input order.
    pub files: Vec<PathBuf>,
}

/// A pattern whose config could not be found or which could not be expanded.
#[derive(Debug)]
pub struct UnresolvedPattern {
    pub pattern: String,
    pub error: CheckError,
}

#[derive(Debug, Default)]
pub struct GroupingResult {
    pub groups: Vec<FileGroup>,
    pub unresolved: Vec<UnresolvedPattern>,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupingOptions<'a> {
    pub cwd: &'a Path,
    /// Explicit config: every file lands in one group.
    pub project: Option<&'a Path>,
}

/// Group raw input patterns by governing config.
///
/// Globs are expanded first and every matched file is bound to its own
/// nearest config, so a glob spanning several packages yields several
/// groups. Concrete paths search upward from their parent directory. Globs
/// matching nothing are recorded against the config governing `cwd`.
pub fn group_files(patterns: &[String], options: GroupingOptions<'_>) -> Result<GroupingResult, CheckError> {
    let mut groups: IndexMap<PathBuf, FileGroup> = IndexMap::new();
    let mut unresolved = Vec::new();

    let explicit = options
        .project
        .map(|project| resolve_config_path(options.cwd, Some(project)))
        .transpose()?;

    let mut lookups: FxHashMap<PathBuf, Option<PathBuf>> = FxHashMap::default();
    let mut config_for = |dir: &Path| -> Result<PathBuf, CheckError> {
        if let Some(path) = explicit.as_ref() {
            return Ok(path.clone());
        }
        let found = lookups
            .entry(dir.to_path_buf())
            .or_insert_with(|| find_config_upward(dir))
            .clone();
        found.ok_or_else(|| CheckError::ConfigNotFound {
            path: dir.to_path_buf(),
            searched_upward: true,
        })
    };

    for pattern in patterns {
        let (files, unmatched) = match expand_patterns(std::slice::from_ref(pattern), options.cwd) {
            Ok(expanded) => expanded,
            Err(error) => {
                unresolved.push(UnresolvedPattern {
                    pattern: pattern.clone(),
                    error,
                });
                continue;
            }
        };

        if !unmatched.is_empty() {
            debug!(pattern = %pattern, "glob matched no files");
            match config_for(options.cwd) {
                Ok(config_path) => {
                    entry(&mut groups, config_path, pattern);
                }
                Err(error) => unresolved.push(UnresolvedPattern {
                    pattern: pattern.clone(),
                    error,
                }),
            }
            continue;
        }

        for file in files {
            let dir = file.parent().unwrap_or(options.cwd);
            match config_for(dir) {
                Ok(config_path) => {
                    trace!(file = %file.display(), config = %config_path.display(), "bound file to config");
                    let group = entry(&mut groups, config_path, pattern);
                    if !group.files.contains(&file) {
                        group.files.push(file);
                    }
                }
                Err(error) => {
                    let pattern = if is_glob_pattern(pattern) {
                        file.display().to_string()
                    } else {
                        pattern.clone()
                    };
                    unresolved.push(UnresolvedPattern { pattern, error });
                }
            }
        }
    }

    Ok(GroupingResult {
        groups: groups.into_values().collect(),
        unresolved,
    })
}

fn entry<'g>(
    groups: &'g mut IndexMap<PathBuf, FileGroup>,
    config_path: PathBuf,
    pattern: &str,
) -> &'g mut FileGroup {
    let group = groups
        .entry(config_path.clone())
        .or_insert_with(|| FileGroup {
            config_path,
            patterns: Vec::new(),
            files: Vec::new(),
        });
    if !group.patterns.iter().any(|existing| existing == pattern) {
        group.patterns.push(pattern.to_string());
    }
    group
}
