use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use super::{DependencyClosureResult, DiscoveryRequest};
use crate::config::{ResolvedConfig, modified_time};

/// Why a cached closure could not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    AmbientCountChanged { before: usize, after: usize },
    ConfigChanged,
    FilesModified,
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalidation::AmbientCountChanged { before, after } => {
                write!(f, "ambient declaration count changed ({before} -> {after})")
            }
            Invalidation::ConfigChanged => write!(f, "tsconfig changed"),
            Invalidation::FilesModified => write!(f, "file modification detected"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Lookup {
    Hit(DependencyClosureResult),
    Stale(Invalidation),
    Miss,
}

#[derive(Debug, Clone)]
struct Entry {
    config_stamp: u64,
    fingerprint: u64,
    ambient_count: usize,
    result: DependencyClosureResult,
}

/// Closure results keyed by [`cache_key`]; an entry is valid while its
/// config chain is unchanged, every file in it keeps its modification time
/// and the ambient file count is unchanged.
#[derive(Debug, Default)]
pub struct ClosureCache {
    entries: DashMap<String, Entry>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, key: &str, config_stamp: u64, ambient_count: usize) -> Lookup {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };
        if entry.config_stamp != config_stamp {
            return Lookup::Stale(Invalidation::ConfigChanged);
        }
        if entry.ambient_count != ambient_count {
            return Lookup::Stale(Invalidation::AmbientCountChanged {
                before: entry.ambient_count,
                after: ambient_count,
            });
        }
        if fingerprint(&entry.result.files) != entry.fingerprint {
            return Lookup::Stale(Invalidation::FilesModified);
        }
        Lookup::Hit(entry.result.clone())
    }

    pub(crate) fn store(&self, key: String, config_stamp: u64, result: DependencyClosureResult) {
        let entry = Entry {
            config_stamp,
            fingerprint: fingerprint(&result.files),
            ambient_count: result.ambient_count,
            result,
        };
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Stable key for a root-file set under one config, discovery limits and
/// heuristics.
pub(crate) fn cache_key(request: &DiscoveryRequest<'_>) -> String {
    let mut roots: Vec<&PathBuf> = request.root_files.iter().collect();
    roots.sort();
    roots.dedup();

    let mut hasher = FxHasher::default();
    request.config.config_path.hash(&mut hasher);
    roots.hash(&mut hasher);
    if let Some(include) = request.explicit_include {
        let mut include: Vec<&PathBuf> = include.iter().collect();
        include.sort();
        include.hash(&mut hasher);
    }
    request.limits.hash(&mut hasher);
    request.heuristics.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Content of a resolved config plus the modification time of every
/// document in its extends chain.
pub(crate) fn config_stamp(config: &ResolvedConfig) -> u64 {
    let mut hasher = FxHasher::default();
    for document in &config.chain {
        document.hash(&mut hasher);
        modified_time(document).hash(&mut hasher);
    }
    if let Ok(options) = serde_json::to_string(&config.compiler_options) {
        options.hash(&mut hasher);
    }
    config.include.hash(&mut hasher);
    config.exclude.hash(&mut hasher);
    config.files.hash(&mut hasher);
    config.references.hash(&mut hasher);
    hasher.finish()
}

fn fingerprint(files: &[PathBuf]) -> u64 {
    let mut hasher = FxHasher::default();
    for file in files {
        file.hash(&mut hasher);
        modified_time(file).hash(&mut hasher);
    }
    hasher.finish()
}
