//! Dependency closure engine.
//!
//! Works out every source file the compiler has to see to type-check a set of
//! root files accurately: the compiler's own program graph, the full
//! import chain (including `require`), user-authored ambient declarations,
//! generated files reached through type-only imports and, for test roots,
//! test-setup files. Results are cached per root set and config.

mod cache;
pub mod imports;
pub mod resolver;
mod scan;
mod setup;

pub use cache::{ClosureCache, Invalidation};
pub use setup::DiscoveryHeuristics;

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::{ResolvedConfig, path_to_slash};
use crate::fs::{is_in_node_modules, normalize_path};
use crate::temp_config::FileSelection;
use cache::{Lookup, cache_key, config_stamp};
use imports::{ImportKind, scan_imports};
use resolver::{ModuleResolver, Resolution};
use setup::CompiledHeuristics;

/// Bounds on import-chain traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveryLimits {
    /// Maximum import hops from a root file.
    pub max_depth: usize,
    /// Maximum number of files in the traversal.
    pub max_files: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_depth: 50,
            max_files: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitHit {
    Depth(usize),
    Files(usize),
}

impl fmt::Display for LimitHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitHit::Depth(limit) => write!(f, "max depth ({limit})"),
            LimitHit::Files(limit) => write!(f, "max file count ({limit})"),
        }
    }
}

/// Source of the baseline program: the files the compiler itself would load
/// for the root files under a config.
pub trait ProgramHost: fmt::Debug + Send + Sync {
    fn program_files(
        &self,
        config: &ResolvedConfig,
        root_files: &[PathBuf],
        limits: &DiscoveryLimits,
    ) -> Result<Vec<PathBuf>>;
}

/// Builds the baseline program by following the edges the compiler follows
/// from TypeScript roots (everything except `require`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProgramHost;

impl ProgramHost for NativeProgramHost {
    fn program_files(
        &self,
        config: &ResolvedConfig,
        root_files: &[PathBuf],
        limits: &DiscoveryLimits,
    ) -> Result<Vec<PathBuf>> {
        let resolver = ModuleResolver::new(config);
        let walk = walk_import_graph(&resolver, root_files, limits, ImportKind::followed_by_compiler)?;
        if let Some(limit) = walk.limit {
            debug!(%limit, "baseline program walk stopped early");
        }
        Ok(walk.files)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyClosureResult {
    /// Absolute files to check, sorted.
    pub files: Vec<PathBuf>,
    /// `false` when discovery failed and `include_patterns` must be used.
    pub discovered: bool,
    pub cache_key: String,
    /// Test-setup files that were auto-included.
    pub setup_files: Vec<PathBuf>,
    /// The config's own include patterns, used when `discovered` is false.
    pub include_patterns: Vec<String>,
    pub ambient_count: usize,
}

impl DependencyClosureResult {
    /// What the synthesized config should list.
    pub fn selection(&self, root_files: &[PathBuf]) -> FileSelection {
        if self.discovered {
            FileSelection::Exact(self.files.clone())
        } else {
            FileSelection::Patterns {
                include: self.include_patterns.clone(),
                files: root_files.to_vec(),
            }
        }
    }
}

/// Inputs to one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryRequest<'a> {
    pub config: &'a ResolvedConfig,
    pub root_files: &'a [PathBuf],
    pub project_dir: &'a Path,
    pub verbose: bool,
    /// Caller-chosen extra files; disables import-chain and setup heuristics.
    pub explicit_include: Option<&'a [PathBuf]>,
    pub limits: DiscoveryLimits,
    pub heuristics: &'a DiscoveryHeuristics,
}

#[derive(Debug, Default)]
pub struct DependencyClosureEngine {
    cache: ClosureCache,
}

impl DependencyClosureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ClosureCache {
        &self.cache
    }

    /// Compute the closure for `request`. Never fails: discovery errors
    /// degrade to a `discovered: false` result.
    pub fn discover(&self, host: &dyn ProgramHost, request: &DiscoveryRequest<'_>) -> DependencyClosureResult {
        let key = cache_key(request);
        match self.try_discover(host, request, &key) {
            Ok(result) => result,
            Err(err) => {
                verbose_warn!(
                    request.verbose,
                    config = %request.config.config_path.display(),
                    error = %format!("{err:#}"),
                    "dependency discovery failed, falling back to include patterns"
                );
                DependencyClosureResult {
                    files: request.root_files.to_vec(),
                    discovered: false,
                    cache_key: key,
                    setup_files: Vec::new(),
                    include_patterns: fallback_include(request.config),
                    ambient_count: 0,
                }
            }
        }
    }

    fn try_discover(
        &self,
        host: &dyn ProgramHost,
        request: &DiscoveryRequest<'_>,
        key: &str,
    ) -> Result<DependencyClosureResult> {
        let config = request.config;
        let heuristics = CompiledHeuristics::new(request.heuristics)?;
        let scan = scan::scan_project(config, &heuristics)
            .context("failed to scan project for ambient declarations")?;

        let stamp = config_stamp(config);
        match self.cache.lookup(key, stamp, scan.ambient.len()) {
            Lookup::Hit(result) => {
                verbose_info!(request.verbose, key, files = result.files.len(), "closure cache hit");
                return Ok(result);
            }
            Lookup::Stale(reason) => {
                verbose_info!(request.verbose, key, %reason, "closure cache invalidated");
            }
            Lookup::Miss => debug!(key, "closure cache miss"),
        }

        let resolver = ModuleResolver::new(config);
        let mut files: BTreeSet<PathBuf> = request.root_files.iter().cloned().collect();

        let baseline = host
            .program_files(config, request.root_files, &request.limits)
            .context("failed to build baseline program")?;
        debug!(count = baseline.len(), "baseline program files");
        files.extend(baseline);

        match request.explicit_include {
            Some(include) => files.extend(include.iter().map(|path| normalize_path(path))),
            None => {
                let walk = walk_import_graph(&resolver, request.root_files, &request.limits, |_| true)?;
                if let Some(limit) = walk.limit {
                    verbose_warn!(
                        request.verbose,
                        %limit,
                        discovered = walk.files.len(),
                        "import discovery limit reached, closure may be incomplete"
                    );
                }
                files.extend(walk.files);
            }
        }

        files.extend(scan.ambient.iter().cloned());

        if !scan.generated.is_empty() {
            let generated: FxHashSet<&PathBuf> = scan.generated.iter().collect();
            let extra = type_only_generated_imports(&resolver, &files, &generated)?;
            trace!(count = extra.len(), "generated files reached through type-only imports");
            files.extend(extra);
        }

        let mut setup_files = Vec::new();
        if request.explicit_include.is_none()
            && request
                .root_files
                .iter()
                .any(|root| heuristics.is_test_file(request.project_dir, root))
        {
            setup_files = heuristics.find_setup_files(request.project_dir, config.allow_js())?;
            if !setup_files.is_empty() {
                verbose_info!(request.verbose, count = setup_files.len(), "auto-included test setup files");
            }
            files.extend(setup_files.iter().cloned());
        }

        files.retain(|path| !is_in_node_modules(path));
        let result = DependencyClosureResult {
            files: files.into_iter().collect(),
            discovered: true,
            cache_key: key.to_string(),
            setup_files,
            include_patterns: fallback_include(config),
            ambient_count: scan.ambient.len(),
        };
        verbose_info!(
            request.verbose,
            roots = request.root_files.len(),
            files = result.files.len(),
            ambient = result.ambient_count,
            "dependency closure discovered"
        );
        self.cache.store(key.to_string(), stamp, result.clone());
        Ok(result)
    }
}

fn fallback_include(config: &ResolvedConfig) -> Vec<String> {
    let include = config.include_patterns();
    if include.is_empty() {
        vec![path_to_slash(&config.config_dir().join("**/*"))]
    } else {
        include
    }
}

#[derive(Debug, Default)]
struct GraphWalk {
    files: Vec<PathBuf>,
    limit: Option<LimitHit>,
}

/// Breadth-first walk over import edges accepted by `follow`.
fn walk_import_graph(
    resolver: &ModuleResolver,
    roots: &[PathBuf],
    limits: &DiscoveryLimits,
    follow: impl Fn(ImportKind) -> bool,
) -> Result<GraphWalk> {
    let mut visited: FxHashSet<PathBuf> = FxHashSet::default();
    let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
    let mut walk = GraphWalk::default();

    for root in roots {
        if visited.insert(root.clone()) {
            queue.push_back((root.clone(), 0));
        }
    }

    while let Some((file, depth)) = queue.pop_front() {
        if !file.is_file() {
            continue;
        }
        let source = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;

        for import in scan_imports(&source) {
            if !follow(import.kind) {
                continue;
            }
            let Resolution::File(target) = resolver.resolve(&file, &import.specifier) else {
                continue;
            };
            if visited.contains(&target) {
                continue;
            }
            // only an unvisited edge beyond the limit makes the walk incomplete
            if depth >= limits.max_depth {
                walk.limit.get_or_insert(LimitHit::Depth(limits.max_depth));
                break;
            }
            if visited.len() >= limits.max_files {
                walk.limit.get_or_insert(LimitHit::Files(limits.max_files));
                break;
            }
            visited.insert(target.clone());
            queue.push_back((target, depth + 1));
        }
    }

    walk.files = visited.into_iter().collect();
    walk.files.sort();
    Ok(walk)
}

/// Generated files named by `import type` in any of `files`.
fn type_only_generated_imports(
    resolver: &ModuleResolver,
    files: &BTreeSet<PathBuf>,
    generated: &FxHashSet<&PathBuf>,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for file in files {
        if !file.is_file() {
            continue;
        }
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        for import in scan_imports(&source) {
            if import.kind != ImportKind::TypeOnly {
                continue;
            }
            if let Resolution::File(target) = resolver.resolve(file, &import.specifier)
                && generated.contains(&target)
                && !files.contains(&target)
            {
                found.push(target);
            }
        }
    }
    Ok(found)
}
