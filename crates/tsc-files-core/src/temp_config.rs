//! Temporary tsconfig synthesis.
//!
//! The synthesized document is self-contained: no `extends`, flattened
//! `compilerOptions`, and every path-bearing value absolute, so it can live in
//! a cache directory far away from the original config.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::config::{ResolvedConfig, path_to_slash};
use crate::error::CheckError;
use crate::fs::{is_in_node_modules, normalize_path};

/// Files the synthesized config should list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// A fully discovered closure: emitted as `files`.
    Exact(Vec<PathBuf>),
    /// Discovery failed: the config's own include patterns plus the root files.
    Patterns {
        include: Vec<String>,
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Force `noEmit: true`.
    pub no_emit: bool,
    /// Overrides the config's `skipLibCheck` when set.
    pub skip_lib_check: Option<bool>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            no_emit: true,
            skip_lib_check: None,
            cache_dir: None,
        }
    }
}

/// Build the temporary tsconfig document.
pub fn build_temp_config(
    config: &ResolvedConfig,
    selection: &FileSelection,
    options: &SynthesisOptions,
    original_config_dir: &Path,
) -> Value {
    let mut compiler_options = match serde_json::to_value(&config.compiler_options) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    if options.no_emit {
        compiler_options.insert("noEmit".into(), Value::Bool(true));
        compiler_options.remove("emitDeclarationOnly");
    }
    if let Some(skip) = options.skip_lib_check {
        compiler_options.insert("skipLibCheck".into(), Value::Bool(skip));
    }

    if let Some(paths) = config.compiler_options.paths.as_ref() {
        let anchor = config
            .compiler_options
            .base_url
            .as_deref()
            .map(PathBuf::from)
            .or_else(|| config.paths_base_dir.clone())
            .unwrap_or_else(|| original_config_dir.to_path_buf());
        let mut rewritten = Map::new();
        for (pattern, targets) in paths {
            let targets = targets
                .iter()
                .map(|target| Value::String(rewrite_path_target(&anchor, target)))
                .collect();
            rewritten.insert(pattern.clone(), Value::Array(targets));
        }
        compiler_options.insert("paths".into(), Value::Object(rewritten));
    }

    if !config.is_bundler_resolution() && config.compiler_options.base_url.is_none() {
        compiler_options.insert(
            "baseUrl".into(),
            Value::String(path_to_slash(original_config_dir)),
        );
    }

    if config.compiler_options.type_roots.is_none() {
        compiler_options.insert(
            "typeRoots".into(),
            json!([path_to_slash(&original_config_dir.join("node_modules/@types"))]),
        );
    }

    let mut document = Map::new();
    document.insert("compilerOptions".into(), Value::Object(compiler_options));

    match selection {
        FileSelection::Exact(files) => {
            document.insert("files".into(), slash_array(files));
        }
        FileSelection::Patterns { include, files } => {
            document.insert("files".into(), slash_array(files));
            document.insert("include".into(), json!(include));
            document.insert("exclude".into(), json!(config.exclude_patterns()));
        }
    }

    if !config.references.is_empty() {
        let references: Vec<Value> = config
            .references
            .iter()
            .map(|reference| json!({ "path": path_to_slash(reference) }))
            .collect();
        document.insert("references".into(), Value::Array(references));
    }

    Value::Object(document)
}

/// Anchor a relative `paths` target; absolute targets and targets inside
/// `node_modules` are kept verbatim.
fn rewrite_path_target(anchor: &Path, target: &str) -> String {
    let normalized = target.trim().replace('\\', "/");
    if Path::new(&normalized).is_absolute() || is_in_node_modules(Path::new(&normalized)) {
        return target.to_string();
    }
    path_to_slash(&normalize_path(&anchor.join(normalized)))
}

fn slash_array(files: &[PathBuf]) -> Value {
    Value::Array(
        files
            .iter()
            .map(|file| Value::String(path_to_slash(file)))
            .collect(),
    )
}

/// Default location for temp configs: `<projectDir>/node_modules/.cache/tsc-files`.
pub fn default_cache_dir(project_dir: &Path) -> PathBuf {
    project_dir.join("node_modules").join(".cache").join("tsc-files")
}

fn prepare_cache_dir(project_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, CheckError> {
    if let Some(dir) = explicit {
        std::fs::create_dir_all(dir).map_err(|source| CheckError::TempFile {
            path: dir.to_path_buf(),
            source,
        })?;
        return Ok(dir.to_path_buf());
    }

    let dir = default_cache_dir(project_dir);
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Ok(dir),
        Err(err) => {
            let fallback = std::env::temp_dir();
            debug!(
                dir = %dir.display(),
                fallback = %fallback.display(),
                error = %err,
                "default cache dir unavailable"
            );
            Ok(fallback)
        }
    }
}

/// Write the temporary tsconfig for one group.
pub fn synthesize(
    config: &ResolvedConfig,
    selection: &FileSelection,
    setup_files: Vec<PathBuf>,
    options: &SynthesisOptions,
    registry: &Arc<CleanupRegistry>,
) -> Result<TempConfigHandle, CheckError> {
    let original_config_dir = config.config_dir();
    let document = build_temp_config(config, selection, options, original_config_dir);
    let dir = prepare_cache_dir(original_config_dir, options.cache_dir.as_deref())?;
    let temp_error = |source| CheckError::TempFile {
        path: dir.clone(),
        source,
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix("tsconfig.").suffix(".json");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o600));
    }
    let mut file = builder.tempfile_in(&dir).map_err(temp_error)?;

    let bytes = serde_json::to_vec_pretty(&document).map_err(|err| temp_error(err.into()))?;
    file.write_all(&bytes).map_err(temp_error)?;
    file.flush().map_err(temp_error)?;

    let temp_path = file.into_temp_path();
    let path = temp_path.to_path_buf();
    registry.register(&path);
    debug!(path = %path.display(), "wrote temporary tsconfig");

    Ok(TempConfigHandle {
        path,
        setup_files,
        file: Mutex::new(Some(temp_path)),
        registry: Arc::clone(registry),
    })
}

/// A synthesized config on disk. Deleted by [`TempConfigHandle::cleanup`] or
/// on drop, whichever comes first.
#[derive(Debug)]
pub struct TempConfigHandle {
    path: PathBuf,
    setup_files: Vec<PathBuf>,
    file: Mutex<Option<TempPath>>,
    registry: Arc<CleanupRegistry>,
}

impl TempConfigHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn setup_files(&self) -> &[PathBuf] {
        &self.setup_files
    }

    /// Delete the file. Later calls, and calls after the file was removed
    /// externally, are no-ops. Failures are logged, not returned.
    pub fn cleanup(&self) {
        let taken = self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(temp_path) = taken else {
            return;
        };
        self.registry.unregister(&self.path);
        match temp_path.close() {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary tsconfig"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove temporary tsconfig"
            ),
        }
    }
}

impl Drop for TempConfigHandle {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Live temp configs, swept on process termination.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    live: Mutex<FxHashSet<PathBuf>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, path: &Path) {
        self.lock().insert(path.to_path_buf());
    }

    fn unregister(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    /// Remove every registered file. Returns how many were deleted.
    pub fn sweep(&self) -> usize {
        let paths: Vec<PathBuf> = self.lock().drain().collect();
        let mut removed = 0;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to sweep temporary tsconfig"),
            }
        }
        if removed > 0 {
            debug!(removed, "swept temporary tsconfigs");
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashSet<PathBuf>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
