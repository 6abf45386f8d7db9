//! `check_files`: group, discover, synthesize and run, one task per config.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info_span, Instrument};

use crate::closure::{
    DependencyClosureEngine, DiscoveryHeuristics, DiscoveryLimits, DiscoveryRequest,
    NativeProgramHost, ProgramHost,
};
use crate::compat::analyze;
use crate::config::ConfigLocator;
use crate::error::{CheckError, ExitCode};
use crate::exec::{
    CompilerKind, CompilerPaths, CompilerSelection, DEFAULT_TIMEOUT, Diagnostic, ExecutionOutcome,
    ExecutionRequest, execute, select_compiler,
};
use crate::fs::{absolutize, expand_patterns, is_source_file};
use crate::grouping::{FileGroup, GroupingOptions, group_files};
use crate::temp_config::{CleanupRegistry, SynthesisOptions, TempConfigHandle, synthesize};

/// Overrides `project` when the option is not set.
pub const PROJECT_ENV_VAR: &str = "TSC_FILES_PROJECT";

#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Explicit tsconfig (file or directory), relative to `cwd`.
    pub project: Option<PathBuf>,
    /// Defaults to the process working directory.
    pub cwd: Option<PathBuf>,
    pub no_emit: bool,
    pub skip_lib_check: Option<bool>,
    pub cache_dir: Option<PathBuf>,
    /// Force `tsc`.
    pub use_standard_compiler: bool,
    /// Force `tsgo`.
    pub use_primary_compiler: bool,
    /// Retry with `tsc` when `tsgo` fails without diagnostics.
    pub fallback: bool,
    /// Extra files to check; disables import-chain and setup-file discovery.
    pub include: Option<Vec<String>>,
    pub verbose: bool,
    /// Return `Err` for configuration and system errors instead of a failed
    /// result.
    pub throw_on_error: bool,
    pub timeout: Duration,
    pub discovery_limits: DiscoveryLimits,
    pub heuristics: DiscoveryHeuristics,
    /// Pre-located compilers; looked up per project when `None`.
    pub compilers: Option<CompilerPaths>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            project: None,
            cwd: None,
            no_emit: true,
            skip_lib_check: None,
            cache_dir: None,
            use_standard_compiler: false,
            use_primary_compiler: false,
            fallback: true,
            include: None,
            verbose: false,
            throw_on_error: true,
            timeout: DEFAULT_TIMEOUT,
            discovery_limits: DiscoveryLimits::default(),
            heuristics: DiscoveryHeuristics::default(),
            compilers: None,
        }
    }
}

impl CheckOptions {
    pub fn validate(&self) -> Result<(), CheckError> {
        if self.use_standard_compiler && self.use_primary_compiler {
            return Err(CheckError::InvalidOptions(
                "--use-tsc and --use-tsgo cannot be combined".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(CheckError::InvalidOptions(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `project`, or `TSC_FILES_PROJECT` when unset.
    pub fn effective_project(&self) -> Option<PathBuf> {
        self.project.clone().or_else(|| {
            std::env::var_os(PROJECT_ENV_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }

    fn synthesis(&self) -> SynthesisOptions {
        SynthesisOptions {
            no_emit: self.no_emit,
            skip_lib_check: self.skip_lib_check,
            cache_dir: self.cache_dir.clone(),
        }
    }
}

/// A group that could not be checked.
#[derive(Debug)]
pub struct GroupError {
    /// `None` when no config could be found.
    pub config_path: Option<PathBuf>,
    pub patterns: Vec<String>,
    pub error: CheckError,
}

/// How one group was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub config_path: PathBuf,
    pub compiler: CompilerKind,
    pub selection_reason: String,
    pub closure_size: usize,
    pub discovered: bool,
}

#[derive(Debug)]
pub struct CheckResult {
    pub success: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub duration: Duration,
    /// The requested files that were handed to a compiler.
    pub checked_files: Vec<PathBuf>,
    pub included_setup_files: Vec<PathBuf>,
    pub groups: Vec<GroupSummary>,
    /// Groups that failed with a configuration or system error. Only
    /// populated when `throw_on_error` is false.
    pub group_errors: Vec<GroupError>,
}

impl CheckResult {
    /// Configuration errors outrank system errors, which outrank type errors.
    pub fn exit_code(&self) -> ExitCode {
        if self
            .group_errors
            .iter()
            .any(|group| group.error.is_config_error())
        {
            ExitCode::ConfigError
        } else if !self.group_errors.is_empty() {
            ExitCode::SystemError
        } else if self.success {
            ExitCode::Success
        } else {
            ExitCode::TypeErrors
        }
    }
}

/// Checks files with caches and a cleanup registry shared across calls.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    configs: ConfigLocator,
    closures: DependencyClosureEngine,
    cleanup: Arc<CleanupRegistry>,
    host: Arc<dyn ProgramHost>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_program_host(Arc::new(NativeProgramHost))
    }

    pub fn with_program_host(host: Arc<dyn ProgramHost>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                configs: ConfigLocator::new(),
                closures: DependencyClosureEngine::new(),
                cleanup: Arc::new(CleanupRegistry::new()),
                host,
            }),
        }
    }

    pub fn cleanup_registry(&self) -> Arc<CleanupRegistry> {
        Arc::clone(&self.inner.cleanup)
    }

    pub fn config_locator(&self) -> &ConfigLocator {
        &self.inner.configs
    }

    pub fn closure_engine(&self) -> &DependencyClosureEngine {
        &self.inner.closures
    }

    /// Type-check `patterns` (files or globs).
    pub async fn check_files(
        &self,
        patterns: &[String],
        options: &CheckOptions,
    ) -> Result<CheckResult, CheckError> {
        let started = Instant::now();
        options.validate()?;
        if patterns.is_empty() {
            return Err(CheckError::InvalidOptions("no files to check".to_string()));
        }

        let cwd = match options.cwd.clone() {
            Some(cwd) => absolutize(&current_dir()?, &cwd),
            None => current_dir()?,
        };
        let project = options.effective_project();

        let grouping = {
            let patterns = patterns.to_vec();
            let cwd = cwd.clone();
            let project = project.clone();
            run_blocking(move || {
                group_files(
                    &patterns,
                    GroupingOptions {
                        cwd: &cwd,
                        project: project.as_deref(),
                    },
                )
            })
            .await
        };

        let grouping = match grouping {
            Ok(grouping) => grouping,
            Err(error) if options.throw_on_error => return Err(error),
            Err(error) => {
                let failure = GroupError {
                    config_path: None,
                    patterns: patterns.to_vec(),
                    error,
                };
                return Ok(CheckResult::with_errors(vec![failure], started.elapsed()));
            }
        };
        debug!(
            groups = grouping.groups.len(),
            unresolved = grouping.unresolved.len(),
            "grouped input files"
        );

        let options = Arc::new(options.clone());
        let cwd = Arc::new(cwd);
        let mut tasks = JoinSet::new();
        for (index, group) in grouping.groups.into_iter().enumerate() {
            let engine = self.clone();
            let options = Arc::clone(&options);
            let cwd = Arc::clone(&cwd);
            let span = info_span!("group", config = %group.config_path.display());
            tasks.spawn(
                async move {
                    let config_path = group.config_path.clone();
                    let patterns = group.patterns.clone();
                    let outcome = engine.check_group(group, &options, &cwd).await;
                    (index, config_path, patterns, outcome)
                }
                .instrument(span),
            );
        }

        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => finished.push(done),
                Err(err) => {
                    return Err(CheckError::io(
                        "group task failed",
                        std::io::Error::other(err.to_string()),
                    ));
                }
            }
        }
        finished.sort_by_key(|(index, ..)| *index);

        let mut result = CheckResult::with_errors(Vec::new(), Duration::ZERO);
        for (_, config_path, patterns, outcome) in finished {
            match outcome {
                Ok(Some(group)) => result.absorb(group),
                Ok(None) => {}
                Err(error) => result.group_errors.push(GroupError {
                    config_path: Some(config_path),
                    patterns,
                    error,
                }),
            }
        }
        for unresolved in grouping.unresolved {
            result.group_errors.push(GroupError {
                config_path: None,
                patterns: vec![unresolved.pattern],
                error: unresolved.error,
            });
        }

        if options.throw_on_error && !result.group_errors.is_empty() {
            let first = result.group_errors.remove(0);
            return Err(first.error);
        }

        result.error_count = result.errors.len();
        result.warning_count = result.warnings.len();
        result.success = result.success && result.group_errors.is_empty() && result.error_count == 0;
        result.included_setup_files.sort();
        result.included_setup_files.dedup();
        result.duration = started.elapsed();
        verbose_info!(
            options.verbose,
            errors = result.error_count,
            warnings = result.warning_count,
            files = result.checked_files.len(),
            elapsed_ms = result.duration.as_millis() as u64,
            "check finished"
        );
        Ok(result)
    }

    /// Locate, analyze, discover, synthesize and execute for one group.
    /// `Ok(None)` when the group holds no checkable files.
    async fn check_group(
        &self,
        group: FileGroup,
        options: &Arc<CheckOptions>,
        cwd: &Arc<PathBuf>,
    ) -> Result<Option<GroupOutput>, CheckError> {
        let prepared = {
            let engine = self.clone();
            let options = Arc::clone(options);
            let cwd = Arc::clone(cwd);
            run_blocking(move || engine.prepare_group(group, &options, &cwd)).await?
        };
        let Some(prepared) = prepared else {
            return Ok(None);
        };

        let execution = execute(&ExecutionRequest {
            config_path: prepared.handle.path(),
            working_dir: cwd.as_path(),
            selection: &prepared.selection,
            paths: &prepared.compilers,
            verbose: options.verbose,
            fallback: options.fallback,
            timeout: options.timeout,
        })
        .await;
        prepared.handle.cleanup();

        if let Some(error) = execution.system_error() {
            return Err(error);
        }
        verbose_info!(
            options.verbose,
            compiler = execution.compiler.binary_name(),
            reason = %execution.selection_reason,
            errors = execution.errors.len(),
            "group checked"
        );

        Ok(Some(GroupOutput {
            summary: GroupSummary {
                config_path: prepared.config_path,
                compiler: execution.compiler,
                selection_reason: execution.selection_reason,
                closure_size: prepared.closure_size,
                discovered: prepared.discovered,
            },
            success: execution.outcome == ExecutionOutcome::Success,
            errors: execution.errors,
            warnings: execution.warnings,
            root_files: prepared.root_files,
            setup_files: prepared.handle.setup_files().to_vec(),
        }))
    }

    fn prepare_group(
        &self,
        group: FileGroup,
        options: &CheckOptions,
        cwd: &Path,
    ) -> Result<Option<PreparedGroup>, CheckError> {
        let config = self.inner.configs.load(&group.config_path)?;
        let project_dir = config.config_dir().to_path_buf();

        let allow_js = config.allow_js();
        let (root_files, skipped): (Vec<PathBuf>, Vec<PathBuf>) = group
            .files
            .into_iter()
            .partition(|file| is_source_file(file, allow_js));
        if !skipped.is_empty() {
            debug!(count = skipped.len(), "skipping files the compiler would not accept");
        }
        if root_files.is_empty() {
            verbose_warn!(
                options.verbose,
                config = %config.config_path.display(),
                patterns = ?group.patterns,
                "no checkable files in group"
            );
            return Ok(None);
        }

        let compatibility = analyze(&config);
        verbose_info!(
            options.verbose,
            compatible = compatibility.compatible,
            features = ?compatibility.incompatible_features,
            "compatibility analysis"
        );
        let compilers = match options.compilers.clone() {
            Some(compilers) => compilers,
            None => CompilerPaths::locate(&project_dir),
        };
        let selection: CompilerSelection = select_compiler(
            options.use_standard_compiler,
            options.use_primary_compiler,
            &compatibility,
            &compilers,
        )?;
        verbose_info!(
            options.verbose,
            compiler = selection.kind.binary_name(),
            reason = %selection.reason,
            "selected compiler"
        );

        let explicit_include = match options.include.as_deref() {
            Some(include) => Some(expand_patterns(include, cwd)?.0),
            None => None,
        };
        let closure = self.inner.closures.discover(
            self.inner.host.as_ref(),
            &DiscoveryRequest {
                config: &config,
                root_files: &root_files,
                project_dir: &project_dir,
                verbose: options.verbose,
                explicit_include: explicit_include.as_deref(),
                limits: options.discovery_limits,
                heuristics: &options.heuristics,
            },
        );

        let handle = synthesize(
            &config,
            &closure.selection(&root_files),
            closure.setup_files.clone(),
            &options.synthesis(),
            &self.inner.cleanup,
        )?;

        Ok(Some(PreparedGroup {
            config_path: config.config_path.clone(),
            handle,
            selection,
            compilers,
            root_files,
            closure_size: closure.files.len(),
            discovered: closure.discovered,
        }))
    }
}

/// Check `patterns` with a fresh [`Engine`].
pub async fn check_files(patterns: &[String], options: &CheckOptions) -> Result<CheckResult, CheckError> {
    Engine::new().check_files(patterns, options).await
}

struct PreparedGroup {
    config_path: PathBuf,
    handle: TempConfigHandle,
    selection: CompilerSelection,
    compilers: CompilerPaths,
    root_files: Vec<PathBuf>,
    closure_size: usize,
    discovered: bool,
}

struct GroupOutput {
    summary: GroupSummary,
    success: bool,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    root_files: Vec<PathBuf>,
    setup_files: Vec<PathBuf>,
}

impl CheckResult {
    fn with_errors(group_errors: Vec<GroupError>, duration: Duration) -> Self {
        Self {
            success: group_errors.is_empty(),
            error_count: 0,
            warning_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration,
            checked_files: Vec::new(),
            included_setup_files: Vec::new(),
            groups: Vec::new(),
            group_errors,
        }
    }

    fn absorb(&mut self, group: GroupOutput) {
        self.success &= group.success;
        self.errors.extend(group.errors);
        self.warnings.extend(group.warnings);
        self.checked_files.extend(group.root_files);
        self.included_setup_files.extend(group.setup_files);
        self.groups.push(group.summary);
    }
}

fn current_dir() -> Result<PathBuf, CheckError> {
    std::env::current_dir().map_err(|err| CheckError::io("failed to read current directory", err))
}

async fn run_blocking<T, F>(work: F) -> Result<T, CheckError>
where
    F: FnOnce() -> Result<T, CheckError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => Err(CheckError::io(
            "blocking task failed",
            std::io::Error::other(err.to_string()),
        )),
    }
}
