use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tsc_files_core::CheckOptions;

/// CLI arguments for the tsc-files binary.
#[derive(Parser, Debug)]
#[command(
    name = "tsc-files",
    version,
    about = "Type-check specific TypeScript files against their project's tsconfig"
)]
pub struct CliArgs {
    /// Files or glob patterns to check.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<String>,

    /// Path to tsconfig.json or a directory containing it.
    /// Falls back to TSC_FILES_PROJECT.
    #[arg(short = 'p', long = "project")]
    pub project: Option<PathBuf>,

    /// Directory that relative files and the project path are resolved from.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Keep the project's emit settings instead of forcing noEmit.
    #[arg(long)]
    pub emit: bool,

    /// Skip type checking of declaration files.
    #[arg(long = "skipLibCheck", alias = "skip-lib-check")]
    pub skip_lib_check: bool,

    /// Directory for the temporary tsconfig files.
    #[arg(long = "cache-dir", alias = "cacheDir")]
    pub cache_dir: Option<PathBuf>,

    /// Always use tsc.
    #[arg(long = "use-tsc", conflicts_with = "use_tsgo")]
    pub use_tsc: bool,

    /// Always use tsgo.
    #[arg(long = "use-tsgo")]
    pub use_tsgo: bool,

    /// Do not retry with tsc when tsgo fails.
    #[arg(long = "no-fallback")]
    pub no_fallback: bool,

    /// Extra files to check; disables automatic import and setup-file discovery.
    #[arg(long, value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Compiler timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Log compiler selection, cache and discovery decisions.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Force colored output on or off (defaults to auto-detect).
    #[arg(long)]
    pub pretty: Option<bool>,
}

impl CliArgs {
    /// Check options for these arguments. Configuration and system errors
    /// come back inside the result so every group gets reported.
    pub fn to_options(&self) -> CheckOptions {
        CheckOptions {
            project: self.project.clone(),
            cwd: self.cwd.clone(),
            no_emit: !self.emit,
            skip_lib_check: self.skip_lib_check.then_some(true),
            cache_dir: self.cache_dir.clone(),
            use_standard_compiler: self.use_tsc,
            use_primary_compiler: self.use_tsgo,
            fallback: !self.no_fallback,
            include: self.include.clone(),
            verbose: self.verbose,
            throw_on_error: false,
            timeout: Duration::from_secs(self.timeout),
            ..CheckOptions::default()
        }
    }
}
