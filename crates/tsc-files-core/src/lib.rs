//! Configuration synthesis and dependency-closure engine for `tsc-files`.
//!
//! Given an explicit list of files, this crate finds the tsconfig that governs
//! each of them, works out every source file the compiler needs to see for an
//! accurate check, writes a temporary self-contained tsconfig for exactly that
//! set and runs `tsgo` or `tsc` against it.
//!
//! The entry point is [`Engine::check_files`] (or the [`check_files`]
//! convenience wrapper).

/// Emit at `warn` level when the caller asked for verbose output and at
/// `debug` level otherwise.
macro_rules! verbose_warn {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::warn!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Same as `verbose_warn!` but at `info` level.
macro_rules! verbose_info {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

pub mod check;
pub mod closure;
pub mod compat;
pub mod config;
pub mod error;
pub mod exec;
pub mod fs;
pub mod grouping;
pub mod temp_config;
pub mod tracing_config;

pub use check::{
    CheckOptions, CheckResult, Engine, GroupError, GroupSummary, PROJECT_ENV_VAR, check_files,
};
pub use closure::{
    DependencyClosureEngine, DependencyClosureResult, DiscoveryHeuristics, DiscoveryLimits,
    DiscoveryRequest, NativeProgramHost, ProgramHost,
};
pub use compat::{CompatibilityResult, analyze};
pub use config::{ConfigLocator, ResolvedConfig};
pub use error::{CheckError, ExitCode};
pub use exec::{
    CompilerKind, CompilerPaths, CompilerSelection, Diagnostic, ExecutionOutcome, Severity,
};
pub use grouping::{FileGroup, GroupingResult, group_files};
pub use temp_config::{CleanupRegistry, FileSelection, TempConfigHandle};

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod config_tests;
#[cfg(test)]
#[path = "tests/closure_tests.rs"]
mod closure_tests;
#[cfg(test)]
#[path = "tests/grouping_tests.rs"]
mod grouping_tests;
#[cfg(test)]
#[path = "tests/temp_config_tests.rs"]
mod temp_config_tests;
#[cfg(test)]
#[path = "tests/exec_tests.rs"]
mod exec_tests;
#[cfg(test)]
#[path = "tests/check_tests.rs"]
mod check_tests;
#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
