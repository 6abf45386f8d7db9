use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process exit codes the CLI maps check outcomes onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    TypeErrors = 1,
    ConfigError = 2,
    SystemError = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Unrecoverable failures of a check run.
///
/// Type errors reported by the compiler are not errors here; they are data in
/// [`crate::CheckResult`]. Dependency-discovery failures are not errors either:
/// the closure engine degrades to pattern-based inclusion instead.
#[derive(Debug, Error)]
pub enum CheckError {
    /// No tsconfig was found walking upward, or an explicit path does not exist.
    #[error("{}", not_found_message(.path, .searched_upward))]
    ConfigNotFound { path: PathBuf, searched_upward: bool },

    /// The tsconfig (or a document in its `extends` chain) is not valid JSONC.
    #[error("failed to parse tsconfig {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("circular tsconfig extends: {}", format_chain(.chain))]
    CircularExtends { chain: Vec<PathBuf> },

    /// Contradictory or malformed check options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The compiler could not produce diagnostics at all (missing binary,
    /// crash, timeout, unrecognised output).
    #[error("{binary} failed: {message}")]
    CompilerSystem {
        binary: String,
        message: String,
        output: String,
    },

    /// The temporary tsconfig could not be written.
    #[error("failed to write temporary tsconfig in {}: {source}", .path.display())]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CheckError::ConfigNotFound { .. }
                | CheckError::ConfigParse { .. }
                | CheckError::CircularExtends { .. }
                | CheckError::InvalidOptions(_)
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_config_error() {
            ExitCode::ConfigError
        } else {
            ExitCode::SystemError
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CheckError::Io {
            context: context.into(),
            source,
        }
    }
}

fn not_found_message(path: &Path, searched_upward: &bool) -> String {
    if *searched_upward {
        format!(
            "no tsconfig.json found in {} or any parent directory (pass --project to point at one explicitly)",
            path.display()
        )
    } else {
        format!(
            "tsconfig not found at {} (check the --project path)",
            path.display()
        )
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
