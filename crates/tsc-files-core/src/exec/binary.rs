//! Compiler binary lookup and selection.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compat::CompatibilityResult;
use crate::error::CheckError;

/// Which of the two compilers runs a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// The native-speed `tsgo` compiler.
    Primary,
    /// The reference `tsc` compiler.
    Standard,
}

impl CompilerKind {
    pub fn binary_name(self) -> &'static str {
        match self {
            CompilerKind::Primary => "tsgo",
            CompilerKind::Standard => "tsc",
        }
    }
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Located compiler executables. `None` means not installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerPaths {
    pub primary: Option<PathBuf>,
    pub standard: Option<PathBuf>,
}

impl CompilerPaths {
    /// Look in `node_modules/.bin` from `project_dir` upward, then on `PATH`.
    pub fn locate(project_dir: &Path) -> Self {
        let paths = Self {
            primary: find_binary(project_dir, CompilerKind::Primary.binary_name()),
            standard: find_binary(project_dir, CompilerKind::Standard.binary_name()),
        };
        debug!(
            tsgo = ?paths.primary,
            tsc = ?paths.standard,
            "located compiler binaries"
        );
        paths
    }

    pub fn get(&self, kind: CompilerKind) -> Option<&Path> {
        match kind {
            CompilerKind::Primary => self.primary.as_deref(),
            CompilerKind::Standard => self.standard.as_deref(),
        }
    }

    /// Path of `kind`, or a system error naming the missing binary.
    pub fn require(&self, kind: CompilerKind) -> Result<&Path, CheckError> {
        self.get(kind).ok_or_else(|| CheckError::CompilerSystem {
            binary: kind.binary_name().to_string(),
            message: format!(
                "{} not found in node_modules/.bin or on PATH",
                kind.binary_name()
            ),
            output: String::new(),
        })
    }
}

fn find_binary(project_dir: &Path, name: &str) -> Option<PathBuf> {
    let file_names: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.cmd"), format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    for dir in project_dir.ancestors() {
        let bin_dir = dir.join("node_modules").join(".bin");
        if let Some(found) = file_names
            .iter()
            .map(|file_name| bin_dir.join(file_name))
            .find(|candidate| candidate.is_file())
        {
            return Some(found);
        }
    }
    which::which(name).ok()
}

/// The decision of which compiler to invoke for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSelection {
    pub kind: CompilerKind,
    pub reason: String,
    pub compatibility: Option<CompatibilityResult>,
}

/// Choose a compiler from the forced-selection flags, the compatibility
/// verdict and what is installed.
pub fn select_compiler(
    use_standard: bool,
    use_primary: bool,
    compatibility: &CompatibilityResult,
    paths: &CompilerPaths,
) -> Result<CompilerSelection, CheckError> {
    let selection = |kind, reason: String| CompilerSelection {
        kind,
        reason,
        compatibility: Some(compatibility.clone()),
    };

    match (use_standard, use_primary) {
        (true, true) => Err(CheckError::InvalidOptions(
            "--use-tsc and --use-tsgo cannot be combined".to_string(),
        )),
        (true, false) => Ok(selection(
            CompilerKind::Standard,
            "tsc forced by --use-tsc".to_string(),
        )),
        (false, true) => Ok(selection(
            CompilerKind::Primary,
            if compatibility.compatible {
                "tsgo forced by --use-tsgo".to_string()
            } else {
                format!(
                    "tsgo forced by --use-tsgo despite incompatible features: {}",
                    compatibility.incompatible_features.join(", ")
                )
            },
        )),
        (false, false) => {
            if paths.primary.is_none() {
                Ok(selection(
                    CompilerKind::Standard,
                    "tsgo not installed, using tsc".to_string(),
                ))
            } else if !compatibility.compatible {
                Ok(selection(
                    CompilerKind::Standard,
                    format!("using tsc: {}", compatibility.recommendation),
                ))
            } else {
                Ok(selection(
                    CompilerKind::Primary,
                    "tsgo installed and configuration compatible".to_string(),
                ))
            }
        }
    }
}
