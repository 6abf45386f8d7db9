//! Compiler execution adapter: runs `tsgo`/`tsc` against a synthesized
//! config, classifies the outcome and retries with `tsc` when `tsgo` fails
//! for reasons unrelated to type errors.

mod binary;
mod output;

pub use binary::{CompilerKind, CompilerPaths, CompilerSelection, select_compiler};
pub use output::{Diagnostic, ParsedOutput, Severity, looks_like_diagnostics, parse_output};

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::CheckError;

/// Per-invocation wall-clock limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0 and no error diagnostics.
    Success,
    /// Diagnostics were reported; an ordinary check failure.
    TypeErrors,
    /// Non-zero exit with nothing parseable: missing binary, crash, bad project.
    SystemError { message: String },
    /// Non-zero exit, nothing parsed, but the output looks like diagnostics in
    /// a format the parser does not know.
    UnrecognizedOutput,
    TimedOut,
}

impl ExecutionOutcome {
    pub fn is_system_failure(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::SystemError { .. }
                | ExecutionOutcome::UnrecognizedOutput
                | ExecutionOutcome::TimedOut
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: ExecutionOutcome,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Combined stdout and stderr.
    pub raw_output: String,
    pub exit_code: Option<i32>,
    /// The compiler that produced this result.
    pub compiler: CompilerKind,
    pub selection_reason: String,
    pub duration: Duration,
}

impl ExecutionResult {
    /// The system error for a failed invocation, `None` for success or type
    /// errors.
    pub fn system_error(&self) -> Option<CheckError> {
        let message = match &self.outcome {
            ExecutionOutcome::Success | ExecutionOutcome::TypeErrors => return None,
            ExecutionOutcome::SystemError { message } => message.clone(),
            ExecutionOutcome::UnrecognizedOutput => {
                "exited with an error but its output could not be parsed".to_string()
            }
            ExecutionOutcome::TimedOut => "timed out and was terminated".to_string(),
        };
        Some(CheckError::CompilerSystem {
            binary: self.compiler.binary_name().to_string(),
            message,
            output: self.raw_output.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub config_path: &'a Path,
    pub working_dir: &'a Path,
    pub selection: &'a CompilerSelection,
    pub paths: &'a CompilerPaths,
    pub verbose: bool,
    /// Allow retrying with `tsc` after a `tsgo` system failure.
    pub fallback: bool,
    pub timeout: Duration,
}

/// Run the selected compiler, retrying once with `tsc` when allowed.
pub async fn execute(request: &ExecutionRequest<'_>) -> ExecutionResult {
    let selection = request.selection;
    let mut result = run_compiler(selection.kind, request).await;
    result.selection_reason = selection.reason.clone();

    if selection.kind == CompilerKind::Primary && should_fall_back(&result, request) {
        verbose_info!(
            request.verbose,
            outcome = ?result.outcome,
            output = %result.raw_output.trim(),
            "tsgo failed without diagnostics, retrying with tsc"
        );
        let mut retry = run_compiler(CompilerKind::Standard, request).await;
        retry.selection_reason = format!(
            "fallback to tsc after tsgo {} (initially: {})",
            describe_failure(&result.outcome),
            selection.reason
        );
        retry.duration += result.duration;
        return retry;
    }

    result
}

fn should_fall_back(result: &ExecutionResult, request: &ExecutionRequest<'_>) -> bool {
    if !request.fallback || request.paths.standard.is_none() {
        return false;
    }
    match result.outcome {
        ExecutionOutcome::SystemError { .. } => true,
        ExecutionOutcome::UnrecognizedOutput => request
            .selection
            .compatibility
            .as_ref()
            .is_some_and(|compat| !compat.compatible),
        _ => false,
    }
}

fn describe_failure(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::SystemError { message } => format!("failed: {message}"),
        ExecutionOutcome::UnrecognizedOutput => "produced unrecognized output".to_string(),
        ExecutionOutcome::TimedOut => "timed out".to_string(),
        ExecutionOutcome::Success | ExecutionOutcome::TypeErrors => "succeeded".to_string(),
    }
}

async fn run_compiler(kind: CompilerKind, request: &ExecutionRequest<'_>) -> ExecutionResult {
    let started = Instant::now();
    let mut result = ExecutionResult {
        outcome: ExecutionOutcome::Success,
        errors: Vec::new(),
        warnings: Vec::new(),
        raw_output: String::new(),
        exit_code: None,
        compiler: kind,
        selection_reason: String::new(),
        duration: Duration::ZERO,
    };

    let binary = match request.paths.require(kind) {
        Ok(binary) => binary,
        Err(err) => {
            result.outcome = ExecutionOutcome::SystemError {
                message: err.to_string(),
            };
            return result;
        }
    };

    let mut command = Command::new(binary);
    command
        .args(["--pretty", "false", "--project"])
        .arg(request.config_path)
        .current_dir(request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    debug!(
        binary = %binary.display(),
        project = %request.config_path.display(),
        "spawning compiler"
    );
    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            result.outcome = ExecutionOutcome::SystemError {
                message: format!("failed to start {}: {err}", binary.display()),
            };
            result.duration = started.elapsed();
            return result;
        }
    };
    let pid = child.id();

    let outcome = tokio::time::timeout(request.timeout, child.wait_with_output()).await;
    result.duration = started.elapsed();

    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            result.outcome = ExecutionOutcome::SystemError {
                message: format!("failed to wait for {}: {err}", binary.display()),
            };
            return result;
        }
        Err(_) => {
            // dropping the future already killed the direct child
            kill_process_group(pid);
            verbose_info!(
                request.verbose,
                binary = kind.binary_name(),
                timeout_secs = request.timeout.as_secs_f64(),
                "compiler timed out"
            );
            result.outcome = ExecutionOutcome::TimedOut;
            return result;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    result.raw_output = if stderr.trim().is_empty() {
        stdout.into_owned()
    } else {
        format!("{stdout}\n{stderr}")
    };
    result.exit_code = output.status.code();

    let parsed = parse_output(&result.raw_output);
    result.outcome = classify(output.status.success(), result.exit_code, &parsed, &result.raw_output);
    result.errors = parsed.errors;
    result.warnings = parsed.warnings;
    debug!(
        binary = kind.binary_name(),
        exit_code = ?result.exit_code,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        elapsed_ms = result.duration.as_millis() as u64,
        "compiler finished"
    );
    result
}

/// Map an exit status and parsed diagnostics onto an outcome.
pub fn classify(
    success: bool,
    exit_code: Option<i32>,
    parsed: &ParsedOutput,
    raw: &str,
) -> ExecutionOutcome {
    if !parsed.errors.is_empty() {
        return ExecutionOutcome::TypeErrors;
    }
    if success {
        return ExecutionOutcome::Success;
    }
    if !parsed.warnings.is_empty() {
        return ExecutionOutcome::TypeErrors;
    }
    if looks_like_diagnostics(raw) {
        return ExecutionOutcome::UnrecognizedOutput;
    }
    let detail = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string);
    let message = match (exit_code, detail) {
        (Some(code), Some(detail)) => format!("exited with code {code}: {detail}"),
        (Some(code), None) => format!("exited with code {code} without output"),
        (None, Some(detail)) => format!("terminated by signal: {detail}"),
        (None, None) => "terminated by signal".to_string(),
    };
    ExecutionOutcome::SystemError { message }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    #[allow(unsafe_code)]
    // SAFETY: killpg only sends a signal; the group was created for this child
    // by `process_group(0)` so no unrelated process is targeted.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
