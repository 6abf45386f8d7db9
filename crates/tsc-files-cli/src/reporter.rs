use colored::Colorize;
use std::path::Path;

use tsc_files_core::{CheckError, CheckResult, CompilerKind, Diagnostic, GroupError, Severity};

pub struct Reporter {
    color: bool,
    verbose: bool,
}

impl Reporter {
    pub fn new(color: bool, verbose: bool) -> Self {
        Reporter { color, verbose }
    }

    /// Everything printed after a run: diagnostics, group failures, setup
    /// files, the per-group compiler choice when verbose and a summary line.
    pub fn render(&self, result: &CheckResult) -> String {
        let mut lines = Vec::new();
        for diagnostic in result.errors.iter().chain(&result.warnings) {
            lines.push(self.format_diagnostic(diagnostic));
        }
        for failure in &result.group_errors {
            lines.push(self.format_group_error(failure));
        }

        if !result.included_setup_files.is_empty() {
            lines.push(self.dim("Included setup files:"));
            for file in &result.included_setup_files {
                lines.push(format!("  {}", file.display()));
            }
        }

        if self.verbose {
            for group in &result.groups {
                let discovery = if group.discovered {
                    format!("{} files", group.closure_size)
                } else {
                    "include patterns".to_string()
                };
                lines.push(self.dim(&format!(
                    "{}: {} ({}), {}",
                    group.config_path.display(),
                    self.format_compiler(group.compiler),
                    group.selection_reason,
                    discovery
                )));
            }
        }

        lines.push(self.summary(result));
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// `file(line,col): error TS2322: message`, the layout tsc prints with
    /// `--pretty false`.
    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let location = format!(
            "{}({},{})",
            diagnostic.file, diagnostic.line, diagnostic.column
        );
        let location = if self.color {
            location.cyan().to_string()
        } else {
            location
        };
        format!(
            "{}: {} {}: {}",
            location,
            self.format_severity(diagnostic.severity),
            self.format_code(&diagnostic.code),
            diagnostic.message
        )
    }

    pub fn format_error(&self, error: &CheckError) -> String {
        let label = if self.color {
            "error".red().bold().to_string()
        } else {
            "error".to_string()
        };
        let mut out = format!("{label}: {error}");
        if let CheckError::CompilerSystem { output, .. } = error {
            let output = output.trim();
            if !output.is_empty() {
                out.push('\n');
                out.push_str(output);
            }
        }
        out
    }

    fn format_group_error(&self, failure: &GroupError) -> String {
        let scope = match &failure.config_path {
            Some(config) => display_path(config),
            None => failure.patterns.join(", "),
        };
        format!("{} [{}]", self.format_error(&failure.error), scope)
    }

    fn summary(&self, result: &CheckResult) -> String {
        let millis = result.duration.as_millis();
        let files = plural(result.checked_files.len(), "file");
        if result.error_count > 0 {
            let message = format!(
                "Found {} in {} ({millis} ms).",
                plural(result.error_count, "error"),
                files
            );
            if self.color {
                message.red().bold().to_string()
            } else {
                message
            }
        } else if !result.group_errors.is_empty() {
            let message = format!(
                "Type check did not complete: {} failed.",
                plural(result.group_errors.len(), "group")
            );
            if self.color {
                message.red().bold().to_string()
            } else {
                message
            }
        } else if !result.success {
            // the compiler failed the run on warnings alone
            let message = format!(
                "Type check failed with {} and no errors in {files} ({millis} ms).",
                plural(result.warning_count, "warning")
            );
            if self.color {
                message.red().bold().to_string()
            } else {
                message
            }
        } else {
            let mut message = format!("No type errors in {files} ({millis} ms).");
            if result.warning_count > 0 {
                message = format!(
                    "No type errors in {files}, {} ({millis} ms).",
                    plural(result.warning_count, "warning")
                );
            }
            if self.color {
                message.green().to_string()
            } else {
                message
            }
        }
    }

    fn format_severity(&self, severity: Severity) -> String {
        let label = severity.to_string();
        if !self.color {
            return label;
        }
        match severity {
            Severity::Error => label.red().bold().to_string(),
            Severity::Warning => label.yellow().bold().to_string(),
        }
    }

    fn format_code(&self, code: &str) -> String {
        if self.color {
            code.bright_blue().to_string()
        } else {
            code.to_string()
        }
    }

    fn format_compiler(&self, compiler: CompilerKind) -> String {
        if self.color {
            compiler.binary_name().bold().to_string()
        } else {
            compiler.binary_name().to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
