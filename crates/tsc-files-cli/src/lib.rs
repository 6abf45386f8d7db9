//! Command-line boundary for `tsc-files`: argument parsing, reporting and
//! signal-driven temp-config cleanup on top of `tsc_files_core`.

pub mod args;
pub mod reporter;
pub mod shutdown;

#[cfg(test)]
#[path = "tests/args_tests.rs"]
mod args_tests;
#[cfg(test)]
#[path = "tests/reporter_tests.rs"]
mod reporter_tests;
#[cfg(test)]
#[path = "tests/shutdown_tests.rs"]
mod shutdown_tests;
