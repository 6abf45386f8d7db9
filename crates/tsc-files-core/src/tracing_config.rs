//! Tracing subscriber setup.
//!
//! Output format is chosen by `TSC_FILES_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented spans via `tracing-tree`, one block per config group
//! - `json`: one JSON object per event
//!
//! ```bash
//! TSC_FILES_LOG=debug tsc-files src/a.ts
//! TSC_FILES_LOG="tsc_files_core::closure=trace" TSC_FILES_LOG_FORMAT=tree tsc-files src/a.ts
//! ```
//!
//! Without `TSC_FILES_LOG` or `RUST_LOG` nothing is installed unless the
//! caller asked for verbose output, in which case `info` events from this
//! workspace are shown.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub const LOG_ENV_VAR: &str = "TSC_FILES_LOG";
pub const LOG_FORMAT_ENV_VAR: &str = "TSC_FILES_LOG_FORMAT";

const VERBOSE_FILTER: &str = "tsc_files_core=info,tsc_files_cli=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var(LOG_FORMAT_ENV_VAR).unwrap_or_default())
    }
}

/// `TSC_FILES_LOG`, then `RUST_LOG`, then the verbose default.
fn build_filter(verbose: bool) -> Option<EnvFilter> {
    if let Ok(value) = std::env::var(LOG_ENV_VAR) {
        return Some(EnvFilter::builder().parse_lossy(value));
    }
    if std::env::var("RUST_LOG").is_ok() {
        return Some(EnvFilter::from_default_env());
    }
    verbose.then(|| EnvFilter::new(VERBOSE_FILTER))
}

/// Install the global subscriber. Writes to stderr; a second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let Some(filter) = build_filter(verbose) else {
        return;
    };

    let installed = match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_writer(std::io::stderr)
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_targets(true);
            Registry::default().with(filter).with(tree_layer).try_init()
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).try_init()
        }
        LogFormat::Text => {
            let text_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(!verbose);
            Registry::default().with(filter).with(text_layer).try_init()
        }
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
