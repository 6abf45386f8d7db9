#![allow(clippy::print_stderr)]

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;

use tsc_files_cli::args::CliArgs;
use tsc_files_cli::reporter::Reporter;
use tsc_files_cli::shutdown::{ShutdownSignals, sweep_on_signal};
use tsc_files_core::Engine;
use tsc_files_core::tracing_config::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    // TSC_FILES_LOG / RUST_LOG take precedence over --verbose.
    init_tracing(args.verbose);

    let engine = Engine::new();
    let registry = engine.cleanup_registry();
    match ShutdownSignals::install() {
        Ok(mut signals) => {
            tokio::spawn(async move {
                let signal = signals.recv().await;
                std::process::exit(sweep_on_signal(&registry, signal));
            });
        }
        Err(err) => tracing::warn!(error = %err, "failed to install signal handlers"),
    }

    let color = args
        .pretty
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    let reporter = Reporter::new(color, args.verbose);

    let code = match engine.check_files(&args.files, &args.to_options()).await {
        Ok(result) => {
            print!("{}", reporter.render(&result));
            result.exit_code().code()
        }
        Err(err) => {
            eprintln!("{}", reporter.format_error(&err));
            err.exit_code().code()
        }
    };

    engine.cleanup_registry().sweep();
    std::process::exit(code);
}
