use std::sync::Arc;
use tempfile::TempDir;

use tsc_files_core::CleanupRegistry;
use tsc_files_core::config::load_tsconfig;
use tsc_files_core::temp_config::{FileSelection, SynthesisOptions, synthesize};

use super::shutdown::{ShutdownSignal, sweep_on_signal};

#[test]
fn exit_codes_follow_the_shell_convention() {
    assert_eq!(ShutdownSignal::Hangup.exit_code(), 129);
    assert_eq!(ShutdownSignal::Interrupt.exit_code(), 130);
    assert_eq!(ShutdownSignal::Terminate.exit_code(), 143);
}

#[test]
fn termination_sweeps_live_temp_configs() {
    let dir = TempDir::new().unwrap();
    let tsconfig = dir.path().join("tsconfig.json");
    std::fs::write(&tsconfig, "{}").unwrap();
    let config = load_tsconfig(&tsconfig).unwrap();
    let registry = Arc::new(CleanupRegistry::new());
    let options = SynthesisOptions {
        cache_dir: Some(dir.path().join("cache")),
        ..SynthesisOptions::default()
    };

    let handle = synthesize(
        &config,
        &FileSelection::Exact(vec![dir.path().join("a.ts")]),
        Vec::new(),
        &options,
        &registry,
    )
    .unwrap();
    assert!(handle.path().exists());

    assert_eq!(sweep_on_signal(&registry, ShutdownSignal::Terminate), 143);
    assert!(!handle.path().exists());
    assert_eq!(registry.live_count(), 0);
    handle.cleanup();
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_is_delivered_to_the_listener() {
    use super::shutdown::ShutdownSignals;
    use std::time::Duration;

    let mut signals = ShutdownSignals::install().unwrap();
    let status = std::process::Command::new("kill")
        .arg("-TERM")
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());

    let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .expect("signal should arrive");
    assert_eq!(received, ShutdownSignal::Terminate);
}
