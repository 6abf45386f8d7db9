//! Temp-config sweep on process-termination signals.

use std::io;
use tsc_files_core::CleanupRegistry;

/// Termination signals that trigger a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl ShutdownSignal {
    /// Shell convention for a process stopped by a signal: 128 + signo.
    pub fn exit_code(self) -> i32 {
        let signo = match self {
            ShutdownSignal::Hangup => 1,
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        };
        128 + signo
    }
}

/// SIGINT, SIGTERM and SIGHUP listeners. Handlers are installed by
/// [`ShutdownSignals::install`], so signals arriving after it returns are
/// never lost.
#[cfg(unix)]
#[derive(Debug)]
pub struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => ShutdownSignal::Interrupt,
            Some(()) = self.terminate.recv() => ShutdownSignal::Terminate,
            Some(()) = self.hangup.recv() => ShutdownSignal::Hangup,
            else => std::future::pending::<ShutdownSignal>().await,
        }
    }
}

#[cfg(not(unix))]
#[derive(Debug)]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    }
}

/// Remove every live temporary tsconfig and return the exit status for
/// `signal`.
pub fn sweep_on_signal(registry: &CleanupRegistry, signal: ShutdownSignal) -> i32 {
    let removed = registry.sweep();
    tracing::debug!(?signal, removed, "terminated, temporary tsconfigs removed");
    signal.exit_code()
}
