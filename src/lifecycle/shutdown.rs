//! Signal handling for graceful shutdown
//!
//! SIGHUP is included: session managers send it on logout, and the
//! controller must still tear down its bus registrations cleanly.

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// Which signal asked us to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Terminate,
    Interrupt,
    Hangup,
}

/// Registered shutdown signal streams
pub struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
    sighup: Signal,
}

impl ShutdownSignal {
    /// Register handlers for SIGTERM, SIGINT and SIGHUP
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next shutdown signal
    pub async fn wait(&mut self) -> StopReason {
        let reason = tokio::select! {
            _ = self.sigterm.recv() => StopReason::Terminate,
            _ = self.sigint.recv() => StopReason::Interrupt,
            _ = self.sighup.recv() => StopReason::Hangup,
        };
        debug!(?reason, "shutdown signal received");
        reason
    }
}
