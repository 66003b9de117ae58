use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turns Ctrl-C into cancellation of the in-flight device call.
///
/// The workflow driving the device observes the token through its
/// `DeviceSession` and ends in its error state.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a task that cancels the token on the first Ctrl-C.
    /// Must be called from within a tokio runtime.
    pub fn install_signal_handlers(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        warn!("Interrupt received, cancelling the current device operation");
                        token.cancel();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                },
                _ = token.cancelled() => {}
            }
        });
        info!("Signal handlers installed");
    }

    /// Cancel without a signal; also releases the listener task
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}
