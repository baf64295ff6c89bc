//! Graceful shutdown signal handling.
//!
//! ```ignore
//! let sig_down = SigDown::try_new()?;
//! let token = sig_down.cancellation_token();
//! axum::serve(listener, app)
//!     .with_graceful_shutdown(async move { token.cancelled().await })
//!     .await?;
//! ```

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first SIGTERM or SIGINT.
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers. Fails if the runtime cannot install them.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let inner = cancellation_token.clone();
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            let signal = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal, "Shutting down");
            inner.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for a shutdown signal and for the handler task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
