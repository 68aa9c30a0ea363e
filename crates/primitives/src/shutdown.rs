use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Listens for the process termination signals and turns them into a cancellation.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates a new instance of `Self`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token cancelled once a termination signal is received.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Waits for SIGINT or SIGTERM, then cancels every token handed out.
    pub async fn recv(&self) {
        wait_for_signal().await;
        self.token.cancel();
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGTERM, only handling SIGINT");
            ctrl_c().await;
            return
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        // Never resolve: shutting down on a broken listener would stop a healthy node.
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    }
}

/// Runs `fut` until it completes. On a termination signal, the tokens of `signal` are
/// cancelled and `fut` is awaited until it winds down. `on_shutdown` runs in both cases.
pub async fn run_until_shutdown<F, E>(
    fut: F,
    signal: ShutdownSignal,
    on_shutdown: impl FnOnce(),
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
{
    tokio::pin!(fut);

    let finished = tokio::select! {
        res = &mut fut => Some(res),
        _ = signal.recv() => None,
    };

    let res = match finished {
        Some(res) => res,
        None => fut.await,
    };

    on_shutdown();
    res
}
