//! OS signal handling.
//!
//! - SIGINT / SIGTERM: trigger graceful shutdown
//! - A second signal while draining: exit immediately

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Exit status used when a second signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Wait for SIGINT, or SIGTERM on Unix.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Spawn a task translating OS signals into `shutdown`.
pub fn spawn_signal_listener(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received, draining");
        shutdown.trigger();

        wait_for_signal().await;
        tracing::warn!("Second shutdown signal received, exiting immediately");
        std::process::exit(FORCED_EXIT_CODE);
    })
}
