//! Process signal handling.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit status used when a second signal forces termination
pub const FORCED_EXIT_CODE: i32 = 1;

/// Install SIGINT/SIGTERM handlers and return the shutdown token.
///
/// The first signal cancels the token so the controller can drain. A second
/// one exits the process immediately with [`FORCED_EXIT_CODE`].
///
/// Must be called from within a tokio runtime.
pub fn shutdown_signal() -> Result<CancellationToken> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let cancel = token.clone();
    tokio::spawn(async move {
        for received in 0.. {
            #[cfg(unix)]
            let name = tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!(error = %e, "Ctrl+C handler failed");
                        return;
                    }
                    "SIGINT"
                }
                _ = terminate.recv() => "SIGTERM",
            };

            #[cfg(not(unix))]
            let name = match tokio::signal::ctrl_c().await {
                Ok(()) => "SIGINT",
                Err(e) => {
                    warn!(error = %e, "Ctrl+C handler failed");
                    return;
                }
            };

            if received == 0 {
                info!(signal = name, "Received signal, initiating graceful shutdown");
                cancel.cancel();
            } else {
                warn!(signal = name, "Received second signal, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    Ok(token)
}
