//! Ends `slurm-watch run` on SIGTERM or SIGINT.
//!
//! The poll loop only sees a [`CancellationToken`]; an in-flight cycle is
//! abandoned and the loop returns its engine.

use std::future::Future;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// The signal that asked the watcher to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Terminate,
    Interrupt,
}

/// Resolves on the first SIGTERM or SIGINT. When the Unix handlers cannot be
/// registered only Ctrl-C is watched, and if that fails too this never resolves.
pub async fn exit_signal() -> ExitSignal {
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => tokio::select! {
            _ = term.recv() => ExitSignal::Terminate,
            _ = int.recv() => ExitSignal::Interrupt,
        },
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "signal handlers unavailable; watching ctrl-c only");
            match tokio::signal::ctrl_c().await {
                Ok(()) => ExitSignal::Interrupt,
                Err(e) => {
                    tracing::error!(error = %e, "cannot watch ctrl-c; stop the process by other means");
                    std::future::pending().await
                }
            }
        }
    }
}

/// Cancels `token` when `trigger` resolves. Returns early if the token is
/// cancelled by someone else first.
pub async fn cancel_on<F>(token: CancellationToken, trigger: F)
where
    F: Future<Output = ExitSignal>,
{
    tokio::select! {
        signal = trigger => {
            tracing::info!(?signal, "stopping the watch");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

/// A token for the poll loop, cancelled by SIGTERM or SIGINT.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn(cancel_on(token.clone(), exit_signal()));
    token
}
