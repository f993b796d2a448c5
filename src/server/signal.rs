// Signal handling module
//
// - SIGTERM: graceful shutdown
// - SIGINT:  graceful shutdown (Ctrl+C)

/// Resolve once the process is asked to stop
///
/// If a handler cannot be registered the failure is logged and that signal
/// is ignored; the other one still works.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
        () = interrupt() => tracing::info!(signal = "SIGINT", "shutdown requested"),
    }
}

/// Non-Unix fallback: only Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    interrupt().await;
    tracing::info!(signal = "ctrl-c", "shutdown requested");
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
