// Signal handling module
//
// SIGINT (Ctrl+C) and, on Unix, SIGTERM request a graceful shutdown.

/// Resolve once a shutdown signal arrives
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            crate::logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                crate::logger::log_error(&format!("Failed to listen for SIGTERM: {e}"));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => crate::logger::log_info("SIGINT received, shutting down"),
        () = terminate => crate::logger::log_info("SIGTERM received, shutting down"),
    }
}
