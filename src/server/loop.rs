// Server loop module
// Accepts connections until the shutdown signal resolves, then waits for
// in-flight connections to finish

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;

use super::connection::{accept_connection, ConnectionLimits};
use super::listener::create_listener;
use crate::config::{Config, PerformanceConfig};
use crate::error::ServerError;
use crate::logger;
use crate::routing::App;

/// Bound listener waiting to serve an [`App`]
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    limits: ConnectionLimits,
}

impl Server {
    /// Bind `addr`; port 0 picks an ephemeral port
    pub fn bind(addr: SocketAddr, performance: &PerformanceConfig) -> Result<Self, ServerError> {
        let listener = create_listener(addr)?;
        Ok(Self {
            listener,
            limits: ConnectionLimits::from(performance),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process ends
    pub async fn serve(self, app: App) -> Result<(), ServerError> {
        self.serve_with_shutdown(app, std::future::pending()).await
    }

    /// Serve until `signal` resolves
    ///
    /// Idle keep-alive connections are closed at once. Connections with a
    /// request in flight get up to the connection timeout to finish it.
    pub async fn serve_with_shutdown<S>(self, app: App, signal: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let app = Arc::new(app);
        let limits = Arc::new(self.limits);
        let active_connections = Arc::new(AtomicUsize::new(0));
        let graceful = GracefulShutdown::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            accept_connection(stream, peer_addr, &app, &limits, &active_connections, &graceful);
                        }
                        Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                    }
                }
                () = &mut signal => break,
            }
        }

        drop(self.listener);
        drain(graceful, &active_connections, limits.timeout).await;
        Ok(())
    }
}

async fn drain(graceful: GracefulShutdown, active_connections: &AtomicUsize, grace: Duration) {
    if tokio::time::timeout(grace, graceful.shutdown()).await.is_err() {
        logger::log_warning(&format!(
            "{} connections still open after {} seconds, closing",
            active_connections.load(Ordering::SeqCst),
            grace.as_secs()
        ));
    }
}

/// Bind the configured address and serve `app` until SIGINT or SIGTERM
pub async fn listen_and_serve(config: &Config, app: App) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let server = Server::bind(addr, &config.performance)?;
    logger::log_server_start(&server.local_addr()?, config);
    server.serve_with_shutdown(app, super::signal::shutdown_signal()).await?;
    logger::log_info("Server stopped");
    Ok(())
}
