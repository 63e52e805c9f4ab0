// Connection handling module
// Serves one accepted TCP connection with the compiled application

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpStream;

use crate::config::PerformanceConfig;
use crate::logger;
use crate::routing::App;

/// Limits applied to every connection
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    pub keep_alive: bool,
    pub timeout: Duration,
    pub max_connections: Option<usize>,
}

impl From<&PerformanceConfig> for ConnectionLimits {
    fn from(perf: &PerformanceConfig) -> Self {
        Self {
            keep_alive: perf.keep_alive_timeout > 0,
            timeout: Duration::from_secs(std::cmp::max(perf.read_timeout, perf.write_timeout)),
            max_connections: perf
                .max_connections
                .map(|max| usize::try_from(max).unwrap_or(usize::MAX)),
        }
    }
}

/// Accept a connection unless the connection limit is reached.
///
/// Accepted connections are watched by `graceful` so shutdown can close
/// them once their in-flight request is answered.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: &Arc<App>,
    limits: &Arc<ConnectionLimits>,
    conn_counter: &Arc<AtomicUsize>,
    graceful: &GracefulShutdown,
) {
    // Increment first, then check, so concurrent accepts cannot both pass
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    if let Some(max_conn) = limits.max_connections {
        if prev_count >= max_conn {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("Accepted connection from {peer_addr}"));
    handle_connection(
        stream,
        peer_addr,
        Arc::clone(app),
        Arc::clone(limits),
        Arc::clone(conn_counter),
        graceful,
    );
}

fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: Arc<App>,
    limits: Arc<ConnectionLimits>,
    conn_counter: Arc<AtomicUsize>,
    graceful: &GracefulShutdown,
) {
    let io = TokioIo::new(stream);

    let mut builder = http1::Builder::new();
    builder.keep_alive(limits.keep_alive);

    let conn = builder.serve_connection(
        io,
        service_fn(move |req| {
            let app = Arc::clone(&app);
            async move { Ok::<_, std::convert::Infallible>(app.serve_peer(req, Some(peer_addr)).await) }
        }),
    );
    let conn = graceful.watch(conn);

    tokio::spawn(async move {
        match tokio::time::timeout(limits.timeout, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    limits.timeout.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
