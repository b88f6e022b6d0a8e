// Connection handling
// Accepts TCP connections, enforces the connection limit, and serves HTTP/1.1

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::api::Api;
use crate::config::Config;
use crate::logger;

/// Accept a connection, rejecting it when the connection limit is reached.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    api: &Arc<Api>,
    config: &Arc<Config>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = config.limits.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if config.logging.access_log {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(api),
        Arc::clone(config),
        Arc::clone(conn_counter),
    );
}

/// Serve one HTTP/1.1 connection in a spawned task.
///
/// The whole connection runs under a timeout derived from the configured
/// read and write timeouts; the counter is decremented when it finishes.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    api: Arc<Api>,
    config: Arc<Config>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let timeout_duration = std::time::Duration::from_secs(std::cmp::max(
            config.timeouts.read,
            config.timeouts.write,
        ));

        let mut builder = http1::Builder::new();
        if config.timeouts.keep_alive > 0 {
            builder.keep_alive(true);
        }

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let api = Arc::clone(&api);
                async move {
                    Ok::<_, std::convert::Infallible>(api.handle(req, Some(peer_addr)).await)
                }
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection timeout after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
