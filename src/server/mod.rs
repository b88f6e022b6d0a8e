// Server module entry
// Binds the listener and drives the accept loop until shutdown

pub mod connection;
pub mod listener;
pub mod signal;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::api::Api;
use crate::config::Config;
use crate::logger;

pub use listener::bind_reusable;

/// Bind the configured address and serve `api` until SIGTERM or Ctrl+C.
///
/// # Errors
///
/// Returns an error when the listen address is invalid or binding fails.
pub async fn serve(api: Api, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr()?;
    let listener = listener::bind_reusable(addr)?;

    logger::log_server_start(&addr, &config);

    let api = Arc::new(api);
    let config = Arc::new(config);
    let active_connections = Arc::new(AtomicUsize::new(0));

    let shutdown = signal::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        connection::accept_connection(
                            stream,
                            peer_addr,
                            &api,
                            &config,
                            &active_connections,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = &mut shutdown => {
                logger::log_shutdown();
                break;
            }
        }
    }

    Ok(())
}
