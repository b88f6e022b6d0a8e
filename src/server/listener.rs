// TCP listener setup
//
// Listeners are created through socket2 so SO_REUSEADDR and SO_REUSEPORT
// can be set before binding.

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

/// Bind a nonblocking `TcpListener` with `SO_REUSEADDR` and `SO_REUSEPORT` set.
///
/// `SO_REUSEADDR` lets the server rebind a port still in `TIME_WAIT` after a
/// quick restart; `SO_REUSEPORT` lets several server processes share one port.
///
/// # Errors
///
/// Returns an error when the socket cannot be created or bound.
pub fn bind_reusable(addr: std::net::SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;

    // Tokio requires the socket to be nonblocking before conversion
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(128)?;

    TcpListener::from_std(socket.into())
}
