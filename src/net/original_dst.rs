//! Recovering the pre-redirect destination address of an accepted socket.
//!
//! Under `IP_TRANSPARENT` (TPROXY) delivery, the accepted socket's local
//! address already *is* the original destination the client dialed -- the
//! kernel hands it to us straight, with no conntrack entry to consult.
//! `getsockname()` is therefore all that's needed; this is exactly what
//! `main.c:333` does (`getsockname(f->ingress.sock, &f->egress.addr, ...)`
//! right after `accept()`), and is what `std`'s `local_addr()` wraps.

use std::io;
use std::net::SocketAddr;

/// Recovers the original destination of a socket accepted off a
/// transparently-redirected listener.
pub fn original_dst(ingress: &tokio::net::TcpStream) -> io::Result<SocketAddr> {
    ingress.local_addr()
}
