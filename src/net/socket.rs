//! Transparent-mode socket construction.
//!
//! Both the listening socket and every egress socket are created the same
//! way: `IP_TRANSPARENT` so the kernel permits binding to and originating
//! from addresses that aren't locally assigned, plus `SO_KEEPALIVE` and
//! `SO_REUSEADDR`, matching `start_unatd()` and the `FLOW_HALFOPEN` branch
//! of `read_cb()` in the original `unatd` proxy this crate reimplements.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;

/// `IP_TRANSPARENT` isn't exposed by every `libc` target; defining it
/// ourselves keeps this module's correctness independent of that crate's
/// version.
#[cfg(target_os = "linux")]
const IP_TRANSPARENT: libc::c_int = 19;

fn new_nonblocking_stream_socket() -> io::Result<Socket> {
    let sock = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    sock.set_nonblocking(true)?;
    sock.set_reuse_address(true)?;
    set_keepalive(&sock)?;
    set_transparent(&sock)?;
    Ok(sock)
}

#[cfg(target_os = "linux")]
fn set_transparent(sock: &Socket) -> io::Result<()> {
    setsockopt_bool(sock, libc::SOL_IP, IP_TRANSPARENT)
}

#[cfg(not(target_os = "linux"))]
fn set_transparent(_sock: &Socket) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "transparent proxying (IP_TRANSPARENT) is only supported on Linux",
    ))
}

fn set_keepalive(sock: &Socket) -> io::Result<()> {
    setsockopt_bool(sock, libc::SOL_SOCKET, libc::SO_KEEPALIVE)
}

fn setsockopt_bool(sock: &Socket, level: libc::c_int, name: libc::c_int) -> io::Result<()> {
    let value: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Builds the listening socket: transparent, keepalive, reuseaddr, bound to
/// `addr`, listening with the given backlog.
pub fn listening_socket(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let sock = new_nonblocking_stream_socket()?;
    sock.bind(&addr.into())?;
    sock.listen(backlog)?;
    Ok(sock.into())
}

/// Builds an egress socket bound to `bind_addr` (the client's original
/// source address with port zeroed, or the SNAT interface's address with
/// port zeroed), ready to `connect()`. Returned as a `socket2::Socket`
/// rather than a `TcpStream` since the caller still needs to issue a
/// non-blocking `connect()` before handing it to tokio.
pub fn egress_socket(bind_addr: SocketAddr) -> io::Result<Socket> {
    let sock = new_nonblocking_stream_socket()?;
    sock.bind(&bind_addr.into())?;
    Ok(sock)
}
