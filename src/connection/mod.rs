use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;

pub mod ctx;
mod duplex;
mod half_duplex;

pub use ctx::Ctx;
pub use duplex::{Duplex, Summary};

/// Fixed per-direction relay buffer size. No dynamic growth: a Flow's
/// memory footprint is `O(BUFFER_SIZE)` regardless of how much data it
/// moves.
pub const BUFFER_SIZE: usize = 32 * 1024;

/// Whether this connection's write-half has been shut down. Set to
/// `Closed` once the opposite direction observed EOF reading from this
/// connection and its own buffered bytes have been fully flushed -- the
/// read-half (and hence the other `HalfDuplex`, where this connection
/// plays the reader) may still be draining data at that point, since the
/// two halves of a duplex shut down independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Open,
    Closed,
}

/// A src or dst connection with its relay buffer and role context.
///
/// `buf[written..pending]` holds bytes this connection has already read
/// from its socket and that are waiting to be written to the *other*
/// connection of the flow. `0 <= written <= pending <= BUFFER_SIZE` always.
pub struct Connection<C> {
    pub ctx: C,
    pub socket: TcpStream,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,

    buf: Box<[u8; BUFFER_SIZE]>,
    pending: usize,
    written: usize,

    /// Set once this connection's socket should be shut down (write-half)
    /// as soon as its currently buffered data is flushed -- i.e. once the
    /// opposite direction has observed EOF reading from it.
    to_close: bool,

    state: ConnState,
}

impl<C: Ctx> Connection<C> {
    pub fn new(socket: TcpStream, ctx: C) -> io::Result<Connection<C>> {
        let local_addr = socket.local_addr()?;
        let peer_addr = socket.peer_addr()?;
        Ok(Connection {
            ctx,
            socket,
            local_addr,
            peer_addr,
            buf: Box::new([0u8; BUFFER_SIZE]),
            pending: 0,
            written: 0,
            to_close: false,
            state: ConnState::Open,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Transfers data between this connection and `other` bidirectionally
    /// until both directions have seen EOF and flushed, or either errors.
    pub fn into_duplex<D: Ctx>(self, other: Connection<D>) -> Duplex<C, D> {
        duplex::new(self, other)
    }
}
