//! Per-connection bookkeeping, mirrored on the src/dst context split the
//! teacher crate uses to distinguish a connection's role without giving it a
//! different wire type.

use log::trace;
use std::net::SocketAddr;

/// Per-connection accounting hook. `read`/`wrote` are called from inside the
/// relay's hot loop, so implementations must stay cheap.
pub trait Ctx {
    fn label(&self) -> &'static str;
    fn peer(&self) -> SocketAddr;
    fn read(&mut self, sz: usize);
    fn wrote(&mut self, sz: usize);
}

/// Context for the client-facing connection of a flow.
pub struct IngressCtx {
    peer: SocketAddr,
    rx_bytes: usize,
    tx_bytes: usize,
}

impl IngressCtx {
    pub fn new(peer: SocketAddr) -> IngressCtx {
        IngressCtx {
            peer,
            rx_bytes: 0,
            tx_bytes: 0,
        }
    }
}

impl Ctx for IngressCtx {
    fn label(&self) -> &'static str {
        "ingress"
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn read(&mut self, sz: usize) {
        self.rx_bytes += sz;
    }

    fn wrote(&mut self, sz: usize) {
        self.tx_bytes += sz;
    }
}

impl Drop for IngressCtx {
    fn drop(&mut self) {
        trace!(
            "ingress {}: {} bytes read, {} bytes written",
            self.peer,
            self.rx_bytes,
            self.tx_bytes
        );
    }
}

/// Context for the server-facing connection of a flow.
pub struct EgressCtx {
    peer: SocketAddr,
    rx_bytes: usize,
    tx_bytes: usize,
}

impl EgressCtx {
    pub fn new(peer: SocketAddr) -> EgressCtx {
        EgressCtx {
            peer,
            rx_bytes: 0,
            tx_bytes: 0,
        }
    }
}

impl Ctx for EgressCtx {
    fn label(&self) -> &'static str {
        "egress"
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn read(&mut self, sz: usize) {
        self.rx_bytes += sz;
    }

    fn wrote(&mut self, sz: usize) {
        self.tx_bytes += sz;
    }
}

impl Drop for EgressCtx {
    fn drop(&mut self) {
        trace!(
            "egress {}: {} bytes read, {} bytes written",
            self.peer,
            self.rx_bytes,
            self.tx_bytes
        );
    }
}
