//! A single proxied connection, start to finish.
//!
//! A `Flow` begins at `UNINITIALIZED` the moment a client socket is
//! accepted. It moves through `HALFOPEN` (ingress accepted, egress not yet
//! created), `WAITING` (egress socket connecting), to `OPEN` (both sides
//! connected, relaying). Unlike the original proxy's event-driven state
//! machine, these transitions are expressed here as a single `async fn`:
//! the states still exist (`FlowState`, logged at each transition) but the
//! waiting is just `.await` instead of a callback re-entering on the next
//! epoll event.

use crate::connection::ctx::{EgressCtx, IngressCtx};
use crate::connection::Connection;
use crate::net;
use log::{debug, trace, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;

/// Mirrors the original proxy's `flow_state` enum. Kept even though
/// `async`/`.await` collapses most of the waiting into plain control flow,
/// since it's useful for logging and matches the data model these
/// semantics were distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Uninitialized,
    HalfOpen,
    Waiting,
    Open,
}

/// How an egress connection picks its source address.
#[derive(Debug, Clone, Copy)]
pub enum BindMode {
    /// Originate from the client's own address (the default: the upstream
    /// server sees the real client, same as plain transparent proxying).
    ClientAddr,
    /// Originate from a fixed address, e.g. this host's SNAT interface.
    Fixed(IpAddr),
}

/// Drives one accepted connection through to completion: recovers the
/// original destination, opens a matching egress connection, and relays
/// bytes until both sides close or either errors.
pub async fn run(ingress: TcpStream, bind_mode: BindMode) -> io::Result<()> {
    let peer_addr = ingress.peer_addr()?;
    let mut state = FlowState::Uninitialized;
    trace!("{}: flow {:?}", peer_addr, state);

    // HALFOPEN: under IP_TRANSPARENT delivery the accepted socket's local
    // address already is the original destination, so recovering it is
    // just getsockname() -- no separate kernel lookup needed.
    let dst_addr = net::original_dst(&ingress)?;
    state = FlowState::HalfOpen;
    debug!("{}: accepted, original destination {}", peer_addr, dst_addr);
    trace!("{}: flow {:?}", peer_addr, state);

    // The engine doesn't read here; it waits for the first readable event
    // purely as the prompt to open the upstream side, so an idle client
    // that never sends a byte never consumes an upstream connection.
    ingress.readable().await?;

    let bind_addr = match bind_mode {
        BindMode::ClientAddr => {
            SocketAddr::new(peer_addr.ip(), 0)
        }
        BindMode::Fixed(ip) => SocketAddr::new(ip, 0),
    };

    // WAITING: open the egress connection. socket2 gives us the
    // IP_TRANSPARENT + non-local-bind socket; the connect is issued
    // directly (non-blocking, so it returns EINPROGRESS immediately) and
    // tokio's readiness polling drives it to completion.
    state = FlowState::Waiting;
    trace!("{}: flow {:?}", peer_addr, state);
    let egress_sock = net::socket::egress_socket(bind_addr)?;
    match egress_sock.connect(&dst_addr.into()) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(e) => return Err(e),
    }
    let egress = TcpStream::from_std(egress_sock.into())?;
    egress.writable().await?;
    if let Some(e) = egress.take_error()? {
        return Err(e);
    }

    // OPEN: both ends connected, relay until done.
    state = FlowState::Open;
    trace!("{}: flow {:?}", peer_addr, state);

    let ingress_ctx = IngressCtx::new(peer_addr);
    let egress_ctx = EgressCtx::new(dst_addr);
    let ingress_conn = Connection::new(ingress, ingress_ctx)?;
    let egress_conn = Connection::new(egress, egress_ctx)?;

    let summary = ingress_conn.into_duplex(egress_conn).await?;
    debug!(
        "{} <-> {}: closed, {} bytes client->upstream, {} bytes upstream->client",
        peer_addr, dst_addr, summary.to_dst_bytes, summary.to_src_bytes
    );
    Ok(())
}

/// Runs a flow to completion, logging (never propagating) any error. A
/// single bad flow must never bring down the listener, mirroring the
/// per-connection error isolation the original proxy gets for free from
/// its one-callback-per-fd event loop.
pub async fn run_logged(ingress: TcpStream, bind_mode: BindMode) {
    let peer = ingress.peer_addr().ok();
    if let Err(e) = run(ingress, bind_mode).await {
        warn!("flow {:?} failed: {}", peer, e);
    }
}
