//! The transparent listening socket and its accept loop.

use crate::config::{Args, LISTEN_BACKLOG};
use crate::flow::{self, BindMode};
use crate::net;
use log::{error, info, trace};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// A bound, not-yet-running listener.
pub struct Listener {
    inner: TcpListener,
    bind_mode: BindMode,
}

impl Listener {
    /// Binds the transparent listening socket on `0.0.0.0:<args.port>`, and
    /// resolves the egress bind mode from `args.snat_iface` if given.
    pub fn bind(args: &Args) -> io::Result<Listener> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
        let std_listener = net::socket::listening_socket(addr, LISTEN_BACKLOG)?;
        std_listener.set_nonblocking(true)?;
        let inner = TcpListener::from_std(std_listener)?;

        let bind_mode = match &args.snat_iface {
            Some(iface) => {
                let ip = net::iface::ipv4_addr_of(iface)?;
                info!("SNAT mode: egress connections will originate from {} ({})", ip, iface);
                BindMode::Fixed(IpAddr::V4(ip))
            }
            None => BindMode::ClientAddr,
        };

        info!("listening on {}", inner.local_addr()?);
        Ok(Listener { inner, bind_mode })
    }

    /// Accepts connections forever, spawning one task per flow. A single
    /// failed accept is logged and does not stop the listener -- only an
    /// error on the listening socket itself (exhausted file descriptors,
    /// say) is allowed to end this loop, matching how the original proxy
    /// keeps its event loop running across individual accept failures.
    pub async fn run(self) -> io::Result<()> {
        let Listener { inner, bind_mode } = self;
        loop {
            match inner.accept().await {
                Ok((stream, peer)) => {
                    trace!("accepted {}", peer);
                    tokio::task::spawn_local(flow::run_logged(stream, bind_mode));
                }
                Err(e) => {
                    error!("accept failed: {}", e);
                }
            }
        }
    }
}
