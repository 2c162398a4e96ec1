use super::half_duplex::{self, HalfDuplex};
use super::{Connection, Ctx};
use log::trace;
use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

pub struct Summary {
    pub to_dst_bytes: usize,
    pub to_src_bytes: usize,
}

pub fn new<S, D>(src: Connection<S>, dst: Connection<D>) -> Duplex<S, D>
where
    S: Ctx,
    D: Ctx,
{
    let src_addr = src.peer_addr();
    let dst_addr = dst.peer_addr();
    let src = Rc::new(RefCell::new(src));
    let dst = Rc::new(RefCell::new(dst));
    Duplex {
        src_addr,
        dst_addr,
        to_dst: Some(half_duplex::new(src.clone(), dst.clone())),
        to_src: Some(half_duplex::new(dst, src)),
        to_dst_bytes: 0,
        to_src_bytes: 0,
    }
}

/// Joins both directions of a flow into a single future. Completes once
/// both `HalfDuplex`es have completed (every byte each side sent has been
/// flushed and the peer notified by FIN), or as soon as either errors.
pub struct Duplex<S, D> {
    src_addr: SocketAddr,
    dst_addr: SocketAddr,
    to_dst: Option<HalfDuplex<S, D>>,
    to_src: Option<HalfDuplex<D, S>>,
    to_dst_bytes: usize,
    to_src_bytes: usize,
}

impl<S, D> Future for Duplex<S, D>
where
    S: Ctx,
    D: Ctx,
{
    type Output = io::Result<Summary>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<Summary>> {
        let this = self.get_mut();

        if let Some(mut to_dst) = this.to_dst.take() {
            trace!("polling {} -> {}", this.src_addr, this.dst_addr);
            match Pin::new(&mut to_dst).poll(cx) {
                Poll::Ready(Ok(sz)) => {
                    trace!("{} -> {} complete", this.src_addr, this.dst_addr);
                    this.to_dst_bytes = sz;
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => this.to_dst = Some(to_dst),
            }
        }

        if let Some(mut to_src) = this.to_src.take() {
            trace!("polling {} -> {}", this.dst_addr, this.src_addr);
            match Pin::new(&mut to_src).poll(cx) {
                Poll::Ready(Ok(sz)) => {
                    trace!("{} -> {} complete", this.dst_addr, this.src_addr);
                    this.to_src_bytes = sz;
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => this.to_src = Some(to_src),
            }
        }

        if this.to_dst.is_none() && this.to_src.is_none() {
            Poll::Ready(Ok(Summary {
                to_dst_bytes: this.to_dst_bytes,
                to_src_bytes: this.to_src_bytes,
            }))
        } else {
            Poll::Pending
        }
    }
}
