use super::{ConnState, Connection, Ctx};
use log::trace;
use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub fn new<R, W>(
    reader: Rc<RefCell<Connection<R>>>,
    writer: Rc<RefCell<Connection<W>>>,
) -> HalfDuplex<R, W>
where
    R: Ctx,
    W: Ctx,
{
    HalfDuplex {
        reader,
        writer,
        bytes_total: 0,
        shutting_down: false,
    }
}

/// Reads from `reader` and writes to `writer` until `reader` hits EOF, at
/// which point `writer`'s write-half is shut down and the future completes.
///
/// All data is read into `reader`'s own fixed buffer before being written
/// out; reading never resumes until the previous batch has been fully
/// flushed (`written == pending`), which is the proxy's backpressure
/// mechanism -- a slow writer stalls its reader.
pub struct HalfDuplex<R, W> {
    reader: Rc<RefCell<Connection<R>>>,
    writer: Rc<RefCell<Connection<W>>>,
    bytes_total: usize,
    shutting_down: bool,
}

impl<R, W> Future for HalfDuplex<R, W>
where
    R: Ctx,
    W: Ctx,
{
    type Output = io::Result<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut reader = this.reader.borrow_mut();
        let mut writer = this.writer.borrow_mut();

        if this.shutting_down {
            debug_assert!(writer.to_close, "shutting_down implies the writer was marked to_close");
            debug_assert_eq!(writer.state, ConnState::Open, "a closed connection is never shut down twice");
            match Pin::new(&mut writer.socket).poll_shutdown(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {
                    writer.state = ConnState::Closed;
                    return Poll::Ready(Ok(this.bytes_total));
                }
            }
        }

        loop {
            debug_assert!(reader.written <= reader.pending);
            debug_assert!(reader.pending <= reader.buf.len());
            debug_assert_eq!(writer.state, ConnState::Open, "never write to a connection already closed");
            debug_assert!(!writer.to_close, "never write to a connection already marked to_close");

            // Flush whatever's buffered before reading more: at most one
            // batch of reader-bound data is in flight at a time.
            while reader.written < reader.pending {
                let chunk = &reader.buf[reader.written..reader.pending];
                match Pin::new(&mut writer.socket).poll_write(cx, chunk) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Ready(Ok(n)) => {
                        reader.written += n;
                        this.bytes_total += n;
                        writer.ctx.wrote(n);
                    }
                }
            }
            reader.pending = 0;
            reader.written = 0;

            let mut buf = ReadBuf::new(&mut reader.buf[..]);
            match Pin::new(&mut reader.socket).poll_read(cx, &mut buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {
                    let n = buf.filled().len();
                    reader.ctx.read(n);
                    if n == 0 {
                        trace!(
                            "{} -> {}: EOF, flushing and shutting down",
                            reader.ctx.label(),
                            writer.ctx.label()
                        );
                        writer.to_close = true;
                        this.shutting_down = true;
                        match Pin::new(&mut writer.socket).poll_shutdown(cx) {
                            Poll::Pending => return Poll::Pending,
                            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                            Poll::Ready(Ok(())) => {
                                writer.state = ConnState::Closed;
                                return Poll::Ready(Ok(this.bytes_total));
                            }
                        }
                    }
                    reader.pending = n;
                }
            }
        }
    }
}
