//! Exercises the relay engine (`Connection`/`Duplex`) directly over loopback
//! TCP pairs. `IP_TRANSPARENT` needs root or `CAP_NET_ADMIN` and isn't
//! exercised here; these tests stand in for a real transparent redirect by
//! wiring two independent loopback connections together exactly the way a
//! `Flow` would once its egress side is up.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tproxyd::connection::ctx::{EgressCtx, IngressCtx};
use tproxyd::connection::Connection;

/// Builds a connected loopback pair, returning the server-accepted half
/// first and the client-initiated half second.
async fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connect = TcpStream::connect(addr);
    let accept = listener.accept();
    let (connect, accept) = tokio::join!(connect, accept);
    (accept.unwrap().0, connect.unwrap())
}

#[tokio::test]
async fn relays_bytes_in_both_directions() {
    // ingress_near <-> ingress_far stands in for the client <-> proxy leg;
    // egress_near <-> egress_far stands in for the proxy <-> upstream leg.
    let (ingress_far, ingress_near) = loopback_pair().await;
    let (egress_far, egress_near) = loopback_pair().await;

    let ingress_ctx = IngressCtx::new(ingress_far.peer_addr().unwrap());
    let egress_ctx = EgressCtx::new(egress_far.peer_addr().unwrap());
    let ingress_conn = Connection::new(ingress_far, ingress_ctx).unwrap();
    let egress_conn = Connection::new(egress_far, egress_ctx).unwrap();

    let local = tokio::task::LocalSet::new();
    let relay = local.spawn_local(ingress_conn.into_duplex(egress_conn));
    local
        .run_until(async move {
            let mut ingress_near = ingress_near;
            let mut egress_near = egress_near;

            ingress_near.write_all(b"hello upstream").await.unwrap();
            let mut buf = [0u8; 32];
            let n = egress_near.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"hello upstream");

            egress_near.write_all(b"hello client").await.unwrap();
            let n = ingress_near.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"hello client");

            drop(ingress_near);
            drop(egress_near);

            let summary = tokio::time::timeout(Duration::from_secs(5), relay)
                .await
                .expect("relay timed out")
                .expect("relay task panicked")
                .expect("relay returned an error");
            assert_eq!(summary.to_dst_bytes, b"hello upstream".len());
            assert_eq!(summary.to_src_bytes, b"hello client".len());
        })
        .await;
}

#[tokio::test]
async fn half_close_from_client_shuts_down_upstream_write_half() {
    let (ingress_far, mut ingress_near) = loopback_pair().await;
    let (egress_far, mut egress_near) = loopback_pair().await;

    let ingress_ctx = IngressCtx::new(ingress_far.peer_addr().unwrap());
    let egress_ctx = EgressCtx::new(egress_far.peer_addr().unwrap());
    let ingress_conn = Connection::new(ingress_far, ingress_ctx).unwrap();
    let egress_conn = Connection::new(egress_far, egress_ctx).unwrap();

    let local = tokio::task::LocalSet::new();
    let relay = local.spawn_local(ingress_conn.into_duplex(egress_conn));
    local
        .run_until(async move {
            // Client closes its write side immediately; the proxy should
            // propagate a FIN to upstream without losing anything upstream
            // already sent or is about to send.
            drop(ingress_near.shutdown().await);

            let mut buf = [0u8; 8];
            let n = egress_near.read(&mut buf).await.unwrap();
            assert_eq!(n, 0, "expected EOF on upstream side after client half-close");

            egress_near.write_all(b"bye").await.unwrap();
            let mut buf = [0u8; 8];
            let n = ingress_near.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"bye");
            drop(egress_near);

            let summary = tokio::time::timeout(Duration::from_secs(5), relay)
                .await
                .expect("relay timed out")
                .expect("relay task panicked")
                .expect("relay returned an error");
            assert_eq!(summary.to_src_bytes, b"bye".len());
        })
        .await;
}

#[tokio::test]
async fn many_concurrent_flows() {
    const FLOWS: usize = 16;
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let mut handles = Vec::with_capacity(FLOWS);
            for i in 0..FLOWS {
                let (ingress_far, mut ingress_near) = loopback_pair().await;
                let (egress_far, mut egress_near) = loopback_pair().await;

                let ingress_ctx = IngressCtx::new(ingress_far.peer_addr().unwrap());
                let egress_ctx = EgressCtx::new(egress_far.peer_addr().unwrap());
                let ingress_conn = Connection::new(ingress_far, ingress_ctx).unwrap();
                let egress_conn = Connection::new(egress_far, egress_ctx).unwrap();
                let relay = tokio::task::spawn_local(ingress_conn.into_duplex(egress_conn));

                let payload = format!("flow-{i}").into_bytes();
                let expected = payload.clone();
                ingress_near.write_all(&payload).await.unwrap();
                drop(ingress_near.shutdown().await);

                handles.push(async move {
                    let mut buf = Vec::new();
                    egress_near.read_to_end(&mut buf).await.unwrap();
                    assert_eq!(buf, expected);
                    drop(egress_near);
                    relay.await.unwrap().unwrap();
                });
            }
            futures_join_all(handles).await;
        })
        .await;
}

/// Small local stand-in for `futures::future::join_all` so this test crate
/// doesn't need its own dependency on `futures` for one call site.
async fn futures_join_all<I, F>(iter: I)
where
    I: IntoIterator<Item = F>,
    F: std::future::Future<Output = ()>,
{
    for fut in iter {
        fut.await;
    }
}
