//! # Router Transport — ROUTER/ROUTER Rendezvous Mesh
//!
//! Some deployments want a synchronous world-bootstrap rather than the
//! per-call bind/connect churn of [`super::basic::BasicTransport`] and
//! [`super::retrying::RetryingTransport`]. This flavour builds a full mesh
//! once, in `initialize()`, and reuses it for every subsequent `send`/`recv`.
//!
//! Each rank binds one long-lived listener (the "in" side of its ROUTER
//! pair) and, in rank-staggered order, connects one long-lived stream to
//! every peer's listener (the "out" side). A connecting rank immediately
//! writes a two-frame greeting — `[rank_header, empty_payload]` — the
//! analogue of `probe_router`'s zero-length greeting on connect. The
//! accepting side drains exactly one greeting per inbound connection
//! before the mesh is considered formed, matching spec.md §4.3's
//! "draining one greeting per peer."
//!
//! After `initialize()` returns, `send(peer, bytes)` writes
//! `[rank_header, payload]` on the outbound stream to `peer`; `recv()`
//! reads the next multipart message off any inbound stream, multiplexed
//! through a shared channel fed by one background reader task per peer —
//! the same per-connection-task pattern the teacher's
//! `TcpSocketTransport::handle_connection` uses for its multi-client
//! server.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::frame::{read_frame, write_frame};
use super::{Payload, Transport};
use crate::backoff::{Backoff, BackoffOutcome};
use crate::error::TransportError;
use crate::params::Params;

/// Long-lived mesh transport: one bind, `nranks - 1` connects, reused for
/// the lifetime of the transport.
pub struct RouterTransport {
    rank: usize,
    nranks: usize,
    addresses: Vec<String>,
    backoff_retries: u32,
    backoff_amt_s: f64,
    out: Mutex<HashMap<usize, TcpStream>>,
    inbox: Mutex<Option<mpsc::Receiver<Payload>>>,
}

impl RouterTransport {
    /// Build a router transport from a resolved [`Params`] snapshot. The
    /// mesh is not formed until [`Transport::initialize`] is called.
    pub fn new(params: &Params) -> Self {
        Self {
            rank: params.rank(),
            nranks: params.nranks(),
            addresses: params.addresses().to_vec(),
            backoff_retries: params.backoff_retries(),
            backoff_amt_s: params.backoff_amt_s(),
            out: Mutex::new(HashMap::new()),
            inbox: Mutex::new(None),
        }
    }

    /// Peer connect order, rotated to start just past this rank rather
    /// than always starting at rank 0 — the "rank-staggered order" the
    /// spec calls for, which smears simultaneous-connect contention across
    /// the mesh instead of every rank dialing rank 0 first.
    fn peer_order(&self) -> Vec<usize> {
        (self.rank + 1..self.nranks)
            .chain(0..self.rank)
            .collect()
    }

    /// Connect to `addr`, retrying with backoff since a peer's listener
    /// may not be bound yet when this rank starts dialing.
    async fn connect_with_backoff(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let mut backoff = Backoff::new(self.backoff_retries, self.backoff_amt_s);
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(rank = self.rank, addr, error = %e, "router transport: mesh connect failed");
                    match backoff.next() {
                        BackoffOutcome::Delay(d) => tokio::time::sleep(d).await,
                        BackoffOutcome::Exhausted => return Err(TransportError::BackoffExceeded),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(&self.addresses[self.rank]).await?;

        let mut out = HashMap::new();
        for peer in self.peer_order() {
            let mut stream = self.connect_with_backoff(&self.addresses[peer]).await?;
            stream.set_nodelay(true)?;
            write_frame(&mut stream, self.rank.to_string().as_bytes()).await?;
            write_frame(&mut stream, &[]).await?;
            out.insert(peer, stream);
        }
        *self.out.lock().await = out;
        debug!(rank = self.rank, peers = self.nranks - 1, "router transport: outbound mesh connected");

        let (tx, rx) = mpsc::channel(1024);
        for _ in 0..self.nranks.saturating_sub(1) {
            let (mut stream, peer_addr) = listener.accept().await?;
            let greeting_header = read_frame(&mut stream).await?;
            let _greeting_payload = read_frame(&mut stream).await?;
            debug!(
                rank = self.rank,
                %peer_addr,
                peer_header = %String::from_utf8_lossy(&greeting_header),
                "router transport: drained mesh greeting"
            );

            let tx = tx.clone();
            let self_rank = self.rank;
            tokio::spawn(async move {
                loop {
                    let header = match read_frame(&mut stream).await {
                        Ok(h) => h,
                        Err(e) => {
                            debug!(rank = self_rank, error = %e, "router transport: inbound connection closed");
                            break;
                        }
                    };
                    let payload = match read_frame(&mut stream).await {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(rank = self_rank, error = %e, "router transport: truncated multipart message");
                            break;
                        }
                    };
                    let _ = header; // only used for logging above/at the source's greeting drain
                    if tx.send(payload).await.is_err() {
                        break;
                    }
                }
            });
        }

        *self.inbox.lock().await = Some(rx);
        debug!(rank = self.rank, "router transport: mesh fully formed");
        Ok(())
    }

    async fn finalize(&self) -> Result<(), TransportError> {
        self.out.lock().await.clear();
        self.inbox.lock().await.take();
        Ok(())
    }

    async fn send(&self, peer: usize, data: Payload) -> Result<(), TransportError> {
        let mut out = self.out.lock().await;
        let stream = out
            .get_mut(&peer)
            .ok_or(TransportError::ConnectionClosed)?;
        write_frame(stream, self.rank.to_string().as_bytes()).await?;
        write_frame(stream, &data).await?;
        debug!(rank = self.rank, peer, bytes = data.len(), "router transport: sent frame");
        Ok(())
    }

    async fn recv(&self) -> Result<Payload, TransportError> {
        let mut guard = self.inbox.lock().await;
        let rx = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn nranks(&self) -> usize {
        self.nranks
    }
}
