//! # Basic Transport — Bidirectional PAIR Analogue
//!
//! Mirrors the source's `TcpBackend`-less `BasicTcpBackend`: no retry
//! budget, reconnect-and-retry forever on failure, and a single frame
//! exchanged per `send`/`recv` call. There is no long-lived connection
//! state — every call acquires a fresh socket, transfers one frame, and
//! releases it.
//!
//! ## The inverted-retry-condition quirk (spec Open Question #4)
//!
//! The Python source's `send` loop only stops retrying once the
//! underlying `send_pyobj` call returns a value the loop treats as
//! success (`rc != None` reconnects and retries; only an implicit `None`
//! return falls through to `cont = False`), which in practice means any
//! call that doesn't raise keeps looping — a likely bug, not a feature.
//! A literal port (loop forever even after a successful write) would make
//! every `send` hang, which is not a behavior this crate can ship. What we
//! preserve is the *spirit* of the quirk the spec asks for: no bounded
//! retry budget, and failure is handled by blind reconnect-and-retry
//! rather than a backoff schedule — that is what makes this flavour "only
//! suitable for small test deployments" (spec.md §4.3). The corrected,
//! budgeted behavior lives in [`crate::transport::retrying`].
//!
//! This transport is unsuitable for anything but quiet networks or tests:
//! it never gives up on a `send`, and `recv` surfaces errors rather than
//! hanging, which the source's "log and return `None`" behavior could
//! not express in Rust's typed `Result` world (see `DESIGN.md`).

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use super::frame::{read_frame, write_frame};
use super::{Payload, Transport};
use crate::error::TransportError;
use crate::params::Params;

/// Bidirectional, per-call transport with unbounded reconnect-and-retry on
/// failure and no retry budget.
pub struct BasicTransport {
    rank: usize,
    nranks: usize,
    addresses: Vec<String>,
}

impl BasicTransport {
    /// Build a basic transport from a resolved [`Params`] snapshot.
    pub fn new(params: &Params) -> Self {
        Self {
            rank: params.rank(),
            nranks: params.nranks(),
            addresses: params.addresses().to_vec(),
        }
    }

    async fn connect(&self, peer: usize) -> Result<TcpStream, TransportError> {
        TcpStream::connect(&self.addresses[peer]).await.map_err(TransportError::Io)
    }
}

#[async_trait]
impl Transport for BasicTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn finalize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, peer: usize, data: Payload) -> Result<(), TransportError> {
        loop {
            let mut stream = match self.connect(peer).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(rank = self.rank, peer, error = %e, "basic transport: connect failed, retrying");
                    continue;
                }
            };

            match write_frame(&mut stream, &data).await {
                Ok(()) => {
                    debug!(rank = self.rank, peer, bytes = data.len(), "basic transport: sent frame");
                    return Ok(());
                }
                Err(e) => {
                    warn!(rank = self.rank, peer, error = %e, "basic transport: send failed, reconnecting");
                    continue;
                }
            }
        }
    }

    async fn recv(&self) -> Result<Payload, TransportError> {
        let listener = TcpListener::bind(&self.addresses[self.rank]).await?;
        let (mut stream, peer_addr) = listener.accept().await?;
        debug!(rank = self.rank, %peer_addr, "basic transport: accepted connection");

        match read_frame(&mut stream).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                warn!(rank = self.rank, error = %e, "basic transport: recv failed");
                Err(e)
            }
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn nranks(&self) -> usize {
        self.nranks
    }
}
