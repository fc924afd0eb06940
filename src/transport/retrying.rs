//! # Retrying Transport — One-Way PUSH/PULL Analogue
//!
//! Mirrors the source's `TcpBackend`: a fresh [`Backoff`] per `send`/`recv`
//! call, and a poll-with-timeout loop in place of the source's `Poller`
//! registration on `POLLOUT`/`POLLIN` — `tokio::time::timeout` around the
//! I/O future plays exactly that role, since tokio's TCP primitives are
//! already non-blocking. Option intent (`IMMEDIATE`, `LINGER=-1`,
//! `DELAY_ATTACH_ON_CONNECT`, unbounded `SNDHWM`/`RCVHWM`) is carried as
//! `TCP_NODELAY` plus "frame one message per call, never queue a backlog
//! within a single transport instance" — TCP has no direct analogue for
//! the rest, and this crate's framing already bounds a single logical
//! message to one frame.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::frame::{read_frame, write_frame};
use super::{Payload, Transport};
use crate::backoff::{Backoff, BackoffOutcome};
use crate::error::TransportError;
use crate::params::Params;

/// One-way, backoff-bounded transport. Each `send`/`recv` call owns its own
/// [`Backoff`] and endpoint; nothing is shared or reused across calls.
pub struct RetryingTransport {
    rank: usize,
    nranks: usize,
    addresses: Vec<String>,
    backoff_retries: u32,
    backoff_amt_s: f64,
    poll_itvl_ms: Option<u64>,
}

impl RetryingTransport {
    /// Build a retrying transport from a resolved [`Params`] snapshot.
    pub fn new(params: &Params) -> Self {
        Self {
            rank: params.rank(),
            nranks: params.nranks(),
            addresses: params.addresses().to_vec(),
            backoff_retries: params.backoff_retries(),
            backoff_amt_s: params.backoff_amt_s(),
            poll_itvl_ms: params.poll_itvl_ms(),
        }
    }

    fn new_backoff(&self) -> Backoff {
        Backoff::new(self.backoff_retries, self.backoff_amt_s)
    }

    /// Cap a backoff-derived delay at `poll_itvl_ms` when the caller asked
    /// for a tighter poll granularity than the raw backoff series.
    fn bound(&self, delay: Duration) -> Duration {
        match self.poll_itvl_ms {
            Some(ms) => delay.min(Duration::from_millis(ms)),
            None => delay,
        }
    }
}

#[async_trait]
impl Transport for RetryingTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn finalize(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, peer: usize, data: Payload) -> Result<(), TransportError> {
        let mut backoff = self.new_backoff();
        let mut stream: Option<TcpStream> = None;

        loop {
            let delay = match backoff.next() {
                BackoffOutcome::Delay(d) => self.bound(d),
                BackoffOutcome::Exhausted => {
                    warn!(rank = self.rank, peer, "retrying transport: send backoff exceeded");
                    return Err(TransportError::BackoffExceeded);
                }
            };

            if stream.is_none() {
                match TcpStream::connect(&self.addresses[peer]).await {
                    Ok(mut s) => {
                        s.set_nodelay(true)?;
                        stream = Some(s);
                    }
                    Err(e) => {
                        debug!(rank = self.rank, peer, error = %e, "retrying transport: connect failed");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }

            let s = stream.as_mut().expect("stream established above");
            match timeout(delay, write_frame(s, &data)).await {
                Ok(Ok(())) => {
                    debug!(rank = self.rank, peer, bytes = data.len(), "retrying transport: sent frame");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(rank = self.rank, peer, error = %e, "retrying transport: send error, reconnecting");
                    stream = None;
                    tokio::time::sleep(delay).await;
                }
                Err(_elapsed) => {
                    debug!(rank = self.rank, peer, ?delay, "retrying transport: send poll timed out");
                }
            }
        }
    }

    async fn recv(&self) -> Result<Payload, TransportError> {
        let mut backoff = self.new_backoff();
        let listener = TcpListener::bind(&self.addresses[self.rank]).await?;

        loop {
            let delay = match backoff.next() {
                BackoffOutcome::Delay(d) => self.bound(d),
                BackoffOutcome::Exhausted => {
                    warn!(rank = self.rank, "retrying transport: recv backoff exceeded");
                    return Err(TransportError::BackoffExceeded);
                }
            };

            match timeout(delay, listener.accept()).await {
                Ok(Ok((mut stream, peer_addr))) => {
                    debug!(rank = self.rank, %peer_addr, "retrying transport: accepted connection");
                    return read_frame(&mut stream).await;
                }
                Ok(Err(e)) => {
                    debug!(rank = self.rank, error = %e, "retrying transport: accept error");
                    tokio::time::sleep(delay).await;
                }
                Err(_elapsed) => {
                    debug!(rank = self.rank, ?delay, "retrying transport: recv poll timed out");
                }
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
