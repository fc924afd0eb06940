//! # Point-to-Point Transport
//!
//! This module defines the [`Transport`] capability trait and its three
//! implementations, which together realize the capability set spec.md
//! specifies of the underlying (ZeroMQ-style) wire layer without binding
//! to it directly — see `SPEC_FULL.md` §1 for why this crate implements
//! that capability set over `tokio::net::TcpStream` rather than an FFI
//! binding absent from the rest of this crate's dependency stack.
//!
//! ## Implementations
//!
//! - [`basic::BasicTransport`] — bidirectional PAIR analogue, no retry
//!   budget, suitable for quiet networks and tests only.
//! - [`retrying::RetryingTransport`] — one-way PUSH/PULL analogue with
//!   bounded exponential backoff.
//! - [`router::RouterTransport`] — ROUTER/ROUTER rendezvous mesh, built
//!   once at `initialize()` and reused for every subsequent call.
//!
//! All three share the same per-call lifecycle — acquire an endpoint,
//! transfer one frame, release it on every exit path — and the same
//! [`frame::read_frame`]/[`frame::write_frame`] wire format.

pub mod basic;
pub mod frame;
pub mod retrying;
pub mod router;

use async_trait::async_trait;

use crate::error::TransportError;

/// Opaque application payload. The transport never inspects its structure;
/// the collectives layer is the only code that knows what the bytes mean.
pub type Payload = Vec<u8>;

/// Capability every collective algorithm needs from a peer-to-peer
/// transport: send one message to a named rank, receive the next message
/// addressed to this rank, and a lifecycle to acquire/release whatever
/// connections that requires.
///
/// Expressed as a trait rather than a base class per spec.md §9 — the
/// `Collectives` layer is generic over any `Transport` implementation and
/// is oblivious to which flavour is in use.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire whatever long-lived resources this flavour needs before the
    /// first `send`/`recv` (a no-op for the per-call flavours, mesh setup
    /// for [`router::RouterTransport`]).
    async fn initialize(&self) -> Result<(), TransportError>;

    /// Release whatever `initialize` acquired.
    async fn finalize(&self) -> Result<(), TransportError>;

    /// Send `data` to `peer`. Blocks (asynchronously) until the transport
    /// considers the message delivered, subject to each flavour's own
    /// retry/backoff policy.
    async fn send(&self, peer: usize, data: Payload) -> Result<(), TransportError>;

    /// Block until the next message addressed to this rank arrives, and
    /// return it.
    async fn recv(&self) -> Result<Payload, TransportError>;

    /// This process's rank.
    fn rank(&self) -> usize;

    /// The total number of ranks in the world.
    fn nranks(&self) -> usize;
}
