//! # Crate-Wide Error Taxonomy
//!
//! This module defines the error types that flow through every layer of the
//! collectives library: configuration parsing, point-to-point transport, and
//! the collective algorithms built on top of them. Each layer gets its own
//! `thiserror`-derived enum rather than a single flattened type, because
//! callers legitimately need to match on "did the environment fail to parse"
//! versus "did a send time out" versus "did the backoff budget run out" —
//! these require different recovery strategies (fail fast at startup, retry,
//! tear the world down).
//!
//! ## Layering
//!
//! - [`ConfigError`] — fatal at [`crate::params::Params::from_env`] time.
//! - [`TransportError`] — returned by every [`crate::transport::Transport`]
//!   method; recoverable up to a retry budget in the retrying flavours,
//!   unrecoverable (logged and retried forever) in the basic flavour.
//! - [`CollectivesError`] — the top-level error returned by
//!   [`crate::collectives::Collectives`] methods, composing the two above
//!   plus [`CollectivesError::ProtocolViolation`] for malformed payloads.
//!
//! Binaries built on this crate (see `src/bin/collectives_demo.rs`) compose
//! these under `anyhow::Result` at their boundary, the same layering the
//! teacher crate uses between its typed `IpcTransport` errors and
//! `main.rs`'s `anyhow::Result`.

use std::num::ParseIntError;

/// Errors raised while building [`crate::params::Params`] from the process
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable `{0}`")]
    MissingVar(&'static str),

    /// An environment variable was set but could not be parsed as an integer.
    #[error("environment variable `{var}` could not be parsed as an integer")]
    InvalidInt {
        var: &'static str,
        #[source]
        source: ParseIntError,
    },

    /// An environment variable was set but could not be parsed as a float.
    #[error("environment variable `{var}` could not be parsed as a float")]
    InvalidFloat {
        var: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// `PYZMQCOLLECTIVES_ADDRESSES` did not contain exactly `nranks` entries.
    #[error("address table has {got} entries but nranks is {expected}")]
    AddressCountMismatch { expected: usize, got: usize },

    /// `rank >= nranks`.
    #[error("rank {rank} is out of range for a world of {nranks} ranks")]
    RankOutOfRange { rank: usize, nranks: usize },

    /// `nranks` is zero, or not a power of two.
    ///
    /// The algorithms in [`crate::collectives`] assume a power-of-two world
    /// size (spec Open Question #3); rather than walking an over-stepped
    /// tree with undefined behavior, we reject the configuration up front.
    #[error("nranks must be a power of two greater than zero, got {0}")]
    InvalidNranks(usize),
}

/// Errors raised by a single [`crate::transport::Transport::send`] or
/// [`crate::transport::Transport::recv`] call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying TCP I/O failed.
    #[error("transport I/O error")]
    Io(#[from] std::io::Error),

    /// The retry budget configured on [`crate::params::Params`] was
    /// exhausted before the operation completed.
    #[error("backoff retry budget exceeded")]
    BackoffExceeded,

    /// A frame's declared length exceeded the configured maximum.
    #[error("frame of {len} bytes exceeds the maximum frame size")]
    FrameTooLarge { len: u32 },

    /// The peer closed the connection before a full frame was read.
    #[error("connection closed before a full frame was received")]
    ConnectionClosed,

    /// The address table entry for a rank could not be parsed as a socket
    /// address.
    #[error("address `{addr}` for rank {rank} is not a valid socket address")]
    InvalidAddress {
        rank: usize,
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// The top-level error type returned by [`crate::collectives::Collectives`]
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum CollectivesError {
    /// Configuration failed before any collective could run.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport failed (including, in its `BackoffExceeded` form,
    /// permanent failure of an unreachable peer).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload decoded to a shape the algorithm did not expect — a
    /// rank drifted out of step with its peers. The spec notes this is
    /// the only failure mode that manifests as something other than a
    /// hang; we raise it instead of panicking on a malformed decode.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A value failed to serialize or deserialize with `bincode`.
    #[error("payload codec error")]
    Codec(#[from] bincode::Error),
}
