//! # Collectives-RS
//!
//! SPMD collective communication: binomial-tree `broadcast`, `reduce`,
//! `barrier`, `gather`, `scatter`, and `scan`, generic over a pluggable
//! point-to-point [`transport::Transport`]. Process launch and rendezvous
//! (how ranks, addresses, and world size come to exist) are external to
//! this crate; [`params::Params`] consumes them from environment
//! variables, and everything above that layer only ever talks to the
//! `Transport` trait.

pub mod backoff;
pub mod collectives;
pub mod error;
pub mod logging;
pub mod params;
pub mod transport;

pub use backoff::{Backoff, BackoffOutcome};
pub use collectives::{Collectives, CollectivesScope};
pub use error::{CollectivesError, ConfigError, TransportError};
pub use params::Params;
pub use transport::Transport;

/// The current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
