//! # World Topology Snapshot
//!
//! [`Params`] is an immutable snapshot of the SPMD world: this process's
//! rank, the total number of ranks, the address table indexed by rank, and
//! the backoff tuning used by the retrying transport flavours. Process
//! launch and rendezvous (how ranks, addresses, and world size come to
//! exist) are external to this crate — they are injected via environment
//! variables, matching the source's `BasicParams`/`Params` split.

use std::env;

use crate::error::ConfigError;

const ENV_RANK: &str = "PYZMQCOLLECTIVES_RANK";
const ENV_NRANKS: &str = "PYZMQCOLLECTIVES_NRANKS";
const ENV_ADDRESSES: &str = "PYZMQCOLLECTIVES_ADDRESSES";

const DEFAULT_BACKOFF_RETRIES: u32 = 1000;
const DEFAULT_BACKOFF_AMT_S: f64 = 0.01;

/// Immutable snapshot of world topology and retry tuning.
///
/// Constructed once via [`Params::from_env`] and then shared (by reference
/// or by cloning the cheap scalar/`Vec<String>` fields) across every
/// transport and collective call for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Params {
    rank: usize,
    nranks: usize,
    addresses: Vec<String>,
    backoff_retries: u32,
    backoff_amt_s: f64,
    poll_itvl_ms: Option<u64>,
}

impl Params {
    /// Build a [`Params`] directly, validating the same invariants
    /// [`Params::from_env`] enforces. Exposed for tests and for embedders
    /// that already have topology information from a source other than
    /// the environment.
    pub fn new(
        rank: usize,
        nranks: usize,
        addresses: Vec<String>,
        backoff_retries: u32,
        backoff_amt_s: f64,
        poll_itvl_ms: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if nranks == 0 || !nranks.is_power_of_two() {
            return Err(ConfigError::InvalidNranks(nranks));
        }
        if addresses.len() != nranks {
            return Err(ConfigError::AddressCountMismatch {
                expected: nranks,
                got: addresses.len(),
            });
        }
        if rank >= nranks {
            return Err(ConfigError::RankOutOfRange { rank, nranks });
        }

        let params = Self {
            rank,
            nranks,
            addresses,
            backoff_retries,
            backoff_amt_s,
            poll_itvl_ms,
        };
        tracing::debug!(
            rank = params.rank,
            nranks = params.nranks,
            address_count = params.addresses.len(),
            "resolved collectives world parameters"
        );
        Ok(params)
    }

    /// Build a [`Params`] from `PYZMQCOLLECTIVES_RANK`,
    /// `PYZMQCOLLECTIVES_NRANKS`, and `PYZMQCOLLECTIVES_ADDRESSES`, with
    /// the extended backoff knobs at their defaults
    /// (`backoff_retries = 1000`, `backoff_amt_s = 0.01`,
    /// `poll_itvl_ms = None`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let rank = read_usize(ENV_RANK)?;
        let nranks = read_usize(ENV_NRANKS)?;
        let addresses: Vec<String> = read_required(ENV_ADDRESSES)?
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        Self::new(
            rank,
            nranks,
            addresses,
            DEFAULT_BACKOFF_RETRIES,
            DEFAULT_BACKOFF_AMT_S,
            None,
        )
    }

    /// This process's rank in `[0, nranks)`.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The total number of ranks in the world.
    pub fn nranks(&self) -> usize {
        self.nranks
    }

    /// The address table, indexed by rank.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// This rank's own bind address.
    pub fn own_address(&self) -> &str {
        &self.addresses[self.rank]
    }

    /// The retry budget handed to each [`crate::backoff::Backoff`]
    /// constructed by the retrying transport flavours.
    pub fn backoff_retries(&self) -> u32 {
        self.backoff_retries
    }

    /// The base backoff delay, in seconds.
    pub fn backoff_amt_s(&self) -> f64 {
        self.backoff_amt_s
    }

    /// The poll timeout, in milliseconds, used by the retrying transport
    /// when a caller wants a tighter bound than the backoff delay itself.
    pub fn poll_itvl_ms(&self) -> Option<u64> {
        self.poll_itvl_ms
    }

    /// Return a copy of this `Params` with the given backoff tuning.
    pub fn with_backoff(mut self, retries: u32, amt_s: f64) -> Self {
        self.backoff_retries = retries;
        self.backoff_amt_s = amt_s;
        self
    }
}

fn read_required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn read_usize(var: &'static str) -> Result<usize, ConfigError> {
    read_required(var)?
        .parse::<usize>()
        .map_err(|source| ConfigError::InvalidInt { var, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("127.0.0.1:{}", 30000 + i)).collect()
    }

    #[test]
    fn accepts_a_well_formed_power_of_two_world() {
        let p = Params::new(1, 4, addrs(4), 1000, 0.01, None).unwrap();
        assert_eq!(p.rank(), 1);
        assert_eq!(p.nranks(), 4);
        assert_eq!(p.own_address(), "127.0.0.1:30001");
    }

    #[test]
    fn rejects_rank_out_of_range() {
        let err = Params::new(4, 4, addrs(4), 1000, 0.01, None).unwrap_err();
        assert!(matches!(err, ConfigError::RankOutOfRange { rank: 4, nranks: 4 }));
    }

    #[test]
    fn rejects_address_count_mismatch() {
        let err = Params::new(0, 4, addrs(3), 1000, 0.01, None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AddressCountMismatch { expected: 4, got: 3 }
        ));
    }

    #[test]
    fn rejects_non_power_of_two_nranks() {
        let err = Params::new(0, 3, addrs(3), 1000, 0.01, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNranks(3)));
    }

    #[test]
    fn rejects_zero_nranks() {
        let err = Params::new(0, 0, vec![], 1000, 0.01, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNranks(0)));
    }

    #[test]
    fn from_env_reports_missing_variable() {
        // SAFETY (test-only): these are process-global env vars, but tests
        // run in a single-threaded harness for this module by default and
        // nothing else in this test file mutates them concurrently.
        env::remove_var(ENV_RANK);
        env::remove_var(ENV_NRANKS);
        env::remove_var(ENV_ADDRESSES);

        let err = Params::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_RANK)));
    }
}
