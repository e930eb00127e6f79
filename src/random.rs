//! Source of randomness
//!
//! The protocol draws nonces and scalars from a [`RandomSource`]. Any cryptographically secure
//! [`RngCore`] is a random source. Failures of the underlying entropy source are retried a small,
//! bounded number of times and then reported as [`RandomSourceError`]: a session never proceeds on
//! a degraded source.

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use tracing::warn;

use crate::hash::{HashValue, HASH_SIZE};

/// How many times a failing entropy source is asked again before giving up
pub const RANDOMNESS_RETRY_MAX: usize = 3;

/// Produces uniformly random bytes
///
/// Implemented for every `RngCore + CryptoRng`. Each protocol participant owns its own source, so
/// implementations don't need to be thread-safe.
pub trait RandomSource {
    /// Fills `dest` with random bytes
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), RandomSourceError>;

    /// Returns `HASH_SIZE` random bytes
    fn random_hash_value(&mut self) -> Result<HashValue, RandomSourceError> {
        let mut bytes = [0u8; HASH_SIZE];
        self.try_fill(&mut bytes)?;
        Ok(HashValue::from_bytes(bytes))
    }

    /// Returns `n` random bytes
    fn random_bytes(&mut self, n: usize) -> Result<Vec<u8>, RandomSourceError> {
        let mut bytes = vec![0u8; n];
        self.try_fill(&mut bytes)?;
        Ok(bytes)
    }
}

impl<R: RngCore + CryptoRng> RandomSource for R {
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), RandomSourceError> {
        let mut attempt = 1;
        loop {
            match self.try_fill_bytes(dest) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < RANDOMNESS_RETRY_MAX => {
                    warn!(attempt, %err, "entropy source failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RandomSourceError::Exhausted {
                        attempts: attempt,
                        source: err,
                    })
                }
            }
        }
    }
}

/// Randomness source failed
#[derive(Debug, Error)]
pub enum RandomSourceError {
    /// Entropy source kept failing
    #[error("entropy source failed {attempts} times in a row")]
    Exhausted {
        /// How many times the source was asked
        attempts: usize,
        /// Error of the last attempt
        #[source]
        source: rand::Error,
    },
    /// Rejection sampling couldn't find a value in range
    ///
    /// Practically unreachable with a working source, as every attempt succeeds with probability
    /// at least 1/2.
    #[error("rejection sampling didn't produce a value in range after {attempts} attempts")]
    RejectionSampling {
        /// How many candidates were drawn
        attempts: usize,
    },
}
