//! Long-term signing keys
//!
//! Every participant holds a long-term Schnorr keypair `(sk, pk = g^sk)`. Public keys are assumed
//! to be distributed before the session by a PKI, the protocol never derives them.

use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::group::GroupParameters;
use crate::random::{RandomSource, RandomSourceError};

/// Long-term public key `pk = g^sk mod p`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub BigUint);

/// Long-term keypair
#[derive(Clone)]
pub struct KeyPair {
    secret: BigUint,
    public: PublicKey,
}

impl KeyPair {
    /// Samples a fresh keypair
    pub fn generate<R: RandomSource + ?Sized>(
        group: &GroupParameters,
        rng: &mut R,
    ) -> Result<Self, RandomSourceError> {
        let secret = group.random_scalar(rng)?;
        Ok(Self::from_secret_unchecked(group, secret))
    }

    /// Imports an existing secret scalar
    ///
    /// Returns `None` if `secret` is not in `[0, q)`.
    pub fn from_secret(group: &GroupParameters, secret: BigUint) -> Option<Self> {
        if &secret >= group.q() {
            return None;
        }
        Some(Self::from_secret_unchecked(group, secret))
    }

    fn from_secret_unchecked(group: &GroupParameters, secret: BigUint) -> Self {
        let public = PublicKey(group.exp_g(&secret));
        Self { secret, public }
    }

    /// Public part of the keypair
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &BigUint {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
