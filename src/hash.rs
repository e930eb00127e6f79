//! Fixed-width hash values
//!
//! Every commitment, chain tag, session id, session key and session confirmation in the protocol
//! is exactly one SHA-256 output wide. [`HashValue`] is that output, with XOR defined on it so the
//! circular Diffie-Hellman chain can be unwound with plain operators.

use std::fmt;
use std::ops::{BitXor, BitXorAssign};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Size of the hash output in bytes
pub const HASH_SIZE: usize = 32;

/// Output of the protocol hash function (SHA-256)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HashValue([u8; HASH_SIZE]);

impl HashValue {
    /// All-zero value, the expected XOR-sum of an honest chain
    pub const ZERO: Self = Self([0u8; HASH_SIZE]);

    /// Wraps raw bytes
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Hashes `data`
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hashes big-endian magnitude of `value`
    ///
    /// Used for pairwise Diffie-Hellman secrets: `H(y^x mod p)`.
    pub fn digest_integer(value: &BigUint) -> Self {
        Self::digest(value.to_bytes_be())
    }

    /// Returns underlying bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Checks whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Interprets the value as a big-endian integer and reduces it modulo `modulus`
    pub fn reduce(&self, modulus: &BigUint) -> BigUint {
        BigUint::from_bytes_be(&self.0) % modulus
    }
}

impl From<sha2::digest::Output<Sha256>> for HashValue {
    fn from(output: sha2::digest::Output<Sha256>) -> Self {
        Self(output.into())
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl BitXorAssign for HashValue {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0.iter_mut().zip(rhs.0).for_each(|(x, y)| *x ^= y);
    }
}

impl BitXorAssign<&HashValue> for HashValue {
    fn bitxor_assign(&mut self, rhs: &HashValue) {
        *self ^= *rhs
    }
}

impl BitXor for HashValue {
    type Output = HashValue;

    fn bitxor(mut self, rhs: Self) -> Self::Output {
        self ^= rhs;
        self
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", hex::encode(self.0))
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
