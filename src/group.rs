//! Algebraic group the protocol runs in
//!
//! A prime-order subgroup of `Z_p^*`: exponentiations happen modulo `p`, scalars (exponents,
//! Schnorr responses) live modulo `q`.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use thiserror::Error;

use crate::random::{RandomSource, RandomSourceError};

/// How many candidates rejection sampling draws before giving up
pub const SAMPLING_ATTEMPTS_MAX: usize = 256;

/// Group parameters `(p, q, g)`
///
/// Immutable for a session and shared by every participant. Constructors guarantee that
/// `1 < g < p`, `q | p - 1` and `g^q ≡ 1 (mod p)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParameters {
    p: BigUint,
    q: BigUint,
    g: BigUint,
}

impl GroupParameters {
    /// Validates and constructs group parameters
    ///
    /// Primality of `p` and `q` is not checked, parameters are expected to come from a trusted
    /// source.
    pub fn new(p: BigUint, q: BigUint, g: BigUint) -> Result<Self, GroupError> {
        if q.is_zero() || q.is_one() || p <= q {
            return Err(GroupError::OrderOutOfRange);
        }
        if !((&p - 1u32) % &q).is_zero() {
            return Err(GroupError::OrderDoesntDivide);
        }
        if g <= BigUint::one() || g >= p {
            return Err(GroupError::GeneratorOutOfRange);
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(GroupError::GeneratorOrder);
        }
        Ok(Self { p, q, g })
    }

    /// Parses hex-encoded `p`, `q`, `g` and validates them
    pub fn from_hex(p: &str, q: &str, g: &str) -> Result<Self, GroupError> {
        let parse = |name: &'static str, value: &str| {
            BigUint::parse_bytes(value.as_bytes(), 16).ok_or(GroupError::MalformedHex { name })
        };
        Self::new(parse("p", p)?, parse("q", q)?, parse("g", g)?)
    }

    /// 1024-bit MODP group with 160-bit prime order subgroup (RFC 5114, section 2.1)
    pub fn rfc5114_1024_160() -> Self {
        Self {
            p: hex_const(RFC5114_1024_160_P),
            q: hex_const(RFC5114_1024_160_Q),
            g: hex_const(RFC5114_1024_160_G),
        }
    }

    /// Modulus `p`
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// Subgroup order `q`
    pub fn q(&self) -> &BigUint {
        &self.q
    }

    /// Generator `g` of the order-`q` subgroup
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Computes `g^exponent mod p`
    pub fn exp_g(&self, exponent: &BigUint) -> BigUint {
        self.g.modpow(exponent, &self.p)
    }

    /// Computes `base^exponent mod p`
    pub fn exp(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.p)
    }

    /// Computes `a * b mod p`
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    /// Computes `(a - b) mod q` normalized into `[0, q)`
    pub fn scalar_sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = a % &self.q;
        let b = b % &self.q;
        if a >= b {
            a - b
        } else {
            &self.q - (b - a)
        }
    }

    /// Computes `a * b mod q`
    pub fn scalar_mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.q
    }

    /// Checks that `x` is a valid element encoding: `1 <= x < p`
    pub fn is_element(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < &self.p
    }

    /// Samples a uniformly random scalar from `[0, q)`
    ///
    /// Draws `bits(q)` random bits and rejects candidates `>= q`, so the output isn't biased
    /// towards small values the way reducing a wider value would be.
    pub fn random_scalar<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<BigUint, RandomSourceError> {
        let bits = self.q.bits();
        let len = ((bits + 7) / 8) as usize;
        let excess_bits = (len as u64) * 8 - bits;
        let mut buffer = vec![0u8; len];

        for _ in 0..SAMPLING_ATTEMPTS_MAX {
            rng.try_fill(&mut buffer)?;
            buffer[0] &= 0xff >> excess_bits;
            let candidate = BigUint::from_bytes_be(&buffer);
            if candidate < self.q {
                return Ok(candidate);
            }
        }

        Err(RandomSourceError::RejectionSampling {
            attempts: SAMPLING_ATTEMPTS_MAX,
        })
    }
}

fn hex_const(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).unwrap_or_default()
}

const RFC5114_1024_160_P: &str = "B10B8F96A080E01DDE92DE5EAE5D54EC52C99FBCFB06A3C69A6A9DCA52D23B61\
    6073E28675A23D189838EF1E2EE652C013ECB4AEA906112324975C3CD49B83BF\
    ACCBDD7D90C4BD7098488E9C219A73724EFFD6FAE5644738FAA31A4FF55BCCC0\
    A151AF5F0DC8B4BD45BF37DF365C1A65E68CFDA76D4DA708DF1FB2BC2E4A4371";
const RFC5114_1024_160_Q: &str = "F518AA8781A8DF278ABA4E7D64B7CB9D49462353";
const RFC5114_1024_160_G: &str = "A4D1CBD5C3FD34126765A442EFB99905F8104DD258AC507FD6406CFF14266D31\
    266FEA1E5C41564B777E690F5504F213160217B4B01B886A5E91547F9E2749F4\
    D7FBD7D3B9A92EE1909D0D2263F80A76A6A24C087A091F531DBF0A0169B6A28A\
    D662A4D18E73AFA32D779D5918D08BC8858F4DCEF97C2A24855E6EEB22B3B2E5";

/// Group parameters are inconsistent
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// `q` must satisfy `1 < q < p`
    #[error("subgroup order is out of range")]
    OrderOutOfRange,
    /// `q` must divide `p - 1`
    #[error("subgroup order doesn't divide p - 1")]
    OrderDoesntDivide,
    /// `g` must satisfy `1 < g < p`
    #[error("generator is out of range")]
    GeneratorOutOfRange,
    /// `g^q` must be `1 mod p`
    #[error("generator doesn't generate a subgroup of order q")]
    GeneratorOrder,
    /// Parameter isn't a valid hex string
    #[error("parameter `{name}` is not a valid hex string")]
    MalformedHex {
        /// Name of the parameter: `p`, `q` or `g`
        name: &'static str,
    },
}

#[cfg(test)]
pub(crate) mod tests {
    use matches::assert_matches;
    use num_bigint::BigUint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::{GroupError, GroupParameters};
    use crate::random::{tests::FlakyRng, RandomSourceError, RANDOMNESS_RETRY_MAX};

    /// Safe-prime group `p = 2q + 1` with a 62-bit `q`, small enough to reason about in tests
    pub fn toy_group() -> GroupParameters {
        GroupParameters::from_hex("40000000000019c3", "2000000000000ce1", "4").unwrap()
    }

    #[test]
    fn builtin_group_is_valid() {
        let group = GroupParameters::rfc5114_1024_160();
        let validated =
            GroupParameters::new(group.p().clone(), group.q().clone(), group.g().clone()).unwrap();
        assert_eq!(group, validated);
        assert_eq!(group.p().bits(), 1024);
        assert_eq!(group.q().bits(), 160);
    }

    #[test]
    fn inconsistent_parameters_are_rejected() {
        // 2 is a quadratic non-residue mod p, so its order is 2q
        assert_matches!(
            GroupParameters::from_hex("40000000000019c3", "2000000000000ce1", "2"),
            Err(GroupError::GeneratorOrder)
        );
        assert_matches!(
            GroupParameters::from_hex("40000000000019c3", "2000000000000ce1", "1"),
            Err(GroupError::GeneratorOutOfRange)
        );
        assert_matches!(
            GroupParameters::from_hex("40000000000019c3", "2000000000000ce3", "4"),
            Err(GroupError::OrderDoesntDivide)
        );
        assert_matches!(
            GroupParameters::from_hex("40000000000019c3", "xyz", "4"),
            Err(GroupError::MalformedHex { name: "q" })
        );
    }

    #[test]
    fn scalar_sub_wraps_around() {
        let group = toy_group();
        let q = group.q().clone();
        let d = group.scalar_sub(&BigUint::from(3u8), &BigUint::from(5u8));
        assert_eq!(d, &q - 2u32);
        assert_eq!(group.scalar_sub(&BigUint::from(5u8), &BigUint::from(3u8)), BigUint::from(2u8));
    }

    #[test]
    fn random_scalars_are_in_range() {
        let group = toy_group();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..200 {
            let x = group.random_scalar(&mut rng).unwrap();
            assert!(&x < group.q());
        }
    }

    #[test]
    fn random_scalar_propagates_source_failure() {
        let group = toy_group();
        let mut rng = FlakyRng {
            failures: RANDOMNESS_RETRY_MAX,
        };
        assert_matches!(
            group.random_scalar(&mut rng),
            Err(RandomSourceError::Exhausted { .. })
        );
    }

    #[test]
    fn random_scalar_gives_up_on_constant_source() {
        // q = 2^8 + 1 needs 9 bits; an all-ones source always yields 511 >= q
        let group = GroupParameters {
            p: BigUint::from(515u32),
            q: BigUint::from(257u32),
            g: BigUint::from(4u8),
        };
        let mut rng = ConstantRng(0xFF);
        assert_matches!(
            group.random_scalar(&mut rng),
            Err(RandomSourceError::RejectionSampling { .. })
        );
    }

    struct ConstantRng(u8);

    impl rand::RngCore for ConstantRng {
        fn next_u32(&mut self) -> u32 {
            u32::from_le_bytes([self.0; 4])
        }
        fn next_u64(&mut self) -> u64 {
            u64::from_le_bytes([self.0; 8])
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0)
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl rand::CryptoRng for ConstantRng {}
}
