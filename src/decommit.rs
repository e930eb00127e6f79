//! Unwinding the Diffie-Hellman chain
//!
//! In round 3 every party `j` publishes `t_j = S(j-1, j) ^ S(j, j+1)` and
//! `enc_k_j = k_j ^ S(j, j+1)`, where `S(a, b) = H(g^(x_a x_b))` is the secret shared by ring
//! neighbors `a` and `b`. Tags of the whole ring telescope to zero, and XOR-ing the tags of a
//! contiguous arc leaves only the two secrets at its ends. A verifier knows exactly one of them,
//! the one shared with its right neighbor, which is enough to peel `enc_k` of any other party.

use crate::delivery::PartyIndex;
use crate::errors::IntegrityViolation;
use crate::hash::HashValue;
use crate::messages::ChainMsg;
use crate::roster::Roster;

/// XOR of all chain tags, in roster order
pub fn chain_sum(chains: &Roster<ChainMsg>) -> HashValue {
    chains
        .iter()
        .fold(HashValue::ZERO, |acc, chain| acc ^ chain.t)
}

/// Checks that chain tags of all parties sum up to zero
///
/// Necessary but not sufficient: a failure says the ring was tampered with, but not where.
/// [`Decommitment::verify`] localizes the fault.
pub fn check_chain_sum(chains: &Roster<ChainMsg>) -> Result<(), IntegrityViolation> {
    if chain_sum(chains).is_zero() {
        Ok(())
    } else {
        Err(IntegrityViolation::NonZeroChainSum)
    }
}

/// Recovers nonces of other parties from the point of view of `verifier`
pub struct Decommitment<'a> {
    chains: &'a Roster<ChainMsg>,
    verifier: PartyIndex,
    right_secret: &'a HashValue,
}

impl<'a> Decommitment<'a> {
    /// Constructs decommitment for `verifier`
    ///
    /// `right_secret` is `H(y_{verifier+1}^x_verifier)`, the secret the verifier shares with its
    /// right neighbor.
    pub fn new(
        chains: &'a Roster<ChainMsg>,
        verifier: PartyIndex,
        right_secret: &'a HashValue,
    ) -> Self {
        Self {
            chains,
            verifier,
            right_secret,
        }
    }

    /// Reconstructs nonce `k` of `target`
    ///
    /// Starts from `enc_k` of target and walks the ring leftwards, `target, target-1, ...`, up to
    /// but excluding the verifier, folding in every tag on the way and the verifier's own secret
    /// once the walk reaches the verifier's right neighbor. The result equals `k_target` iff every
    /// value on the path was computed honestly.
    ///
    /// Returns `None` if `target` or the verifier is not in the roster.
    pub fn recover_nonce(&self, target: PartyIndex) -> Option<HashValue> {
        if self.verifier >= self.chains.len() {
            return None;
        }
        let mut acc = self.chains.get(target)?.enc_k;
        if target == self.verifier {
            return Some(acc ^ *self.right_secret);
        }

        let right = self.chains.right_of(self.verifier);
        for j in self.chains.walk_left(target, self.verifier) {
            if j == right {
                acc ^= self.right_secret;
            }
            acc ^= &self.chains[j].t;
        }
        Some(acc)
    }

    /// Checks that nonce of `target` matches its round 1 commitment `h_k`
    ///
    /// Returns `false` if `target` is not in the roster.
    pub fn verify(&self, target: PartyIndex, h_k: &HashValue) -> bool {
        self.recover_nonce(target)
            .map_or(false, |k| HashValue::digest(k) == *h_k)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::{check_chain_sum, chain_sum, Decommitment};
    use crate::errors::IntegrityViolation;
    use crate::group::tests::toy_group;
    use crate::hash::HashValue;
    use crate::messages::ChainMsg;
    use crate::random::RandomSource;
    use crate::roster::Roster;

    struct Ring {
        k: Vec<HashValue>,
        right_secrets: Vec<HashValue>,
        chains: Roster<ChainMsg>,
    }

    impl Ring {
        fn honest(n: usize, seed: u64) -> Self {
            let group = toy_group();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let k: Vec<HashValue> = (0..n)
                .map(|_| rng.random_hash_value().unwrap())
                .collect();
            let x: Vec<BigUint> = (0..n)
                .map(|_| group.random_scalar(&mut rng).unwrap())
                .collect();
            let y: Vec<BigUint> = x.iter().map(|x| group.exp_g(x)).collect();

            let shared = |a: usize, b: usize| HashValue::digest_integer(&group.exp(&y[b], &x[a]));
            let right_secrets: Vec<_> = (0..n).map(|j| shared(j, (j + 1) % n)).collect();
            let chains = (0..n)
                .map(|j| {
                    let left_secret = shared(j, (j + n - 1) % n);
                    ChainMsg {
                        enc_k: k[j] ^ right_secrets[j],
                        t: left_secret ^ right_secrets[j],
                    }
                })
                .collect();

            Ring {
                k,
                right_secrets,
                chains: Roster::new(chains).unwrap(),
            }
        }

        fn decommitment(&self, verifier: u16) -> Decommitment<'_> {
            Decommitment::new(
                &self.chains,
                verifier,
                &self.right_secrets[usize::from(verifier)],
            )
        }

        fn verify(&self, verifier: u16, target: u16) -> bool {
            let h_k = HashValue::digest(self.k[usize::from(target)]);
            self.decommitment(verifier).verify(target, &h_k)
        }

        fn n(&self) -> u16 {
            self.chains.len()
        }
    }

    #[test]
    fn honest_chain_sums_to_zero() {
        for n in 3..=7 {
            let ring = Ring::honest(n, n as u64);
            assert!(chain_sum(&ring.chains).is_zero());
            assert_eq!(check_chain_sum(&ring.chains), Ok(()));
        }
    }

    #[test]
    fn every_pair_verifies_when_honest() {
        for n in 3..=6 {
            let ring = Ring::honest(n, 100 + n as u64);
            for verifier in 0..ring.n() {
                for target in 0..ring.n() {
                    assert_eq!(
                        ring.decommitment(verifier).recover_nonce(target),
                        Some(ring.k[usize::from(target)]),
                        "verifier={verifier} target={target}"
                    );
                }
            }
        }
    }

    #[test]
    fn tampered_tag_breaks_chain_sum_and_paths_through_it() {
        let mut ring = Ring::honest(5, 7);
        let tampered = 2;
        let mut t = *ring.chains[tampered].t.as_bytes();
        t[0] ^= 1;
        ring.chains.get_mut(tampered).unwrap().t = HashValue::from_bytes(t);

        assert_eq!(
            check_chain_sum(&ring.chains),
            Err(IntegrityViolation::NonZeroChainSum)
        );
        for verifier in 0..ring.n() {
            for target in 0..ring.n() {
                let path_crosses = target != verifier
                    && ring
                        .chains
                        .walk_left(target, verifier)
                        .any(|j| j == tampered);
                assert_eq!(
                    ring.verify(verifier, target),
                    !path_crosses,
                    "verifier={verifier} target={target}"
                );
            }
        }
    }

    #[test]
    fn tampered_ciphertext_only_fails_its_own_decommitment() {
        let mut ring = Ring::honest(4, 11);
        let tampered = 1;
        let mut enc_k = *ring.chains[tampered].enc_k.as_bytes();
        enc_k[31] ^= 0x80;
        ring.chains.get_mut(tampered).unwrap().enc_k = HashValue::from_bytes(enc_k);

        assert_eq!(check_chain_sum(&ring.chains), Ok(()));
        for verifier in 0..ring.n() {
            for target in 0..ring.n() {
                let expected = target != tampered || verifier == tampered;
                // the tampering party knows its own nonce, it only fools others
                let ok = if verifier == target {
                    true
                } else {
                    ring.verify(verifier, target)
                };
                assert_eq!(ok, expected, "verifier={verifier} target={target}");
            }
        }
    }

    #[test]
    fn wrong_verifier_secret_fails_every_other_target() {
        let ring = Ring::honest(3, 3);
        let bogus = HashValue::digest(b"not a shared secret");
        let decommitment = Decommitment::new(&ring.chains, 0, &bogus);
        for target in 1..3 {
            let h_k = HashValue::digest(ring.k[usize::from(target)]);
            assert!(!decommitment.verify(target, &h_k));
        }
    }

    #[test]
    fn parties_outside_of_roster_recover_nothing() {
        let ring = Ring::honest(3, 13);
        let decommitment = ring.decommitment(1);
        assert_eq!(decommitment.recover_nonce(3), None);
        assert_eq!(decommitment.recover_nonce(u16::MAX), None);
        assert!(!decommitment.verify(3, &HashValue::digest(ring.k[0])));

        let stranger = Decommitment::new(&ring.chains, 3, &ring.right_secrets[0]);
        assert_eq!(stranger.recover_nonce(0), None);
    }
}
