#![allow(dead_code)]

use std::sync::Arc;

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use bohli_deniable::messages::{ChainMsg, CommitMsg, SessionIdMsg, SignatureMsg};
use bohli_deniable::participant::{Chained, Committed, SessionBound, Signed};
use bohli_deniable::roster::Roster;
use bohli_deniable::{
    GroupParameters, KeyPair, Participant, ProtocolError, RandomSource, SessionConfig, SessionKeys,
};

/// Safe-prime group `p = 2q + 1` with a 62-bit `q`
pub fn toy_group() -> Arc<GroupParameters> {
    Arc::new(GroupParameters::from_hex("40000000000019c3", "2000000000000ce1", "4").unwrap())
}

/// Deterministic stand-in for an entropy source
///
/// Every request of up to 32 bytes is served from `SHA256(seed || counter)`, counter is a
/// big-endian u64 incremented per block.
pub struct CountingRng {
    seed: u8,
    counter: u64,
}

impl CountingRng {
    pub fn new(seed: u8) -> Self {
        Self { seed, counter: 0 }
    }
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(32) {
            let block = Sha256::new()
                .chain_update([self.seed])
                .chain_update(self.counter.to_be_bytes())
                .finalize();
            chunk.copy_from_slice(&block[..chunk.len()]);
            self.counter += 1;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for CountingRng {}

/// Generates a keypair for every party and sets them up
///
/// Party `i` draws its long-term key from `rngs[i]`.
pub fn setup<R: RandomSource>(config: &SessionConfig, rngs: &mut [R]) -> Vec<Participant> {
    let keypairs: Vec<KeyPair> = rngs
        .iter_mut()
        .map(|rng| KeyPair::generate(config.group(), rng).unwrap())
        .collect();
    let public_keys = Roster::new(
        keypairs
            .iter()
            .map(|keypair| keypair.public_key().clone())
            .collect(),
    )
    .unwrap();
    (0..)
        .zip(keypairs)
        .map(|(i, keypair)| Participant::new(i, keypair, public_keys.clone(), config).unwrap())
        .collect()
}

/// Gives every party its own copy of broadcast messages
pub fn broadcast<M: Clone>(msgs: Vec<M>) -> Vec<Roster<M>> {
    let roster = Roster::new(msgs).unwrap();
    (0..roster.len()).map(|_| roster.clone()).collect()
}

/// Lets a test modify what each party receives before the round is processed
pub trait Tamper {
    fn round1(&mut self, _received: &mut [Roster<CommitMsg>]) {}
    fn round2(&mut self, _received: &mut [Roster<SessionIdMsg>]) {}
    fn round3(&mut self, _received: &mut [Roster<ChainMsg>]) {}
    fn round4(&mut self, _received: &mut [Roster<SignatureMsg>]) {}
}

/// Delivers every message as it was sent
pub struct Honest;
impl Tamper for Honest {}

/// Outputs of a synchronous run
pub enum Outcome {
    /// Some party failed round 4, nobody received its signature
    ///
    /// One entry per party: `Ok(())` if it passed round 4.
    Round4Failed(Vec<Result<(), ProtocolError>>),
    /// Every party passed round 4 and ran final verification
    Finished {
        keys: Vec<Result<SessionKeys, ProtocolError>>,
        signatures: Vec<SignatureMsg>,
    },
}

impl Outcome {
    pub fn round4_results(self) -> Vec<Result<(), ProtocolError>> {
        match self {
            Outcome::Round4Failed(results) => results,
            Outcome::Finished { .. } => panic!("every party passed round 4"),
        }
    }

    pub fn keys(self) -> Vec<Result<SessionKeys, ProtocolError>> {
        match self {
            Outcome::Finished { keys, .. } => keys,
            Outcome::Round4Failed(results) => panic!("round 4 failed: {results:?}"),
        }
    }
}

/// Runs all parties in lockstep, round by round
///
/// Rounds 1-3 must succeed for everyone. If anybody fails round 4, nobody continues to final
/// verification.
pub fn run_lockstep<R: RandomSource>(
    parties: Vec<Participant>,
    rngs: &mut [R],
    tamper: &mut impl Tamper,
) -> Outcome {
    let (parties, msgs): (Vec<Committed>, Vec<_>) = parties
        .into_iter()
        .zip(rngs.iter_mut())
        .map(|(party, rng)| party.round1(rng).unwrap())
        .unzip();
    let mut received = broadcast(msgs);
    tamper.round1(&mut received);

    let (parties, msgs): (Vec<SessionBound>, Vec<_>) = parties
        .into_iter()
        .zip(received)
        .zip(rngs.iter_mut())
        .map(|((party, commits), rng)| party.round2(commits, rng).unwrap())
        .unzip();
    let mut received = broadcast(msgs);
    tamper.round2(&mut received);

    let (parties, msgs): (Vec<Chained>, Vec<_>) = parties
        .into_iter()
        .zip(received)
        .map(|(party, session_ids)| party.round3(session_ids).unwrap())
        .unzip();
    let mut received = broadcast(msgs);
    tamper.round3(&mut received);

    let round4: Vec<Result<(Signed, SignatureMsg), ProtocolError>> = parties
        .into_iter()
        .zip(received)
        .map(|(party, chains)| party.round4(chains))
        .collect();
    if round4.iter().any(|result| result.is_err()) {
        return Outcome::Round4Failed(
            round4
                .into_iter()
                .map(|result| result.map(|_| ()))
                .collect(),
        );
    }

    let (parties, signatures): (Vec<Signed>, Vec<SignatureMsg>) =
        round4.into_iter().map(Result::unwrap).unzip();
    let mut received = broadcast(signatures.clone());
    tamper.round4(&mut received);

    let keys = parties
        .into_iter()
        .zip(received)
        .map(|(party, signatures)| party.final_verification(signatures))
        .collect();
    Outcome::Finished { keys, signatures }
}
