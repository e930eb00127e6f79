//! Protocol engine of a single participant
//!
//! The engine is a chain of states, each round consumes the previous one:
//!
//! ```text
//! Participant --round1--> Committed --round2--> SessionBound --round3--> Chained
//!     --round4--> Signed --final_verification--> SessionKeys
//! ```
//!
//! Every round takes the broadcasts of all parties from the previous round as a [`Roster`] (own
//! message included, at own index) and returns the state for the next round together with the
//! message to broadcast. Secrets never leave the states, and a state that failed a check is
//! consumed, so no session key can be obtained after an error.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::config::SessionConfig;
use crate::decommit::{check_chain_sum, Decommitment};
use crate::delivery::PartyIndex;
use crate::errors::{IntegrityViolation, ProtocolError, SetupError};
use crate::group::GroupParameters;
use crate::hash::HashValue;
use crate::keys::{KeyPair, PublicKey};
use crate::messages::{ChainMsg, CommitMsg, SessionIdMsg, SignatureMsg};
use crate::random::RandomSource;
use crate::roster::Roster;

/// Participant that hasn't started the protocol yet
pub struct Participant {
    session: Session,
}

/// State after round 1: committed to nonce `k`
pub struct Committed {
    session: Session,
    k: HashValue,
    x: BigUint,
}

/// State after round 2: knows session id, committed to Schnorr nonce `r`
pub struct SessionBound {
    session: Session,
    k: HashValue,
    x: BigUint,
    commits: Roster<CommitMsg>,
    sid: HashValue,
    r: BigUint,
}

/// State after round 3: published its link of the Diffie-Hellman chain
pub struct Chained {
    session: Session,
    k: HashValue,
    commits: Roster<CommitMsg>,
    session_ids: Roster<SessionIdMsg>,
    sid: HashValue,
    r: BigUint,
    right_secret: HashValue,
}

/// State after round 4: derived session key, waits for signatures of other parties
pub struct Signed {
    session: Session,
    session_ids: Roster<SessionIdMsg>,
    c: BigUint,
    keys: SessionKeys,
}

/// Output of the protocol
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    /// Session key `ss`
    pub session_key: HashValue,
    /// Session confirmation `sconf`
    pub confirmation: HashValue,
}

struct Session {
    i: PartyIndex,
    keypair: KeyPair,
    public_keys: Roster<PublicKey>,
    group: Arc<GroupParameters>,
    pid: Vec<u8>,
}

impl Session {
    fn n(&self) -> u16 {
        self.public_keys.len()
    }

    fn check_roster_size<T>(&self, round: u16, roster: &Roster<T>) -> Result<(), ProtocolError> {
        if roster.len() != self.n() {
            return Err(ProtocolError::RoundIntegrity {
                round,
                reason: IntegrityViolation::RosterSize {
                    expected: self.n(),
                    actual: roster.len(),
                },
            });
        }
        Ok(())
    }
}

impl Participant {
    /// Sets up participant `i` of a session
    ///
    /// `public_keys` lists long-term public keys of all participants in roster order. Entry `i`
    /// must be the public key of `keypair`.
    pub fn new(
        i: PartyIndex,
        keypair: KeyPair,
        public_keys: Roster<PublicKey>,
        config: &SessionConfig,
    ) -> Result<Self, SetupError> {
        let n = public_keys.len();
        if i >= n {
            return Err(SetupError::PartyIndexOutOfRange { i, n });
        }
        let group = config.group();
        if let Some((j, _)) = public_keys
            .iter_indexed()
            .find(|(_, pk)| !group.is_element(&pk.0))
        {
            return Err(SetupError::InvalidPublicKey { j });
        }
        if public_keys[i] != *keypair.public_key() {
            return Err(SetupError::PublicKeyMismatch { i });
        }

        Ok(Self {
            session: Session {
                i,
                keypair,
                public_keys,
                group: group.clone(),
                pid: config.pid().to_vec(),
            },
        })
    }

    /// Index of the participant
    pub fn index(&self) -> PartyIndex {
        self.session.i
    }

    /// Number of participants
    pub fn n(&self) -> u16 {
        self.session.n()
    }

    /// Round 1: samples nonce `k` and ephemeral key `x`, commits to them
    pub fn round1<R: RandomSource + ?Sized>(
        self,
        rng: &mut R,
    ) -> Result<(Committed, CommitMsg), ProtocolError> {
        let session = self.session;
        let k = rng.random_hash_value()?;
        let x = session.group.random_scalar(rng)?;
        let msg = CommitMsg {
            h_k: HashValue::digest(k),
            y: session.group.exp_g(&x),
        };
        trace!(party = session.i, h_k = %msg.h_k, "committed to nonce");

        Ok((Committed { session, k, x }, msg))
    }
}

impl Committed {
    /// Index of the participant
    pub fn index(&self) -> PartyIndex {
        self.session.i
    }

    /// Round 2: derives session id from all commitments, commits to Schnorr nonce `r`
    ///
    /// `sid = H(pid || h_k_0 || ... || h_k_{n-1})`
    pub fn round2<R: RandomSource + ?Sized>(
        self,
        commits: Roster<CommitMsg>,
        rng: &mut R,
    ) -> Result<(SessionBound, SessionIdMsg), ProtocolError> {
        let session = self.session;
        session.check_roster_size(2, &commits)?;
        if let Some((party, _)) = commits
            .iter_indexed()
            .find(|(_, commit)| !session.group.is_element(&commit.y))
        {
            return Err(ProtocolError::RoundIntegrity {
                round: 2,
                reason: IntegrityViolation::NotAnElement { party },
            });
        }

        let sid: HashValue = commits
            .iter()
            .fold(Sha256::new().chain_update(&session.pid), |h, commit| {
                h.chain_update(commit.h_k)
            })
            .finalize()
            .into();
        let r = session.group.random_scalar(rng)?;
        let msg = SessionIdMsg {
            sid,
            z: session.group.exp_g(&r),
        };
        trace!(party = session.i, %sid, "derived session id");

        Ok((
            SessionBound {
                session,
                k: self.k,
                x: self.x,
                commits,
                sid,
                r,
            },
            msg,
        ))
    }
}

impl SessionBound {
    /// Index of the participant
    pub fn index(&self) -> PartyIndex {
        self.session.i
    }

    /// Round 3: computes secrets shared with both neighbors, publishes chain tag and encrypted
    /// nonce
    ///
    /// `t = H(y_left^x) ^ H(y_right^x)`, `enc_k = k ^ H(y_right^x)`
    pub fn round3(
        self,
        session_ids: Roster<SessionIdMsg>,
    ) -> Result<(Chained, ChainMsg), ProtocolError> {
        let session = self.session;
        session.check_roster_size(3, &session_ids)?;

        let shared_secret = |j: PartyIndex| {
            HashValue::digest_integer(&session.group.exp(&self.commits[j].y, &self.x))
        };
        let left_secret = shared_secret(self.commits.left_of(session.i));
        let right_secret = shared_secret(self.commits.right_of(session.i));
        let msg = ChainMsg {
            enc_k: self.k ^ right_secret,
            t: left_secret ^ right_secret,
        };
        trace!(party = session.i, t = %msg.t, "published chain link");

        Ok((
            Chained {
                session,
                k: self.k,
                commits: self.commits,
                session_ids,
                sid: self.sid,
                r: self.r,
                right_secret,
            },
            msg,
        ))
    }
}

impl Chained {
    /// Index of the participant
    pub fn index(&self) -> PartyIndex {
        self.session.i
    }

    /// Checks that nonce of `target` recovered from `chains` matches `target`'s commitment
    ///
    /// A participant trivially verifies itself. Returns `false` if `target` is out of range.
    pub fn verify_commitment(&self, chains: &Roster<ChainMsg>, target: PartyIndex) -> bool {
        let commit = match self.commits.get(target) {
            Some(commit) => commit,
            None => return false,
        };
        if target == self.session.i {
            return true;
        }
        if chains.len() != self.session.n() {
            return false;
        }
        self.decommitment(chains).verify(target, &commit.h_k)
    }

    fn decommitment<'a>(&'a self, chains: &'a Roster<ChainMsg>) -> Decommitment<'a> {
        Decommitment::new(chains, self.session.i, &self.right_secret)
    }

    /// Round 4: verifies the chain, derives session key and signs it
    ///
    /// Before anything is derived, checks that every party agreed on the session id, the chain
    /// tags sum up to zero, and every nonce matches its commitment. Then computes
    /// `ss = H(pid || k_0 || ... || k_{n-1})`,
    /// `sconf = H(y_0 || k_0 || ... || y_{n-1} || k_{n-1})`, challenge `c = H(sid || sconf) mod q`
    /// and Schnorr response `d = r - c * sk mod q`.
    pub fn round4(self, chains: Roster<ChainMsg>) -> Result<(Signed, SignatureMsg), ProtocolError> {
        let session = self.session;
        let i = session.i;
        session.check_roster_size(4, &chains)?;

        if let Some((party, _)) = self
            .session_ids
            .iter_indexed()
            .find(|(_, msg)| msg.sid != self.sid)
        {
            return Err(ProtocolError::RoundIntegrity {
                round: 4,
                reason: IntegrityViolation::SessionIdMismatch { party },
            });
        }
        check_chain_sum(&chains)
            .map_err(|reason| ProtocolError::RoundIntegrity { round: 4, reason })?;

        let decommitment = Decommitment::new(&chains, i, &self.right_secret);
        let mut nonces = Vec::with_capacity(usize::from(session.n()));
        for (target, commit) in self.commits.iter_indexed() {
            let k = if target == i {
                Some(self.k)
            } else {
                decommitment.recover_nonce(target)
            };
            match k {
                Some(k) if HashValue::digest(k) == commit.h_k => nonces.push(k),
                _ => {
                    return Err(ProtocolError::CommitmentMismatch {
                        target,
                        verifier: i,
                    })
                }
            }
        }

        let session_key: HashValue = nonces
            .iter()
            .fold(Sha256::new().chain_update(&session.pid), |h, k| {
                h.chain_update(k)
            })
            .finalize()
            .into();
        let confirmation: HashValue = self
            .commits
            .iter()
            .zip(&nonces)
            .fold(Sha256::new(), |h, (commit, k)| {
                h.chain_update(commit.y.to_bytes_be()).chain_update(k)
            })
            .finalize()
            .into();

        let c = HashValue::from(
            Sha256::new()
                .chain_update(self.sid)
                .chain_update(confirmation)
                .finalize(),
        )
        .reduce(session.group.q());
        let d = session.group.scalar_sub(
            &self.r,
            &session.group.scalar_mul(&c, session.keypair.secret()),
        );
        trace!(party = i, sconf = %confirmation, "derived session key");

        Ok((
            Signed {
                session,
                session_ids: self.session_ids,
                c,
                keys: SessionKeys {
                    session_key,
                    confirmation,
                },
            },
            SignatureMsg { d },
        ))
    }
}

impl Signed {
    /// Index of the participant
    pub fn index(&self) -> PartyIndex {
        self.session.i
    }

    /// Verifies Schnorr signatures of all other parties and releases the session keys
    ///
    /// Checks `g^d_j * pk_j^c == z_j` for every `j != i`, where `c` is the challenge computed by
    /// this party.
    pub fn final_verification(
        self,
        signatures: Roster<SignatureMsg>,
    ) -> Result<SessionKeys, ProtocolError> {
        let session = self.session;
        session.check_roster_size(4, &signatures)?;

        let group = &session.group;
        for (j, signature) in signatures.iter_indexed() {
            if j == session.i {
                continue;
            }
            let valid = &signature.d < group.q()
                && group.mul(
                    &group.exp_g(&signature.d),
                    &group.exp(&session.public_keys[j].0, &self.c),
                ) == self.session_ids[j].z;
            if !valid {
                return Err(ProtocolError::FinalVerification { signer: j });
            }
        }

        Ok(self.keys)
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("confirmation", &self.confirmation)
            .finish_non_exhaustive()
    }
}

macro_rules! redacted_debug {
    ($($state:ident),+ $(,)?) => {$(
        impl fmt::Debug for $state {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($state))
                    .field("i", &self.session.i)
                    .field("n", &self.session.n())
                    .finish_non_exhaustive()
            }
        }
    )+};
}

redacted_debug! {
    Participant,
    Committed,
    SessionBound,
    Chained,
    Signed,
}
