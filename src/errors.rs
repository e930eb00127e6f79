//! When something goes wrong
//!
//! Every failure aborts the session: no session key is released once any error is returned. Errors
//! still differ in *who* is to blame. [`ProtocolError::CommitmentMismatch`] and
//! [`ProtocolError::FinalVerification`] name the misbehaving participant,
//! [`ProtocolError::RandomSource`] points at local infrastructure.

use thiserror::Error;

use crate::delivery::PartyIndex;
use crate::group::GroupError;
use crate::random::RandomSourceError;

/// Protocol failed
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Local randomness source failed
    #[error("randomness source failed")]
    RandomSource(
        #[source]
        #[from]
        RandomSourceError,
    ),
    /// Broadcast values are globally inconsistent
    ///
    /// Proves that someone tampered with the broadcasts but doesn't say who.
    #[error("integrity check failed at round {round}")]
    RoundIntegrity {
        /// Round at which the check failed
        round: u16,
        /// Which check failed
        #[source]
        reason: IntegrityViolation,
    },
    /// Nonce of `target` recovered by `verifier` doesn't match `target`'s round 1 commitment
    #[error("party {verifier} recovered nonce of party {target} that doesn't match its commitment")]
    CommitmentMismatch {
        /// Party whose nonce didn't match
        target: PartyIndex,
        /// Party who recovered the nonce
        verifier: PartyIndex,
    },
    /// Schnorr signature of `signer` is invalid
    #[error("signature of party {signer} is invalid")]
    FinalVerification {
        /// Party who produced the signature
        signer: PartyIndex,
    },
    /// Session can't be set up with given parameters
    #[error("invalid session setup")]
    InvalidSetup(
        #[source]
        #[from]
        SetupError,
    ),
}

/// Explains why [`ProtocolError::RoundIntegrity`] was raised
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// XOR of all chain tags `t_0 ^ ... ^ t_{n-1}` is not zero
    #[error("chain tags don't sum up to zero")]
    NonZeroChainSum,
    /// Party broadcast a session id different from ours
    #[error("party {party} has a different session id")]
    SessionIdMismatch {
        /// Party who broadcast the diverging session id
        party: PartyIndex,
    },
    /// Party broadcast a value that isn't a group element
    #[error("party {party} sent a value that's not a group element")]
    NotAnElement {
        /// Party who broadcast the value
        party: PartyIndex,
    },
    /// Round input doesn't have an entry for every participant
    #[error("expected messages from {expected} parties, got {actual}")]
    RosterSize {
        /// Number of participants
        expected: u16,
        /// Number of entries received
        actual: u16,
    },
}

/// Invalid session setup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Less than [`MIN_PARTIES`](crate::roster::MIN_PARTIES) participants
    #[error("at least 3 parties are required, got {n}")]
    TooFewParties {
        /// Number of parties given
        n: u16,
    },
    /// Number of participants doesn't fit into [`PartyIndex`]
    #[error("too many parties: {n}")]
    TooManyParties {
        /// Number of parties given
        n: usize,
    },
    /// Index of local party is out of range
    #[error("party index {i} is out of range [0; {n})")]
    PartyIndexOutOfRange {
        /// Index of local party
        i: PartyIndex,
        /// Number of parties
        n: u16,
    },
    /// Public key listed for local party doesn't match its keypair
    #[error("public key listed for party {i} doesn't match its keypair")]
    PublicKeyMismatch {
        /// Index of local party
        i: PartyIndex,
    },
    /// Public key of party `j` is not a group element
    #[error("public key of party {j} is not a group element")]
    InvalidPublicKey {
        /// Party whose public key is invalid
        j: PartyIndex,
    },
    /// Group parameters are inconsistent
    #[error("invalid group parameters")]
    InvalidGroup(#[source] GroupError),
}
