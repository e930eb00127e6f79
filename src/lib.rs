//! Deniable authenticated group key exchange
//!
//! `n` participants, each holding a long-term signing keypair, jointly derive a shared session
//! key `ss` and a session confirmation `sconf` in four broadcast rounds (Bohli et al.). No
//! participant can prove to a third party what any other participant contributed.
//!
//! | round | broadcast      | purpose                                                          |
//! |-------|----------------|------------------------------------------------------------------|
//! | 1     | `(h_k, y)`     | commit to nonce `k`, publish ephemeral Diffie-Hellman key `y`     |
//! | 2     | `(sid, z)`     | session id over all commitments, Schnorr commitment `z = g^r`    |
//! | 3     | `(enc_k, t)`   | link of a Diffie-Hellman chain around the ring, encrypted nonce  |
//! | 4     | `d`            | Schnorr response over `H(sid \|\| sconf)`                        |
//!
//! After round 3 every participant unwinds the chain to recover each nonce and checks it against
//! the round 1 commitment ([`decommit`]), so a cheater is named rather than just detected. After
//! round 4 Schnorr signatures of all other participants are verified. No session key is released
//! if any check fails.
//!
//! ## Running the protocol
//!
//! [`Participant`] is a synchronous engine: every round consumes the previous state and the
//! broadcasts of the previous round. [`protocol::run_session`] drives it as an async actor over
//! any [`Delivery`], waiting at a round barrier for the slowest peer and aborting the session on
//! timeout.
//!
//! ```rust,no_run
//! # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use bohli_deniable::{
//!     protocol::run_session, roster::Roster, simulation::Simulation, GroupParameters, KeyPair,
//!     Msg, Participant, SessionConfig,
//! };
//!
//! let config = SessionConfig::new(Arc::new(GroupParameters::rfc5114_1024_160()), "demo");
//! let mut rng = rand::rngs::OsRng;
//! let keypairs = (0..3)
//!     .map(|_| KeyPair::generate(config.group(), &mut rng))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let public_keys = Roster::new(keypairs.iter().map(|k| k.public_key().clone()).collect())?;
//!
//! let mut simulation = Simulation::<Msg>::new();
//! let mut sessions = vec![];
//! for (i, keypair) in (0..).zip(keypairs) {
//!     let participant = Participant::new(i, keypair, public_keys.clone(), &config)?;
//!     let delivery = simulation.connect_new_party();
//!     let config = config.clone();
//!     sessions.push(async move {
//!         run_session(delivery, participant, &mut rand::rngs::OsRng, &config).await
//!     });
//! }
//! let keys = futures::future::try_join_all(sessions).await?;
//! assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
//! # Ok(()) }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber. Secret values are never logged.

#![deny(missing_docs)]
#![forbid(unused_crate_dependencies)]

/// Fixes false-positive of `unused_crate_dependencies` lint that only occure in the tests
#[cfg(test)]
mod false_positives {
    use hex_literal as _;
}

pub mod config;
pub mod decommit;
mod delivery;
pub mod errors;
pub mod group;
pub mod hash;
pub mod keys;
pub mod messages;
pub mod participant;
pub mod protocol;
pub mod random;
pub mod roster;
pub mod rounds;
pub mod simulation;

pub use self::delivery::*;
#[doc(no_inline)]
pub use self::{
    config::SessionConfig,
    errors::{IntegrityViolation, ProtocolError, SetupError},
    group::GroupParameters,
    hash::HashValue,
    keys::{KeyPair, PublicKey},
    messages::Msg,
    participant::{Participant, SessionKeys},
    random::{RandomSource, RandomSourceError},
    rounds::{ProtocolMessage, RoundMessage},
};
