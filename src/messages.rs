//! Broadcast messages of the protocol
//!
//! | round | payload          | contents       |
//! |-------|------------------|----------------|
//! | 1     | [`CommitMsg`]    | `(h_k, y)`     |
//! | 2     | [`SessionIdMsg`] | `(sid, z)`     |
//! | 3     | [`ChainMsg`]     | `(enc_k, t)`   |
//! | 4     | [`SignatureMsg`] | `d`            |
//!
//! [`RoundsRouter`](crate::rounds::RoundsRouter) numbers rounds by the position of the variant in
//! [`Msg`], starting from zero.

use num_bigint::BigUint;
use round_based_derive::ProtocolMessage;
use serde::{Deserialize, Serialize};

use crate::hash::HashValue;

/// Message of the protocol
#[derive(Clone, Debug, PartialEq, ProtocolMessage, Serialize, Deserialize)]
#[protocol_message(root = crate)]
pub enum Msg {
    /// Round 1
    Commit(CommitMsg),
    /// Round 2
    SessionId(SessionIdMsg),
    /// Round 3
    Chain(ChainMsg),
    /// Round 4
    Signature(SignatureMsg),
}

/// Round 1: commitment to the nonce and ephemeral Diffie-Hellman key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitMsg {
    /// `h_k = H(k)`
    pub h_k: HashValue,
    /// `y = g^x mod p`
    pub y: BigUint,
}

/// Round 2: session id and Schnorr commitment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionIdMsg {
    /// `sid = H(pid || h_k_0 || ... || h_k_{n-1})`
    pub sid: HashValue,
    /// `z = g^r mod p`
    pub z: BigUint,
}

/// Round 3: chain tag and encrypted nonce
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainMsg {
    /// `enc_k = k ^ t_r`
    pub enc_k: HashValue,
    /// `t = t_l ^ t_r`
    pub t: HashValue,
}

/// Round 4: Schnorr response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureMsg {
    /// `d = r - c * sk mod q`
    pub d: BigUint,
}
