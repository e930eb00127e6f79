//! Participant as an async actor
//!
//! [`run_session`] carries out the protocol for one participant over any [`Delivery`]: at every
//! round it broadcasts its own message, then waits at the round barrier until messages of all
//! other parties arrived. A party that stays silent for longer than the configured round timeout
//! aborts the session.

use futures_util::SinkExt;
use thiserror::Error;
use tracing::{debug, debug_span, error, Instrument};

use crate::config::SessionConfig;
use crate::delivery::{Delivery, Outgoing};
use crate::errors::ProtocolError;
use crate::messages::{ChainMsg, CommitMsg, Msg, SessionIdMsg, SignatureMsg};
use crate::participant::{Participant, SessionKeys};
use crate::random::RandomSource;
use crate::rounds::{CompleteRoundError, RoundInputError, RoundsRouter};

/// Carries out the protocol for `participant`
///
/// Returns the session keys once signatures of all other parties are verified. Any error aborts
/// the session.
pub async fn run_session<D, R>(
    delivery: D,
    participant: Participant,
    rng: &mut R,
    config: &SessionConfig,
) -> Result<SessionKeys, Error<D::ReceiveError, D::SendError>>
where
    D: Delivery<Msg>,
    R: RandomSource + ?Sized,
{
    let span = debug_span!("Session", party = participant.index());
    let result = run_session_inner(delivery, participant, rng, config)
        .instrument(span.clone())
        .await;
    match &result {
        Ok(_) => debug!(parent: &span, "session key established"),
        Err(err) => error!(parent: &span, %err, "session aborted"),
    }
    result
}

async fn run_session_inner<D, R>(
    delivery: D,
    participant: Participant,
    rng: &mut R,
    config: &SessionConfig,
) -> Result<SessionKeys, Error<D::ReceiveError, D::SendError>>
where
    D: Delivery<Msg>,
    R: RandomSource + ?Sized,
{
    let i = participant.index();
    let n = participant.n();
    let timeout = config.round_timeout();

    let (incomings, mut outgoings) = delivery.split();

    let mut rounds = RoundsRouter::<Msg, ()>::builder(i, n);
    let round1 = rounds.add_round::<CommitMsg>();
    let round2 = rounds.add_round::<SessionIdMsg>();
    let round3 = rounds.add_round::<ChainMsg>();
    let round4 = rounds.add_round::<SignatureMsg>();
    let mut rounds = rounds.listen(incomings);

    // Round 1
    let (party, my_commit) = participant.round1(rng)?;
    outgoings
        .send(Outgoing::broadcast(Msg::Commit(my_commit.clone())))
        .await
        .map_err(|source| Error::Send { round: 1, source })?;
    let commits = rounds
        .complete_within(round1, timeout)
        .await
        .map_err(|source| Error::Receive { round: 1, source })?
        .into_roster_including_me(my_commit)
        .map_err(ProtocolError::from)?;

    // Round 2
    let (party, my_session_id) = party.round2(commits, rng)?;
    outgoings
        .send(Outgoing::broadcast(Msg::SessionId(my_session_id.clone())))
        .await
        .map_err(|source| Error::Send { round: 2, source })?;
    let session_ids = rounds
        .complete_within(round2, timeout)
        .await
        .map_err(|source| Error::Receive { round: 2, source })?
        .into_roster_including_me(my_session_id)
        .map_err(ProtocolError::from)?;

    // Round 3
    let (party, my_chain) = party.round3(session_ids)?;
    outgoings
        .send(Outgoing::broadcast(Msg::Chain(my_chain.clone())))
        .await
        .map_err(|source| Error::Send { round: 3, source })?;
    let chains = rounds
        .complete_within(round3, timeout)
        .await
        .map_err(|source| Error::Receive { round: 3, source })?
        .into_roster_including_me(my_chain)
        .map_err(ProtocolError::from)?;

    // Round 4
    let (party, my_signature) = party.round4(chains)?;
    outgoings
        .send(Outgoing::broadcast(Msg::Signature(my_signature.clone())))
        .await
        .map_err(|source| Error::Send { round: 4, source })?;
    let signatures = rounds
        .complete_within(round4, timeout)
        .await
        .map_err(|source| Error::Receive { round: 4, source })?
        .into_roster_including_me(my_signature)
        .map_err(ProtocolError::from)?;

    // Final verification
    Ok(party.final_verification(signatures)?)
}

/// Session aborted
#[derive(Debug, Error)]
pub enum Error<RecvErr, SendErr> {
    /// Couldn't broadcast own message
    #[error("send a message at round {round}")]
    Send {
        /// Round at which sending failed, counting from 1
        round: u16,
        /// Error of the outgoing channel
        #[source]
        source: SendErr,
    },
    /// Didn't receive messages of all other parties
    #[error("receive messages at round {round}")]
    Receive {
        /// Round that couldn't be completed, counting from 1
        round: u16,
        /// Why the round couldn't be completed
        #[source]
        source: CompleteRoundError<RoundInputError, RecvErr>,
    },
    /// Received messages are invalid
    #[error("protocol failed")]
    Protocol(
        #[source]
        #[from]
        ProtocolError,
    ),
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;

    use futures::{sink, stream};
    use matches::assert_matches;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::{run_session, Error};
    use crate::config::SessionConfig;
    use crate::delivery::Incoming;
    use crate::errors::ProtocolError;
    use crate::group::tests::toy_group;
    use crate::keys::KeyPair;
    use crate::messages::Msg;
    use crate::participant::Participant;
    use crate::random::{tests::FlakyRng, RandomSourceError, RANDOMNESS_RETRY_MAX};
    use crate::roster::Roster;

    #[tokio::test]
    async fn entropy_failure_aborts_session() {
        let config = SessionConfig::new(Arc::new(toy_group()), b"broken entropy".to_vec());
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let keypairs: Vec<_> = (0..3)
            .map(|_| KeyPair::generate(config.group(), &mut rng).unwrap())
            .collect();
        let public_keys = Roster::new(
            keypairs
                .iter()
                .map(|keypair| keypair.public_key().clone())
                .collect(),
        )
        .unwrap();
        let party = Participant::new(0, keypairs[0].clone(), public_keys, &config).unwrap();

        let incomings = stream::iter(Vec::<Result<Incoming<Msg>, Infallible>>::new());
        let outgoings = sink::drain();
        let mut broken = FlakyRng {
            failures: RANDOMNESS_RETRY_MAX,
        };
        let result = run_session((incomings, outgoings), party, &mut broken, &config).await;

        assert_matches!(
            result,
            Err(Error::Protocol(ProtocolError::RandomSource(
                RandomSourceError::Exhausted { .. }
            )))
        );
    }
}
