//! Round barrier
//!
//! [`RoundsRouter`] processes incoming messages, groups them by rounds, and lets a participant wait
//! until every other participant published its message for a given round. Messages that arrive
//! for a later round than the one being awaited are buffered in that round's store, so a fast peer
//! never causes a slower one to lose messages.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut rounds = RoundsRouter::<Msg>::builder(i, n);
//! let round1 = rounds.add_round::<CommitMsg>();
//! let round2 = rounds.add_round::<SessionIdMsg>();
//! let mut rounds = rounds.listen(incomings);
//!
//! // Waits for messages of round 1 from all other parties
//! let commitments: RoundMsgs<CommitMsg> = rounds.complete(round1).await?;
//! // Same, but gives up if someone stays silent for too long
//! let session_ids = rounds.complete_within(round2, Some(timeout)).await?;
//! ```

use std::collections::BTreeMap;
use std::iter;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use phantom_type::PhantomType;
use thiserror::Error;
use tracing::{debug, error, trace, trace_span, warn, Span};

use crate::delivery::{Incoming, MsgId, PartyIndex};
use crate::errors::SetupError;
use crate::roster::Roster;

#[doc(inline)]
pub use self::errors::CompleteRoundError;

/// Message of MPC protocol
///
/// Protocol consists of several rounds, so protocol message carries a number of the round plus
/// [round message](RoundMessage).
pub trait ProtocolMessage: Sized {
    /// Number of round this message originates from
    fn round(&self) -> u16;
}

/// Round message
///
/// While [`ProtocolMessage`] only tells the round number, this trait converts between the
/// protocol message and the message of one specific round.
pub trait RoundMessage<M>: ProtocolMessage {
    /// Number of the round this message belongs to
    const ROUND: u16;

    /// Converts round message into protocol message (never fails)
    fn to_protocol_message(round_message: M) -> Self;
    /// Extracts round message from protocol message
    ///
    /// Returns `Err(protocol_message)` if `protocol_message.round() != Self::ROUND`, otherwise
    /// returns `Ok(_)`
    fn from_protocol_message(protocol_message: Self) -> Result<M, Self>;
}

/// Routes received messages between protocol rounds
///
/// See [module level](self) documentation to learn more about it.
pub struct RoundsRouter<M, S> {
    incomings: S,
    rounds: BTreeMap<u16, RoundSlot<M>>,
}

enum RoundSlot<M> {
    Collecting(RoundInput<M>),
    Failed(RoundInputError),
    Taken,
}

impl<M> RoundSlot<M> {
    fn wants_more(&self) -> bool {
        matches!(self, RoundSlot::Collecting(store) if store.wants_more())
    }
}

impl<M: ProtocolMessage> RoundsRouter<M, ()> {
    /// Instantiates [`RoundsRouterBuilder`] for local party `i` out of `n`
    pub fn builder(i: PartyIndex, n: u16) -> RoundsRouterBuilder<M> {
        RoundsRouterBuilder {
            i,
            n,
            rounds: BTreeMap::new(),
        }
    }
}

impl<M, S, E> RoundsRouter<M, S>
where
    M: ProtocolMessage,
    S: Stream<Item = Result<Incoming<M>, E>> + Unpin,
{
    /// Completes specified round
    ///
    /// Waits until messages from every other party at specified round are received. Returns
    /// received messages if round is successfully completed, or error otherwise.
    #[inline(always)]
    pub async fn complete<R>(
        &mut self,
        round: Round<R>,
    ) -> Result<RoundMsgs<R>, CompleteRoundError<RoundInputError, E>>
    where
        M: RoundMessage<R>,
    {
        let round_number = <M as RoundMessage<R>>::ROUND;
        let span = trace_span!("Round", n = round_number);
        debug!(parent: &span, "pending round to complete");

        match self.complete_with_span(&span, round).await {
            Ok(output) => {
                trace!(parent: &span, "round successfully completed");
                Ok(output)
            }
            Err(err) => {
                error!(parent: &span, %err, "round terminated with error");
                Err(err)
            }
        }
    }

    /// Completes specified round, or fails if it's not completed within `timeout`
    ///
    /// On timeout, the error lists parties who didn't send their message. `None` waits forever.
    pub async fn complete_within<R>(
        &mut self,
        round: Round<R>,
        timeout: Option<Duration>,
    ) -> Result<RoundMsgs<R>, CompleteRoundError<RoundInputError, E>>
    where
        M: RoundMessage<R>,
    {
        let timeout = match timeout {
            Some(timeout) => timeout,
            None => return self.complete(round).await,
        };
        match tokio::time::timeout(timeout, self.complete(round)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                let round_number = <M as RoundMessage<R>>::ROUND;
                let parties_who_didnt_send = match self.rounds.get(&round_number) {
                    Some(RoundSlot::Collecting(store)) => store.missing_parties(),
                    _ => vec![],
                };
                warn!(n = round_number, ?parties_who_didnt_send, "round timed out");
                Err(CompleteRoundError::Timeout {
                    parties_who_didnt_send,
                })
            }
        }
    }

    async fn complete_with_span<R>(
        &mut self,
        span: &Span,
        _round: Round<R>,
    ) -> Result<RoundMsgs<R>, CompleteRoundError<RoundInputError, E>>
    where
        M: RoundMessage<R>,
    {
        let pending_round = <M as RoundMessage<R>>::ROUND;
        loop {
            if let Some(output) = self.retrieve_round_output_if_its_completed::<R>() {
                return output;
            }

            let incoming = match self.incomings.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(err)) => return Err(errors::IoError::Io(err).into()),
                None => return Err(errors::IoError::UnexpectedEof.into()),
            };
            let message_round_n = incoming.msg.round();

            match self.rounds.get_mut(&message_round_n) {
                Some(slot) if slot.wants_more() => {
                    trace!(
                        parent: span,
                        n = message_round_n,
                        sender = incoming.sender,
                        "received message"
                    );
                    if let RoundSlot::Collecting(store) = slot {
                        if let Err(err) = store.add_message(incoming) {
                            *slot = RoundSlot::Failed(err);
                        }
                    }
                }
                Some(_) => {
                    warn!(
                        parent: span,
                        n = message_round_n,
                        sender = incoming.sender,
                        "received message for the round that was already completed, ignoring it"
                    );
                }
                None => {
                    return Err(
                        errors::RoundsMisuse::UnregisteredRound { n: message_round_n }.into(),
                    )
                }
            }

            if message_round_n != pending_round {
                trace!(parent: span, n = message_round_n, "buffered message of another round");
            }
        }
    }

    fn retrieve_round_output_if_its_completed<R>(
        &mut self,
    ) -> Option<Result<RoundMsgs<R>, CompleteRoundError<RoundInputError, E>>>
    where
        M: RoundMessage<R>,
    {
        let round_number = <M as RoundMessage<R>>::ROUND;
        let slot = match self.rounds.get_mut(&round_number) {
            Some(slot) => slot,
            None => {
                return Some(Err(
                    errors::RoundsMisuse::UnregisteredRound { n: round_number }.into(),
                ))
            }
        };
        match slot {
            RoundSlot::Collecting(store) if store.wants_more() => return None,
            RoundSlot::Taken => {
                return Some(Err(errors::RoundsMisuse::RoundAlreadyCompleted.into()))
            }
            _ => (),
        }

        match std::mem::replace(slot, RoundSlot::Taken) {
            RoundSlot::Collecting(store) => Some(Self::convert_output::<R>(store)),
            RoundSlot::Failed(err) => Some(Err(CompleteRoundError::ProcessMessage(err))),
            RoundSlot::Taken => Some(Err(errors::RoundsMisuse::RoundAlreadyCompleted.into())),
        }
    }

    fn convert_output<R>(
        store: RoundInput<M>,
    ) -> Result<RoundMsgs<R>, CompleteRoundError<RoundInputError, E>>
    where
        M: RoundMessage<R>,
    {
        let msgs = store.output().map_err(|_| errors::Bug::StoreDidntOutput)?;
        msgs.try_map(|msg| {
            <M as RoundMessage<R>>::from_protocol_message(msg).map_err(|msg| {
                errors::Bug::MessageFromAnotherRound {
                    expected_round: <M as RoundMessage<R>>::ROUND,
                    actual_number: msg.round(),
                }
                .into()
            })
        })
    }
}

/// Builds [`RoundsRouter`]
pub struct RoundsRouterBuilder<M> {
    i: PartyIndex,
    n: u16,
    rounds: BTreeMap<u16, RoundSlot<M>>,
}

impl<M> RoundsRouterBuilder<M>
where
    M: ProtocolMessage,
{
    /// Registers new round
    ///
    /// ## Panics
    /// Panics if round `R` was already registered
    pub fn add_round<R>(&mut self) -> Round<R>
    where
        M: RoundMessage<R>,
    {
        let round = <M as RoundMessage<R>>::ROUND;
        let overridden_round = self.rounds.insert(
            round,
            RoundSlot::Collecting(RoundInput::new(self.i, self.n)),
        );
        if overridden_round.is_some() {
            panic!("round {round} is overridden");
        }
        Round {
            _ph: PhantomType::new(),
        }
    }

    /// Builds [`RoundsRouter`]
    ///
    /// Takes a stream of incoming messages which will be routed between registered rounds
    pub fn listen<S, E>(self, incomings: S) -> RoundsRouter<M, S>
    where
        S: Stream<Item = Result<Incoming<M>, E>>,
    {
        RoundsRouter {
            incomings,
            rounds: self.rounds,
        }
    }
}

/// A round of the protocol
///
/// `Round` can be used to retrieve messages received at this round by calling
/// [`RoundsRouter::complete`].
pub struct Round<R> {
    _ph: PhantomType<R>,
}

/// Collects one broadcast message from every other party
///
/// Round is considered complete when the store received a message from every party. Messages
/// such that `msg.sender == local_party_index` are ignored.
#[derive(Debug, Clone)]
pub struct RoundInput<M> {
    i: PartyIndex,
    n: u16,
    received: Vec<Option<(MsgId, M)>>,
    left_messages: u16,
}

impl<M> RoundInput<M> {
    /// Constructs new messages store
    ///
    /// Takes index of local party `i` and amount of parties `n`
    ///
    /// ## Panics
    /// Panics if `n` is less than 2 or `i` is not in the range `[0; n)`.
    pub fn new(i: PartyIndex, n: u16) -> Self {
        assert!(n >= 2, "at least two parties are required");
        assert!(i < n, "party index is not in range [0; n)");
        Self {
            i,
            n,
            received: iter::repeat_with(|| None).take(usize::from(n)).collect(),
            left_messages: n - 1,
        }
    }

    /// Adds received message to the store
    ///
    /// Returns error if the sender is unknown or already sent a message at this round.
    pub fn add_message(&mut self, msg: Incoming<M>) -> Result<(), RoundInputError> {
        if msg.sender == self.i {
            // Ignore own messages
            return Ok(());
        }
        match self.received.get_mut(usize::from(msg.sender)) {
            Some(vacant @ None) => {
                *vacant = Some((msg.id, msg.msg));
                self.left_messages -= 1;
                Ok(())
            }
            Some(Some((first_id, _))) => Err(RoundInputError::AttemptToOverwriteReceivedMsg {
                msgs_ids: [*first_id, msg.id],
                sender: msg.sender,
            }),
            None => Err(RoundInputError::SenderIndexOutOfRange {
                msg_id: msg.id,
                sender: msg.sender,
                n: self.n,
            }),
        }
    }

    /// Indicates if store expects more messages to receive
    pub fn wants_more(&self) -> bool {
        self.left_messages > 0
    }

    /// Parties whose message hasn't been received yet
    pub fn missing_parties(&self) -> Vec<PartyIndex> {
        (0..)
            .zip(&self.received)
            .filter(|(j, msg)| *j != self.i && msg.is_none())
            .map(|(j, _)| j)
            .collect()
    }

    /// Retrieves store output if enough messages are received
    ///
    /// Returns `Err(self)` if more message are needed to be received.
    pub fn output(self) -> Result<RoundMsgs<M>, Self> {
        if self.wants_more() {
            return Err(self);
        }
        let messages = self
            .received
            .into_iter()
            .flatten()
            .map(|(_id, msg)| msg)
            .collect();
        Ok(RoundMsgs { i: self.i, messages })
    }
}

/// List of messages received at one round
#[derive(Debug, Clone)]
pub struct RoundMsgs<M> {
    i: PartyIndex,
    messages: Vec<M>,
}

impl<M> RoundMsgs<M> {
    /// Returns vec of received messages plus party's own message
    ///
    /// Received messages are kept in ascending order of sender index, and `my_msg` is inserted at
    /// position `i`. Thus, i-th message in the list was received from i-th party.
    pub fn into_vec_including_me(mut self, my_msg: M) -> Vec<M> {
        self.messages.insert(usize::from(self.i), my_msg);
        self.messages
    }

    /// Same as [`into_vec_including_me`](Self::into_vec_including_me), but returns a [`Roster`]
    pub fn into_roster_including_me(self, my_msg: M) -> Result<Roster<M>, SetupError> {
        Roster::new(self.into_vec_including_me(my_msg))
    }

    fn try_map<T, Err, F>(self, f: F) -> Result<RoundMsgs<T>, Err>
    where
        F: FnMut(M) -> Result<T, Err>,
    {
        Ok(RoundMsgs {
            i: self.i,
            messages: self.messages.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Error explaining why `RoundInput` wasn't able to process a message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundInputError {
    /// Party sent two messages in one round
    #[error("party {sender} tried to overwrite message")]
    AttemptToOverwriteReceivedMsg {
        /// Ids of conflicting messages: the one already stored, then the new one
        msgs_ids: [MsgId; 2],
        /// Party who sent both messages
        sender: PartyIndex,
    },
    /// Unknown sender
    ///
    /// This error is thrown when index of sender is not in `[0; n)` where `n` is number of
    /// parties involved in the protocol
    #[error("sender index is out of range: sender={sender}, n={n}")]
    SenderIndexOutOfRange {
        /// Id of the rejected message
        msg_id: MsgId,
        /// Claimed index of the sender
        sender: PartyIndex,
        /// Number of parties
        n: u16,
    },
}

/// When something goes wrong
pub mod errors {
    use thiserror::Error;

    use crate::delivery::PartyIndex;

    /// Error indicating that `RoundsRouter` failed to complete certain round
    #[derive(Debug, Error)]
    pub enum CompleteRoundError<ProcessErr, IoErr> {
        /// Store failed to process a message
        #[error("failed to process the message")]
        ProcessMessage(#[source] ProcessErr),
        /// Receiving next message resulted into i/o error
        #[error("receive next message")]
        Io(
            #[source]
            #[from]
            IoError<IoErr>,
        ),
        /// Some parties didn't send their message in time
        #[error("timed out waiting for parties {parties_who_didnt_send:?}")]
        Timeout {
            /// Parties whose message didn't arrive, in ascending order
            parties_who_didnt_send: Vec<PartyIndex>,
        },
        /// Router API misuse or a bug in the router
        #[error("implementation error")]
        Other(#[source] OtherError),
    }

    /// Error indicating that receiving next message resulted into i/o error
    #[derive(Error, Debug)]
    pub enum IoError<E> {
        /// I/O error
        #[error("i/o error")]
        Io(#[source] E),
        /// Encountered unexpected EOF
        #[error("unexpected eof")]
        UnexpectedEof,
    }

    /// Router API misuse or a bug in the router
    #[derive(Error, Debug)]
    #[error(transparent)]
    pub struct OtherError(OtherReason);

    #[derive(Error, Debug)]
    pub(super) enum OtherReason {
        #[error("`RoundsRouter` API misuse")]
        RoundsMisuse(RoundsMisuse),
        #[error("bug in `RoundsRouter`")]
        Bug(Bug),
    }

    #[derive(Debug, Error)]
    pub(super) enum RoundsMisuse {
        #[error("round is already completed")]
        RoundAlreadyCompleted,
        #[error("round {n} is not registered")]
        UnregisteredRound { n: u16 },
    }

    #[derive(Debug, Error)]
    pub(super) enum Bug {
        #[error("store indicated it's complete but didn't output")]
        StoreDidntOutput,
        #[error(
            "message originates from another round: we process messages from round \
            {expected_round}, got message from round {actual_number}"
        )]
        MessageFromAnotherRound {
            expected_round: u16,
            actual_number: u16,
        },
    }

    macro_rules! impl_from_other_error {
        ($($err:ident),+,) => {$(
            impl<E1, E2> From<$err> for CompleteRoundError<E1, E2> {
                fn from(err: $err) -> Self {
                    Self::Other(OtherError(OtherReason::$err(err)))
                }
            }
        )+};
    }

    impl_from_other_error! {
        RoundsMisuse,
        Bug,
    }
}
