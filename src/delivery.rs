use std::error::Error;

use futures_util::{Sink, Stream};

/// Networking abstraction
///
/// Basically, it's pair of channels: [`Stream`] for receiving messages, and [`Sink`] for sending
/// messages to other parties. Every message in this protocol is a broadcast, so the transport
/// only needs to deliver each outgoing message to every other participant, byte for byte.
pub trait Delivery<M> {
    /// Outgoing delivery channel
    type Send: Sink<Outgoing<M>, Error = Self::SendError> + Unpin;
    /// Incoming delivery channel
    type Receive: Stream<Item = Result<Incoming<M>, Self::ReceiveError>> + Unpin;
    /// Error of outgoing delivery channel
    type SendError: Error + Send + Sync + 'static;
    /// Error of incoming delivery channel
    type ReceiveError: Error + Send + Sync + 'static;
    /// Returns a pair of incoming and outgoing delivery channels
    fn split(self) -> (Self::Receive, Self::Send);
}

impl<M, I, O, IErr, OErr> Delivery<M> for (I, O)
where
    I: Stream<Item = Result<Incoming<M>, IErr>> + Unpin,
    O: Sink<Outgoing<M>, Error = OErr> + Unpin,
    IErr: Error + Send + Sync + 'static,
    OErr: Error + Send + Sync + 'static,
{
    type Send = O;
    type Receive = I;
    type SendError = OErr;
    type ReceiveError = IErr;

    fn split(self) -> (Self::Receive, Self::Send) {
        (self.0, self.1)
    }
}

/// Index of party involved in the protocol
///
/// Equals the position of the party in the [`Roster`](crate::roster::Roster).
pub type PartyIndex = u16;
/// ID of received message
///
/// Can be used to retrieve extra information about message from delivery layer when needed, e.g.
/// the signed transport envelope of a message that exposed a cheater.
pub type MsgId = u64;

/// Incoming message
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming<M> {
    /// Index of a message
    pub id: MsgId,
    /// Index of a party who sent the message
    pub sender: PartyIndex,
    /// Received message
    pub msg: M,
}

/// Outgoing message
///
/// Always addressed to all other parties.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing<M> {
    /// Message being sent
    pub msg: M,
}

impl<M> Outgoing<M> {
    /// Constructs an outgoing message addressed to all parties
    pub fn broadcast(msg: M) -> Self {
        Self { msg }
    }
}
