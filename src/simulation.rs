//! In-memory broadcast network
//!
//! Connects participants running in one process. Every message sent by a party is delivered to
//! all other parties in the order it was sent, nothing is lost or reordered.
//!
//! ```rust,ignore
//! let mut simulation = Simulation::<Msg>::new();
//! let delivery_0 = simulation.connect_new_party();
//! let delivery_1 = simulation.connect_new_party();
//! let delivery_2 = simulation.connect_new_party();
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{ready, Sink, Stream};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::delivery::{Delivery, Incoming, MsgId, Outgoing, PartyIndex};

/// Capacity of the channel used by [`Simulation::new`]
///
/// A party that falls behind by more messages than that loses them and fails with
/// [`BroadcastStreamRecvError::Lagged`].
pub const DEFAULT_CAPACITY: usize = 500;

/// Simulated network
pub struct Simulation<M> {
    channel: broadcast::Sender<Incoming<M>>,
    next_party_idx: PartyIndex,
    next_msg_id: Arc<AtomicU64>,
}

impl<M> Simulation<M>
where
    M: Clone + Send + Unpin + 'static,
{
    /// Instantiates a network with [default capacity](DEFAULT_CAPACITY)
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Instantiates a network that buffers up to `capacity` messages per party
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channel: broadcast::channel(capacity).0,
            next_party_idx: 0,
            next_msg_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Connects a new party to the network
    ///
    /// Parties get indexes `0, 1, 2, ...` in the order they're connected. Only messages sent
    /// after the party is connected are delivered to it.
    pub fn connect_new_party(&mut self) -> SimulationDelivery<M> {
        let local_party_idx = self.next_party_idx;
        self.next_party_idx += 1;

        SimulationDelivery {
            incoming: SimulationIncoming {
                local_party_idx,
                receiver: BroadcastStream::new(self.channel.subscribe()),
            },
            outgoing: SimulationOutgoing {
                local_party_idx,
                sender: self.channel.clone(),
                next_msg_id: self.next_msg_id.clone(),
            },
        }
    }
}

impl<M> Default for Simulation<M>
where
    M: Clone + Send + Unpin + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Connection of one party to the [`Simulation`]
pub struct SimulationDelivery<M> {
    incoming: SimulationIncoming<M>,
    outgoing: SimulationOutgoing<M>,
}

impl<M> Delivery<M> for SimulationDelivery<M>
where
    M: Clone + Send + Unpin + 'static,
{
    type Send = SimulationOutgoing<M>;
    type Receive = SimulationIncoming<M>;
    type SendError = SimulationSendError;
    type ReceiveError = BroadcastStreamRecvError;

    fn split(self) -> (Self::Receive, Self::Send) {
        (self.incoming, self.outgoing)
    }
}

/// Incoming messages of one party
pub struct SimulationIncoming<M> {
    local_party_idx: PartyIndex,
    receiver: BroadcastStream<Incoming<M>>,
}

impl<M> Stream for SimulationIncoming<M>
where
    M: Clone + Send + 'static,
{
    type Item = Result<Incoming<M>, BroadcastStreamRecvError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let msg = match ready!(Pin::new(&mut self.receiver).poll_next(cx)) {
                Some(Ok(m)) => m,
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            };
            if msg.sender == self.local_party_idx {
                continue;
            }
            return Poll::Ready(Some(Ok(msg)));
        }
    }
}

/// Outgoing messages of one party
pub struct SimulationOutgoing<M> {
    local_party_idx: PartyIndex,
    sender: broadcast::Sender<Incoming<M>>,
    next_msg_id: Arc<AtomicU64>,
}

impl<M> Sink<Outgoing<M>> for SimulationOutgoing<M> {
    type Error = SimulationSendError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Outgoing<M>) -> Result<(), Self::Error> {
        let id: MsgId = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(Incoming {
                id,
                sender: self.local_party_idx,
                msg: item.msg,
            })
            .map_err(|_| SimulationSendError)?;
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Message couldn't be sent: every party has disconnected from the network
#[derive(Debug, Error)]
#[error("every party has disconnected from the simulated network")]
pub struct SimulationSendError;
