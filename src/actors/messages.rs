use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::packet::DnsPacket;

/// The PendingActorMessage enum defines the kind of messages we can send to the
/// pending query actor. Results go back to the sender over a oneshot channel.
#[derive(Debug)]
pub enum PendingActorMessage {
    /// Start waiting for the response to query `id` sent to `server`.
    /// `registered` receives false when the id is already in flight.
    Register {
        id: u16,
        server: SocketAddr,
        respond_to: oneshot::Sender<DnsPacket>,
        registered: oneshot::Sender<bool>,
    },

    /// An upstream response arrived from `from`.
    Complete { packet: DnsPacket, from: SocketAddr },

    /// Stop waiting for query `id`.
    Expire { id: u16 },

    /// Number of queries currently in flight.
    InFlight { respond_to: oneshot::Sender<usize> },
}
