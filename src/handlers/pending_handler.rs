use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::actors::{messages::PendingActorMessage, pending_actor::PendingQueryActor};
use crate::errors::ResolverError;
use crate::packet::DnsPacket;

#[derive(Clone, Debug)]
pub struct PendingQueriesHandle {
    sender: mpsc::Sender<PendingActorMessage>,
}

// Gives you access to the underlying actor.
impl PendingQueriesHandle {
    /// Spawn the actor. Entries older than `max_age` are swept out.
    pub fn new(max_age: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(64);
        let mut actor = PendingQueryActor::new(receiver, max_age);
        tokio::spawn(async move { actor.run().await });

        Self { sender }
    }

    /// Start waiting for the response to query `id`.
    /// Returns None when that id is already in flight.
    pub async fn register(
        &self,
        id: u16,
        server: SocketAddr,
    ) -> Result<Option<oneshot::Receiver<DnsPacket>>, ResolverError> {
        let (respond_to, response) = oneshot::channel();
        let (registered, accepted) = oneshot::channel();
        let msg = PendingActorMessage::Register {
            id,
            server,
            respond_to,
            registered,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|_| ResolverError::ActorClosed)?;

        // this is going back once the msg comes back from the actor.
        match accepted.await {
            Ok(true) => Ok(Some(response)),
            Ok(false) => Ok(None),
            Err(_) => Err(ResolverError::ActorClosed),
        }
    }

    /// Hand an upstream response to whoever is waiting for its id.
    pub async fn complete(&self, packet: DnsPacket, from: SocketAddr) -> Result<(), ResolverError> {
        self.sender
            .send(PendingActorMessage::Complete { packet, from })
            .await
            .map_err(|_| ResolverError::ActorClosed)
    }

    pub async fn expire(&self, id: u16) {
        // Ignore send errors. A closed actor holds no entries to expire.
        let _ = self.sender.send(PendingActorMessage::Expire { id }).await;
    }

    pub async fn in_flight(&self) -> Result<usize, ResolverError> {
        let (respond_to, count) = oneshot::channel();
        self.sender
            .send(PendingActorMessage::InFlight { respond_to })
            .await
            .map_err(|_| ResolverError::ActorClosed)?;

        count.await.map_err(|_| ResolverError::ActorClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QueryType;

    #[tokio::test]
    async fn test_register_complete_round_trip() {
        let handle = PendingQueriesHandle::new(Duration::from_secs(5));
        let server: SocketAddr = "127.0.0.1:5300".parse().unwrap();

        let response = handle.register(42, server).await.unwrap().unwrap();
        assert!(handle.register(42, server).await.unwrap().is_none());
        assert_eq!(handle.in_flight().await.unwrap(), 1);

        let reply = DnsPacket::new_query(42, "example.com", QueryType::A);
        handle.complete(reply.clone(), server).await.unwrap();

        assert_eq!(response.await.unwrap(), reply);
        assert_eq!(handle.in_flight().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expire_frees_the_id() {
        let handle = PendingQueriesHandle::new(Duration::from_secs(5));
        let server: SocketAddr = "127.0.0.1:5300".parse().unwrap();

        let _response = handle.register(5, server).await.unwrap().unwrap();
        handle.expire(5).await;

        assert_eq!(handle.in_flight().await.unwrap(), 0);
        assert!(handle.register(5, server).await.unwrap().is_some());
    }
}
