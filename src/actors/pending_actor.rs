// Import necessary modules and types
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::actors::messages::PendingActorMessage;
use crate::packet::DnsPacket;

/// A query sent upstream whose response has not arrived yet
#[derive(Debug)]
struct PendingQuery {
    server: SocketAddr,
    respond_to: oneshot::Sender<DnsPacket>,
    issued_at: Instant,
}

/// Owns the table of in-flight upstream queries, keyed by query id.
/// Receives messages from the PendingQueriesHandle and processes them accordingly.
pub struct PendingQueryActor {
    // The receiver for incoming messages
    receiver: mpsc::Receiver<PendingActorMessage>,

    // Outstanding queries by id
    in_flight: HashMap<u16, PendingQuery>,

    // Entries older than this are evicted by the sweep
    max_age: Duration,
}

impl PendingQueryActor {
    // Constructor for the actor
    pub fn new(receiver: mpsc::Receiver<PendingActorMessage>, max_age: Duration) -> Self {
        Self {
            receiver,
            in_flight: HashMap::new(),
            max_age,
        }
    }

    // Run the actor
    pub async fn run(&mut self) {
        let mut sweep = time::interval(self.max_age.max(Duration::from_millis(1)));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    // every handle is gone
                    None => break,
                },
                _ = sweep.tick() => self.evict_stale(),
            }
        }
    }

    // Handle a message
    pub fn handle_message(&mut self, msg: PendingActorMessage) {
        match msg {
            PendingActorMessage::Register {
                id,
                server,
                respond_to,
                registered,
            } => {
                let free = !self.in_flight.contains_key(&id);
                if free {
                    debug!(id, server = %server, "Registering pending query");
                    self.in_flight.insert(
                        id,
                        PendingQuery {
                            server,
                            respond_to,
                            issued_at: Instant::now(),
                        },
                    );
                }
                let _ = registered.send(free);
            }

            PendingActorMessage::Complete { packet, from } => {
                let id = packet.header.id;
                match self.in_flight.get(&id) {
                    Some(pending) if pending.server != from => {
                        warn!(
                            id,
                            expected = %pending.server,
                            received_from = %from,
                            "Response from unexpected source, dropping"
                        );
                    }
                    Some(_) => {
                        if let Some(pending) = self.in_flight.remove(&id) {
                            debug!(
                                id,
                                elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
                                "Completing pending query"
                            );
                            // The waiter may have given up already
                            let _ = pending.respond_to.send(packet);
                        }
                    }
                    None => {
                        warn!(id, from = %from, "Response for unknown query id, dropping");
                    }
                }
            }

            PendingActorMessage::Expire { id } => {
                if self.in_flight.remove(&id).is_some() {
                    debug!(id, "Expired pending query");
                }
            }

            PendingActorMessage::InFlight { respond_to } => {
                let _ = respond_to.send(self.in_flight.len());
            }
        }
    }

    // Drop entries that outlived max_age or whose waiter went away
    fn evict_stale(&mut self) {
        let max_age = self.max_age;
        let before = self.in_flight.len();

        self.in_flight.retain(|_, pending| {
            pending.issued_at.elapsed() < max_age && !pending.respond_to.is_closed()
        });

        let evicted = before - self.in_flight.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.in_flight.len(), "Evicted stale pending queries");
        }
    }
}
