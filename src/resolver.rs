//! Upstream resolution over UDP.
//!
//! A `Resolver` owns the outbound socket. Every lookup gets a fresh random
//! query id registered in the pending query table; a background task reads
//! all upstream responses and hands each one to the lookup waiting on its id,
//! so any number of lookups can be in flight at once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::future::{BoxFuture, FutureExt};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

use crate::buffer::MAX_PACKET_SIZE;
use crate::codec::DnsCodec;
use crate::config::{ResolutionMode, ResolverConfig};
use crate::errors::ResolverError;
use crate::handlers::pending_handler::PendingQueriesHandle;
use crate::packet::DnsPacket;
use crate::protocol::{QueryType, ResultCode};

/// Random ids tried before giving up on finding one not in flight
const MAX_ID_ATTEMPTS: usize = 32;

/// Referrals followed for one name in iterative mode
const MAX_REFERRALS: usize = 16;

/// Nested nameserver lookups allowed in iterative mode
const MAX_NAMESERVER_DEPTH: usize = 4;

pub struct Resolver {
    socket: Arc<UdpSocket>,
    mode: ResolutionMode,
    timeout: Duration,
    pending: PendingQueriesHandle,
    receiver: JoinHandle<()>,
}

impl Resolver {
    /// Bind the outbound socket and start reading upstream responses
    pub async fn bind(config: ResolverConfig) -> Result<Self, ResolverError> {
        let socket = Arc::new(UdpSocket::bind(config.outbound).await?);
        let pending = PendingQueriesHandle::new(config.timeout);
        let receiver = tokio::spawn(receive_responses(socket.clone(), pending.clone()));

        info!(
            outbound = %socket.local_addr()?,
            mode = ?config.mode,
            timeout_ms = config.timeout.as_millis() as u64,
            "Resolver ready"
        );

        Ok(Self {
            socket,
            mode: config.mode,
            timeout: config.timeout,
            pending,
            receiver,
        })
    }

    /// Number of upstream queries still waiting for a response
    pub async fn in_flight(&self) -> Result<usize, ResolverError> {
        self.pending.in_flight().await
    }

    /// Answer a question the configured way: forward it, or walk down from the root
    pub async fn lookup(&self, domain: &str, qtype: QueryType) -> Result<DnsPacket, ResolverError> {
        match self.mode {
            ResolutionMode::Forward { upstream } => self.lookup_at(domain, qtype, upstream).await,
            ResolutionMode::Iterative { root } => {
                self.resolve_iterative(domain, qtype, root, 0).await
            }
        }
    }

    /// One query/response exchange with `server`, asking it to recurse
    pub async fn lookup_at(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
    ) -> Result<DnsPacket, ResolverError> {
        self.exchange(domain, qtype, server, true).await
    }

    async fn exchange(
        &self,
        domain: &str,
        qtype: QueryType,
        server: SocketAddr,
        recursion_desired: bool,
    ) -> Result<DnsPacket, ResolverError> {
        let (id, response) = self.register(server).await?;

        let mut query = DnsPacket::new_query(id, domain, qtype);
        query.header.rd = recursion_desired;
        let mut buf = BytesMut::with_capacity(MAX_PACKET_SIZE);
        if let Err(e) = DnsCodec::new().encode(query, &mut buf) {
            error!("Failed to encode query for {}: {}", domain, e);
            self.pending.expire(id).await;
            return Err(e.into());
        }

        if let Err(e) = self.socket.send_to(&buf, server).await {
            error!("Failed to send query for {} to {}: {}", domain, server, e);
            self.pending.expire(id).await;
            return Err(e.into());
        }

        debug!(
            id,
            domain,
            qtype = %qtype,
            server = %server,
            rd = recursion_desired,
            bytes_sent = buf.len(),
            "Query sent upstream"
        );

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(packet)) => Ok(packet),
            // Evicted by the sweep before the response arrived
            Ok(Err(_)) => Err(self.timed_out(domain, server)),
            Err(_) => {
                self.pending.expire(id).await;
                Err(self.timed_out(domain, server))
            }
        }
    }

    fn timed_out(&self, domain: &str, server: SocketAddr) -> ResolverError {
        warn!("Timed out waiting for {} to answer {}", server, domain);
        ResolverError::Timeout {
            domain: domain.to_string(),
            server,
            timeout: self.timeout,
        }
    }

    async fn register(
        &self,
        server: SocketAddr,
    ) -> Result<(u16, oneshot::Receiver<DnsPacket>), ResolverError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = fastrand::u16(..);
            if let Some(response) = self.pending.register(id, server).await? {
                return Ok((id, response));
            }
        }

        Err(ResolverError::IdsExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Resolve `qname` by following referrals down from `root`.
    ///
    /// Queries go out with `rd` cleared; every server is asked only for what it knows.
    /// Nameservers named without glue are themselves resolved from the root.
    /// Every server is contacted on the root's port.
    pub fn resolve_iterative<'a>(
        &'a self,
        qname: &'a str,
        qtype: QueryType,
        root: SocketAddr,
        depth: usize,
    ) -> BoxFuture<'a, Result<DnsPacket, ResolverError>> {
        async move {
            let mut ns = root;

            for hop in 0..MAX_REFERRALS {
                debug!(qname, qtype = %qtype, ns = %ns, hop, depth, "Iterative lookup step");

                let response = self.exchange(qname, qtype, ns, false).await?;

                if !response.answers.is_empty() && response.header.rcode == ResultCode::NoError {
                    return Ok(response);
                }

                if response.header.rcode == ResultCode::NameError {
                    return Ok(response);
                }

                if let Some(addr) = response.resolved_nameserver_address(qname) {
                    ns = SocketAddr::new(addr.into(), root.port());
                    continue;
                }

                let host = match response.unresolved_nameserver_host(qname).map(str::to_owned) {
                    Some(host) => host,
                    None => return Ok(response),
                };

                if depth >= MAX_NAMESERVER_DEPTH {
                    return Err(ResolverError::NoNameserver(host));
                }

                let ns_response = self
                    .resolve_iterative(&host, QueryType::A, root, depth + 1)
                    .await?;

                match ns_response.random_answer_address() {
                    Some(addr) => ns = SocketAddr::new(addr.into(), root.port()),
                    None => return Ok(response),
                }
            }

            Err(ResolverError::ReferralLimit {
                domain: qname.to_string(),
                hops: MAX_REFERRALS,
            })
        }
        .boxed()
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

// Read every upstream datagram and route it to its waiting lookup
async fn receive_responses(socket: Arc<UdpSocket>, pending: PendingQueriesHandle) {
    let mut codec = DnsCodec::new();
    let mut buf = [0u8; MAX_PACKET_SIZE];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Failed to receive upstream response: {}", e);
                continue;
            }
        };

        let mut bytes_mut = BytesMut::from(&buf[..len]);

        match codec.decode(&mut bytes_mut) {
            Ok(Some(packet)) => {
                debug!(
                    id = packet.header.id,
                    from = %from,
                    rcode = %packet.header.rcode,
                    answers = packet.answers.len(),
                    authorities = packet.authorities.len(),
                    additionals = packet.additionals.len(),
                    "Upstream response received"
                );

                if pending.complete(packet, from).await.is_err() {
                    error!("Pending query actor is gone, stopping upstream receiver");
                    break;
                }
            }
            Ok(None) => {
                debug!("Incomplete upstream response from {}, ignoring", from);
            }
            Err(e) => {
                warn!("Failed to decode upstream response from {}: {}", from, e);
            }
        }
    }
}
