use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::buffer::MAX_PACKET_SIZE;
use crate::config::ServerConfig;
use crate::errors::ResolverError;
use crate::processor::process_dns_query;
use crate::resolver::Resolver;

/// Serves client queries on one UDP socket, answering each through the resolver
pub struct DnsServer {
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
}

impl DnsServer {
    /// Bind the inbound socket and the resolver's outbound socket
    pub async fn bind(config: &ServerConfig) -> Result<Self, ResolverError> {
        let socket = Arc::new(UdpSocket::bind(config.listen).await?);
        let resolver = Arc::new(Resolver::bind(config.resolver).await?);

        Ok(Self { socket, resolver })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive client datagrams forever, one task per query
    pub async fn run(self) -> Result<(), ResolverError> {
        info!("DNS server listening on {}", self.local_addr()?);

        let mut buf = [0; MAX_PACKET_SIZE];

        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Failed to receive client query: {}", e);
                    continue;
                }
            };
            debug!("Received {} bytes from {}", len, addr);

            tokio::spawn(process_dns_query(
                buf[..len].to_vec(),
                addr,
                self.resolver.clone(),
                self.socket.clone(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PacketCursor;
    use crate::config::{ResolutionMode, ResolverConfig};
    use crate::packet::DnsPacket;
    use crate::protocol::{QueryType, ResultCode};
    use crate::record::DnsRecord;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::time::timeout;

    fn encode(packet: &DnsPacket) -> Vec<u8> {
        let mut cursor = PacketCursor::new();
        packet.write(&mut cursor).unwrap();
        cursor.as_slice().to_vec()
    }

    /// A loopback upstream answering every query with one A record
    async fn answering_upstream(addr: Ipv4Addr) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let local = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                let Ok(query) = DnsPacket::from_bytes(&buf[..len]) else {
                    continue;
                };

                let mut reply = DnsPacket::new();
                reply.header.id = query.header.id;
                reply.header.qr = true;
                reply.header.rd = true;
                reply.header.ra = true;
                reply.answers.push(DnsRecord::A {
                    domain: query.questions[0].name.clone(),
                    addr,
                    ttl: 300,
                });
                reply.questions = query.questions;

                let _ = socket.send_to(&encode(&reply), from).await;
            }
        });

        local
    }

    async fn start_server(upstream: SocketAddr, upstream_timeout: Duration) -> SocketAddr {
        let config = ServerConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            resolver: ResolverConfig {
                outbound: "127.0.0.1:0".parse().unwrap(),
                mode: ResolutionMode::Forward { upstream },
                timeout: upstream_timeout,
            },
        };

        let server = DnsServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn client() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    async fn receive(client: &UdpSocket) -> Option<DnsPacket> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        match timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(DnsPacket::from_bytes(&buf[..len]).unwrap()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_forwarded_answer_reaches_client() {
        let upstream = answering_upstream(Ipv4Addr::new(93, 184, 216, 34)).await;
        let server = start_server(upstream, Duration::from_secs(2)).await;
        let client = client().await;

        let query = DnsPacket::new_query(0xBEEF, "example.com", QueryType::A);
        client.send_to(&encode(&query), server).await.unwrap();

        let response = receive(&client).await.expect("no response from server");

        assert_eq!(response.header.id, 0xBEEF);
        assert!(response.header.qr);
        assert!(response.header.rd);
        assert!(response.header.ra);
        assert_eq!(response.header.rcode, ResultCode::NoError);
        assert_eq!(response.questions, query.questions);
        assert_eq!(
            response.answers,
            vec![DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(93, 184, 216, 34),
                ttl: 300,
            }]
        );
    }

    #[tokio::test]
    async fn test_query_without_question_gets_format_error() {
        let upstream = answering_upstream(Ipv4Addr::LOCALHOST).await;
        let server = start_server(upstream, Duration::from_secs(2)).await;
        let client = client().await;

        let mut query = DnsPacket::new();
        query.header.id = 7;
        client.send_to(&encode(&query), server).await.unwrap();

        let response = receive(&client).await.expect("no response from server");

        assert_eq!(response.header.id, 7);
        assert!(response.header.qr);
        assert_eq!(response.header.rcode, ResultCode::FormatError);
        assert!(response.answers.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_gets_no_reply() {
        let upstream = answering_upstream(Ipv4Addr::LOCALHOST).await;
        let server = start_server(upstream, Duration::from_secs(2)).await;
        let client = client().await;

        // too short for a header
        client.send_to(&[0xde, 0xad, 0xbe, 0xef], server).await.unwrap();
        assert!(receive(&client).await.is_none());

        // header promises a question that is not there
        let truncated = [0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        client.send_to(&truncated, server).await.unwrap();
        assert!(receive(&client).await.is_none());
    }

    #[tokio::test]
    async fn test_silent_upstream_gets_server_failure() {
        // bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = start_server(silent.local_addr().unwrap(), Duration::from_millis(50)).await;
        let client = client().await;

        let query = DnsPacket::new_query(99, "slow.example", QueryType::AAAA);
        client.send_to(&encode(&query), server).await.unwrap();

        let response = receive(&client).await.expect("no response from server");

        assert_eq!(response.header.id, 99);
        assert_eq!(response.header.rcode, ResultCode::ServerFailure);
        assert_eq!(response.questions, query.questions);
        assert!(response.answers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_upstream_send_gets_server_failure() {
        // the IPv4 outbound socket cannot reach an IPv6 upstream
        let server = start_server("[::1]:53".parse().unwrap(), Duration::from_secs(2)).await;
        let client = client().await;

        let query = DnsPacket::new_query(314, "unreachable.example", QueryType::A);
        client.send_to(&encode(&query), server).await.unwrap();

        let response = receive(&client).await.expect("no response from server");

        assert_eq!(response.header.id, 314);
        assert_eq!(response.header.rcode, ResultCode::ServerFailure);
        assert_eq!(response.questions, query.questions);
    }
}
