use bytes::BytesMut;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::UdpSocket;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

use crate::codec::DnsCodec;
use crate::packet::DnsPacket;
use crate::protocol::ResultCode;
use crate::resolver::Resolver;
use crate::response_builder::DnsResponseBuilder;

// Process DNS query in an asynchronous manner
pub async fn process_dns_query(
    packet_data: Vec<u8>,
    addr: SocketAddr,
    resolver: Arc<Resolver>,
    sock: Arc<UdpSocket>,
) {
    // Create a BytesMut from the received data
    let mut bytes_mut = BytesMut::from(&packet_data[..]);

    debug!("Received {} bytes from {}", packet_data.len(), addr);

    // Create a new DNS codec instance.
    let mut codec = DnsCodec::new();

    // Use the codec to decode the DNS packet
    let packet = match codec.decode(&mut bytes_mut) {
        Ok(Some(packet)) => packet,
        Ok(None) => {
            info!("Incomplete packet received from {}, ignoring", addr);
            return;
        }
        Err(e) => {
            error!("Failed to decode DNS packet from {}: {}", addr, e);
            return;
        }
    };

    debug!(
        target: "dns_forwarder::packet_details",
        packet_id = packet.header.id,
        query_response = if packet.header.qr { "Response" } else { "Query" },
        opcode = packet.header.opcode,
        authoritative = packet.header.aa,
        truncated = packet.header.tc,
        recursion_desired = packet.header.rd,
        recursion_available = packet.header.ra,
        response_code = %packet.header.rcode,
        question_count = packet.header.qdcount,
        answer_count = packet.header.ancount,
        authority_count = packet.header.nscount,
        additional_count = packet.header.arcount,
        "DNS packet header parsed successfully"
    );

    let response_packet = answer_query(&resolver, &packet, addr).await;

    // Encode the response packet
    let mut response_buf = BytesMut::new();
    if let Err(e) = codec.encode(response_packet, &mut response_buf) {
        error!("Failed to encode DNS response for {}: {}", addr, e);
        return;
    }

    match sock.send_to(&response_buf, addr).await {
        Ok(response_len) => info!("Sent DNS response ({} bytes) to {}", response_len, addr),
        Err(e) => error!("Failed to send DNS response to {}: {}", addr, e),
    }
}

/// Build the reply to a decoded client query. Only the first question is answered.
pub async fn answer_query(resolver: &Resolver, packet: &DnsPacket, addr: SocketAddr) -> DnsPacket {
    let mut dns_response_builder = DnsResponseBuilder::new();

    let Some(question) = packet.questions.first() else {
        warn!("Query {} from {} has no question", packet.header.id, addr);
        return dns_response_builder.build_error_response(packet, ResultCode::FormatError);
    };

    let response_builder_fluent = dns_response_builder
        .build_custom_response(packet)
        // leave Packet Identifier (ID) intact
        .with_qr(true)
        .with_authoritative(false)
        .with_recursion_available(true)
        .with_z(0)
        .with_question(question.clone());

    match resolver.lookup(&question.name, question.qtype).await {
        Ok(upstream) => {
            info!(
                "Resolved {} -> {} ({} answers)",
                question,
                upstream.header.rcode,
                upstream.answers.len()
            );
            for record in &upstream.answers {
                debug!("{}", record);
            }
            response_builder_fluent.with_upstream(&upstream).build()
        }
        Err(e) => {
            error!("Could not resolve {}: {}", question, e);
            response_builder_fluent
                .with_rcode(ResultCode::ServerFailure)
                .build()
        }
    }
}
