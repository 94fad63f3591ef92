//! DNS packet codec for tokio_util
//!
//! This module provides Decoder and Encoder implementations for DNS packets,
//! so datagrams received into a `BytesMut` can be turned into `DnsPacket`s and
//! back. Every call works on its own `PacketCursor`.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error};

use crate::buffer::PacketCursor;
use crate::errors::PacketError;
use crate::packet::DnsPacket;
use crate::protocol::DnsPacketHeader;

/// DNS packet codec for use with tokio_util framed streams
#[derive(Debug, Default)]
pub struct DnsCodec;

impl DnsCodec {
    /// Create a new DNS codec instance
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for DnsCodec {
    type Item = DnsPacket;
    type Error = PacketError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // DNS packets need at least 12 bytes for the header
        if src.len() < DnsPacketHeader::SIZE {
            debug!(
                "Insufficient bytes for DNS header: {} < {}",
                src.len(),
                DnsPacketHeader::SIZE
            );
            return Ok(None);
        }

        // For UDP DNS packets, we expect complete packets in each datagram
        let mut cursor = PacketCursor::from_bytes(src.as_ref())?;

        match DnsPacket::read(&mut cursor) {
            Ok(packet) => {
                // Remove the consumed bytes from the buffer
                let _ = src.split_to(cursor.pos());
                Ok(Some(packet))
            }
            Err(e) => {
                error!("DNS parsing error: {}", e);
                Err(e)
            }
        }
    }
}

impl Encoder<DnsPacket> for DnsCodec {
    type Error = PacketError;

    fn encode(&mut self, item: DnsPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        debug!("DnsCodec::encode called for packet ID {}", item.header.id);

        let mut cursor = PacketCursor::new();
        item.write(&mut cursor)?;

        let bytes = cursor.as_slice();
        dst.reserve(bytes.len());
        dst.put_slice(bytes);

        Ok(())
    }
}
