//! Resource records, one variant per supported record type.
//!
//! Records of any other type decode to [`DnsRecord::Unknown`]: the owner name,
//! type, TTL and RDLENGTH are kept, the payload is skipped, and the record
//! cannot be written back out.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::debug;

use crate::buffer::PacketCursor;
use crate::errors::PacketError;
use crate::protocol::{QueryType, DNS_CLASS_IN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecord {
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: u32,
    },
    AAAA {
        domain: String,
        addr: Ipv6Addr,
        ttl: u32,
    },
    NS {
        domain: String,
        host: String,
        ttl: u32,
    },
    CNAME {
        domain: String,
        host: String,
        ttl: u32,
    },
    MX {
        domain: String,
        priority: u16,
        host: String,
        ttl: u32,
    },
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: u32,
    },
}

impl DnsRecord {
    pub fn read(cursor: &mut PacketCursor) -> Result<DnsRecord, PacketError> {
        let domain = cursor.read_name()?;

        let qtype_num = cursor.read_u16()?;
        let qtype = QueryType::from_num(qtype_num);
        let _class = cursor.read_u16()?;
        let ttl = cursor.read_u32()?;
        let data_len = cursor.read_u16()?;

        let rdata_start = cursor.pos();

        let record = match qtype {
            QueryType::A => {
                let raw = cursor.read_u32()?;
                DnsRecord::A {
                    domain,
                    addr: Ipv4Addr::from(raw),
                    ttl,
                }
            }
            QueryType::AAAA => {
                let mut segments = [0u16; 8];
                for pair in segments.chunks_exact_mut(2) {
                    let raw = cursor.read_u32()?;
                    pair[0] = (raw >> 16) as u16;
                    pair[1] = (raw & 0xFFFF) as u16;
                }
                DnsRecord::AAAA {
                    domain,
                    addr: Ipv6Addr::from(segments),
                    ttl,
                }
            }
            QueryType::NS => DnsRecord::NS {
                domain,
                host: cursor.read_name()?,
                ttl,
            },
            QueryType::CNAME => DnsRecord::CNAME {
                domain,
                host: cursor.read_name()?,
                ttl,
            },
            QueryType::MX => {
                let priority = cursor.read_u16()?;
                let host = cursor.read_name()?;
                DnsRecord::MX {
                    domain,
                    priority,
                    host,
                    ttl,
                }
            }
            QueryType::Unknown(_) => {
                cursor.advance(data_len as usize)?;
                DnsRecord::Unknown {
                    domain,
                    qtype: qtype_num,
                    data_len,
                    ttl,
                }
            }
        };

        // RDLENGTH decides where the next record starts
        let rdata_end = rdata_start + data_len as usize;
        let consumed = cursor.pos() - rdata_start;

        // The payload ran into the next record's bytes
        if cursor.pos() > rdata_end {
            return Err(PacketError::InvalidRdataLength {
                qtype: qtype_num,
                declared: data_len,
                consumed,
            });
        }

        if cursor.pos() < rdata_end {
            debug!(
                qtype = %qtype,
                declared = data_len,
                consumed,
                "RDATA shorter than declared length, skipping the rest"
            );
            cursor.seek(rdata_end)?;
        }

        Ok(record)
    }

    pub fn write(&self, cursor: &mut PacketCursor) -> Result<(), PacketError> {
        match self {
            DnsRecord::A { domain, addr, ttl } => {
                write_preamble(cursor, domain, QueryType::A, *ttl)?;
                cursor.write_u16(4)?;
                cursor.write_bytes(&addr.octets())?;
            }
            DnsRecord::AAAA { domain, addr, ttl } => {
                write_preamble(cursor, domain, QueryType::AAAA, *ttl)?;
                cursor.write_u16(16)?;
                for segment in addr.segments() {
                    cursor.write_u16(segment)?;
                }
            }
            DnsRecord::NS { domain, host, ttl } => {
                write_preamble(cursor, domain, QueryType::NS, *ttl)?;
                write_rdata(cursor, |c| c.write_name(host))?;
            }
            DnsRecord::CNAME { domain, host, ttl } => {
                write_preamble(cursor, domain, QueryType::CNAME, *ttl)?;
                write_rdata(cursor, |c| c.write_name(host))?;
            }
            DnsRecord::MX {
                domain,
                priority,
                host,
                ttl,
            } => {
                write_preamble(cursor, domain, QueryType::MX, *ttl)?;
                write_rdata(cursor, |c| {
                    c.write_u16(*priority)?;
                    c.write_name(host)
                })?;
            }
            DnsRecord::Unknown { qtype, .. } => {
                return Err(PacketError::UnsupportedRecordEncode { qtype: *qtype });
            }
        }

        Ok(())
    }

    pub fn domain(&self) -> &str {
        match self {
            DnsRecord::A { domain, .. }
            | DnsRecord::AAAA { domain, .. }
            | DnsRecord::NS { domain, .. }
            | DnsRecord::CNAME { domain, .. }
            | DnsRecord::MX { domain, .. }
            | DnsRecord::Unknown { domain, .. } => domain,
        }
    }

    pub fn ttl(&self) -> u32 {
        match self {
            DnsRecord::A { ttl, .. }
            | DnsRecord::AAAA { ttl, .. }
            | DnsRecord::NS { ttl, .. }
            | DnsRecord::CNAME { ttl, .. }
            | DnsRecord::MX { ttl, .. }
            | DnsRecord::Unknown { ttl, .. } => *ttl,
        }
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::AAAA { .. } => QueryType::AAAA,
            DnsRecord::NS { .. } => QueryType::NS,
            DnsRecord::CNAME { .. } => QueryType::CNAME,
            DnsRecord::MX { .. } => QueryType::MX,
            DnsRecord::Unknown { qtype, .. } => QueryType::Unknown(*qtype),
        }
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} IN {} ", self.domain(), self.ttl(), self.query_type())?;
        match self {
            DnsRecord::A { addr, .. } => write!(f, "{}", addr),
            DnsRecord::AAAA { addr, .. } => write!(f, "{}", addr),
            DnsRecord::NS { host, .. } | DnsRecord::CNAME { host, .. } => write!(f, "{}", host),
            DnsRecord::MX { priority, host, .. } => write!(f, "{} {}", priority, host),
            DnsRecord::Unknown { data_len, .. } => write!(f, "\\# {}", data_len),
        }
    }
}

// NAME, TYPE, CLASS, TTL: everything before RDLENGTH
fn write_preamble(
    cursor: &mut PacketCursor,
    domain: &str,
    qtype: QueryType,
    ttl: u32,
) -> Result<(), PacketError> {
    cursor.write_name(domain)?;
    cursor.write_u16(qtype.to_num())?;
    cursor.write_u16(DNS_CLASS_IN)?;
    cursor.write_u32(ttl)
}

/// Write a variable-length RDATA: placeholder length, payload, then back-patch.
fn write_rdata<F>(cursor: &mut PacketCursor, payload: F) -> Result<(), PacketError>
where
    F: FnOnce(&mut PacketCursor) -> Result<(), PacketError>,
{
    let len_pos = cursor.pos();
    cursor.write_u16(0)?;

    payload(cursor)?;

    let size = cursor.pos() - (len_pos + 2);
    cursor.set_u16(len_pos, size as u16)
}
