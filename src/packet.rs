//! The complete DNS message: header, questions and the three record sections.

use std::net::Ipv4Addr;

use tracing::warn;

use crate::buffer::PacketCursor;
use crate::errors::PacketError;
use crate::protocol::{DnsPacketHeader, DnsQuestion, QueryType};
use crate::record::DnsRecord;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DnsPacket {
    pub header: DnsPacketHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additionals: Vec<DnsRecord>,
}

/// Any overrun while reading a section means the header promised more than the datagram holds
fn truncated(section: &'static str) -> impl Fn(PacketError) -> PacketError {
    move |err| match err {
        PacketError::BufferOverrun { .. } => PacketError::TruncatedMessage { section },
        other => other,
    }
}

impl DnsPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-question query asking the server to recurse
    pub fn new_query(id: u16, domain: &str, qtype: QueryType) -> Self {
        let mut packet = DnsPacket::new();
        packet.header.id = id;
        packet.header.rd = true;
        packet.questions.push(DnsQuestion::new(domain, qtype));
        packet
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        let mut cursor = PacketCursor::from_bytes(data)?;
        Self::read(&mut cursor)
    }

    pub fn read(cursor: &mut PacketCursor) -> Result<Self, PacketError> {
        let header = DnsPacketHeader::read(cursor).map_err(truncated("header"))?;

        let mut packet = DnsPacket {
            header,
            questions: Vec::with_capacity(header.qdcount as usize),
            answers: Vec::with_capacity(header.ancount as usize),
            authorities: Vec::with_capacity(header.nscount as usize),
            additionals: Vec::with_capacity(header.arcount as usize),
        };

        for _ in 0..header.qdcount {
            let question = DnsQuestion::read(cursor).map_err(truncated("question"))?;
            packet.questions.push(question);
        }

        for _ in 0..header.ancount {
            let record = DnsRecord::read(cursor).map_err(truncated("answer"))?;
            packet.answers.push(record);
        }

        for _ in 0..header.nscount {
            let record = DnsRecord::read(cursor).map_err(truncated("authority"))?;
            packet.authorities.push(record);
        }

        for _ in 0..header.arcount {
            let record = DnsRecord::read(cursor).map_err(truncated("additional"))?;
            packet.additionals.push(record);
        }

        Ok(packet)
    }

    /// Write the packet. The header counts are always taken from the lists
    /// actually written; records of unknown type are left out.
    pub fn write(&self, cursor: &mut PacketCursor) -> Result<(), PacketError> {
        let answers = encodable(&self.answers, "answer");
        let authorities = encodable(&self.authorities, "authority");
        let additionals = encodable(&self.additionals, "additional");

        let mut header = self.header;
        header.qdcount = self.questions.len() as u16;
        header.ancount = answers.len() as u16;
        header.nscount = authorities.len() as u16;
        header.arcount = additionals.len() as u16;

        header.write(cursor)?;

        for question in &self.questions {
            question.write(cursor)?;
        }

        for record in answers.into_iter().chain(authorities).chain(additionals) {
            record.write(cursor)?;
        }

        Ok(())
    }

    /// A uniformly chosen IPv4 address among the A records of the answer section
    pub fn random_answer_address(&self) -> Option<Ipv4Addr> {
        let addrs: Vec<Ipv4Addr> = self
            .answers
            .iter()
            .filter_map(|record| match record {
                DnsRecord::A { addr, .. } => Some(*addr),
                _ => None,
            })
            .collect();

        if addrs.is_empty() {
            return None;
        }

        Some(addrs[fastrand::usize(..addrs.len())])
    }

    /// (zone, nameserver host) pairs from the authority section whose zone contains `qname`
    pub fn nameservers_for<'a>(
        &'a self,
        qname: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.authorities
            .iter()
            .filter_map(|record| match record {
                DnsRecord::NS { domain, host, .. } => Some((domain.as_str(), host.as_str())),
                _ => None,
            })
            .filter(move |(domain, _)| in_zone(qname, domain))
    }

    /// The first glue address in the additional section for a nameserver of `qname`
    pub fn resolved_nameserver_address(&self, qname: &str) -> Option<Ipv4Addr> {
        self.nameservers_for(qname)
            .flat_map(|(_, host)| {
                self.additionals.iter().filter_map(move |record| match record {
                    DnsRecord::A { domain, addr, .. } if domain.eq_ignore_ascii_case(host) => {
                        Some(*addr)
                    }
                    _ => None,
                })
            })
            .next()
    }

    /// The first nameserver host for `qname`, to be looked up when no glue is present
    pub fn unresolved_nameserver_host<'a>(&'a self, qname: &'a str) -> Option<&'a str> {
        self.nameservers_for(qname).map(|(_, host)| host).next()
    }
}

fn encodable<'a>(records: &'a [DnsRecord], section: &'static str) -> Vec<&'a DnsRecord> {
    records
        .iter()
        .filter(|record| match record {
            DnsRecord::Unknown { qtype, domain, .. } => {
                warn!(
                    section,
                    qtype,
                    domain = %domain,
                    "Skipping record of unsupported type"
                );
                false
            }
            _ => true,
        })
        .collect()
}

/// Label-wise containment: `www.example.com` is in `example.com`, `badexample.com` is not
fn in_zone(qname: &str, zone: &str) -> bool {
    let qname = qname.trim_end_matches('.');
    let zone = zone.trim_end_matches('.');

    if zone.is_empty() || qname.eq_ignore_ascii_case(zone) {
        return true;
    }

    let (qname, zone) = (qname.as_bytes(), zone.as_bytes());
    qname.len() > zone.len()
        && qname[qname.len() - zone.len() - 1] == b'.'
        && qname[qname.len() - zone.len()..].eq_ignore_ascii_case(zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResultCode;
    use std::net::Ipv6Addr;

    fn encode(packet: &DnsPacket) -> Vec<u8> {
        let mut cursor = PacketCursor::new();
        packet.write(&mut cursor).unwrap();
        cursor.as_slice().to_vec()
    }

    fn referral() -> DnsPacket {
        let mut packet = DnsPacket::new();
        packet.authorities = vec![
            DnsRecord::NS {
                domain: "com".to_string(),
                host: "a.gtld-servers.net".to_string(),
                ttl: 172800,
            },
            DnsRecord::NS {
                domain: "com".to_string(),
                host: "b.gtld-servers.net".to_string(),
                ttl: 172800,
            },
            DnsRecord::NS {
                domain: "org".to_string(),
                host: "a0.org.afilias-nst.info".to_string(),
                ttl: 172800,
            },
        ];
        packet
    }

    #[test]
    fn test_decode_canonical_response() {
        let mut data = vec![
            0x1A, 0x2B, // id
            0x81, 0x80, // response, rd, ra
            0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, // counts 1/1/0/0
        ];
        // question: example.com A IN
        data.push(7);
        data.extend_from_slice(b"example");
        data.push(3);
        data.extend_from_slice(b"com");
        data.extend_from_slice(&[0, 0x00, 0x01, 0x00, 0x01]);
        // answer: pointer to the question name, A IN, ttl 300, 93.184.216.34
        data.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        data.extend_from_slice(&300u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x04, 93, 184, 216, 34]);

        let packet = DnsPacket::from_bytes(&data).unwrap();

        assert_eq!(packet.header.id, 0x1A2B);
        assert!(packet.header.qr);
        assert!(packet.header.rd);
        assert!(packet.header.ra);
        assert_eq!(packet.header.rcode, ResultCode::NoError);
        assert_eq!(
            packet.questions,
            vec![DnsQuestion::new("example.com", QueryType::A)]
        );
        assert_eq!(
            packet.answers,
            vec![DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(93, 184, 216, 34),
                ttl: 300,
            }]
        );
        assert!(packet.authorities.is_empty());
        assert!(packet.additionals.is_empty());
    }

    #[test]
    fn test_round_trip_all_record_types() {
        let mut packet = DnsPacket::new();
        packet.header.id = 0x5678;
        packet.header.qr = true;
        packet.header.rd = true;
        packet.header.ra = true;
        packet.header.rcode = ResultCode::NoError;
        packet.questions = vec![
            DnsQuestion::new("example.com", QueryType::A),
            DnsQuestion::new("example.com", QueryType::MX),
        ];
        packet.answers = vec![
            DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(93, 184, 216, 34),
                ttl: 300,
            },
            DnsRecord::AAAA {
                domain: "example.com".to_string(),
                addr: Ipv6Addr::new(0x2606, 0x2800, 0x220, 1, 0x248, 0x1893, 0x25c8, 0x1946),
                ttl: 300,
            },
            DnsRecord::CNAME {
                domain: "www.example.com".to_string(),
                host: "example.com".to_string(),
                ttl: 60,
            },
            DnsRecord::MX {
                domain: "example.com".to_string(),
                priority: 10,
                host: "mail.example.com".to_string(),
                ttl: 7200,
            },
        ];
        packet.authorities = vec![DnsRecord::NS {
            domain: "example.com".to_string(),
            host: "a.iana-servers.net".to_string(),
            ttl: 172800,
        }];
        packet.additionals = vec![DnsRecord::A {
            domain: "a.iana-servers.net".to_string(),
            addr: Ipv4Addr::new(199, 43, 135, 53),
            ttl: 172800,
        }];

        let bytes = encode(&packet);
        let mut decoded = DnsPacket::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.header.qdcount, 2);
        assert_eq!(decoded.header.ancount, 4);
        assert_eq!(decoded.header.nscount, 1);
        assert_eq!(decoded.header.arcount, 1);

        // the source packet carried zero counts; everything else must match
        decoded.header.qdcount = 0;
        decoded.header.ancount = 0;
        decoded.header.nscount = 0;
        decoded.header.arcount = 0;
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_counts_are_recomputed_from_lists() {
        let mut packet = DnsPacket::new();
        packet.header.ancount = 0;
        packet.header.qdcount = 99;
        packet.answers = vec![
            DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(1, 1, 1, 1),
                ttl: 60,
            },
            DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(1, 0, 0, 1),
                ttl: 60,
            },
        ];

        let bytes = encode(&packet);

        // QDCOUNT is at bytes 4-5, ANCOUNT at 6-7
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 0);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 2);

        let decoded = DnsPacket::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.header.ancount, 2);
        assert_eq!(decoded.answers, packet.answers);
    }

    #[test]
    fn test_unknown_records_are_skipped_on_write() {
        let mut packet = DnsPacket::new();
        packet.answers = vec![
            DnsRecord::Unknown {
                domain: "example.com".to_string(),
                qtype: 16,
                data_len: 12,
                ttl: 60,
            },
            DnsRecord::A {
                domain: "example.com".to_string(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 60,
            },
        ];

        let decoded = DnsPacket::from_bytes(&encode(&packet)).unwrap();

        assert_eq!(decoded.header.ancount, 1);
        assert_eq!(decoded.answers, packet.answers[1..].to_vec());
    }

    #[test]
    fn test_declared_counts_beyond_data_are_truncated() {
        let query = DnsPacket::new_query(7, "example.com", QueryType::A);
        let mut bytes = encode(&query);
        // claim one answer that is not there
        bytes[7] = 1;

        let err = DnsPacket::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PacketError::TruncatedMessage { section: "answer" }
        ));

        let err = DnsPacket::from_bytes(&bytes[..8]).unwrap_err();
        assert!(matches!(
            err,
            PacketError::TruncatedMessage { section: "header" }
        ));
    }

    #[test]
    fn test_compression_loop_surfaces_from_packet_decode() {
        let mut bytes = vec![0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1]);

        assert!(matches!(
            DnsPacket::from_bytes(&bytes),
            Err(PacketError::CompressionLoop { .. })
        ));
    }

    #[test]
    fn test_new_query() {
        let query = DnsPacket::new_query(6666, "example.com", QueryType::AAAA);

        assert_eq!(query.header.id, 6666);
        assert!(query.header.rd);
        assert!(!query.header.qr);
        assert_eq!(query.questions.len(), 1);
        assert_eq!(query.questions[0].qtype, QueryType::AAAA);
    }

    #[test]
    fn test_random_answer_address() {
        let mut packet = DnsPacket::new();
        assert_eq!(packet.random_answer_address(), None);

        packet.answers.push(DnsRecord::CNAME {
            domain: "www.example.com".to_string(),
            host: "example.com".to_string(),
            ttl: 60,
        });
        assert_eq!(packet.random_answer_address(), None);

        let candidates = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        for addr in candidates {
            packet.answers.push(DnsRecord::A {
                domain: "example.com".to_string(),
                addr,
                ttl: 60,
            });
        }

        for _ in 0..20 {
            let picked = packet.random_answer_address().unwrap();
            assert!(candidates.contains(&picked));
        }
    }

    #[test]
    fn test_nameservers_for_uses_zone_containment() {
        let packet = referral();

        let servers: Vec<_> = packet.nameservers_for("www.google.com").collect();
        assert_eq!(
            servers,
            vec![
                ("com", "a.gtld-servers.net"),
                ("com", "b.gtld-servers.net")
            ]
        );

        assert_eq!(packet.nameservers_for("google.org").count(), 1);
        assert_eq!(packet.nameservers_for("google.net").count(), 0);
        // a string suffix is not a zone suffix
        assert_eq!(packet.nameservers_for("dotcom").count(), 0);
    }

    #[test]
    fn test_resolved_nameserver_address_uses_glue() {
        let mut packet = referral();
        assert_eq!(packet.resolved_nameserver_address("google.com"), None);

        packet.additionals = vec![
            DnsRecord::A {
                domain: "a0.org.afilias-nst.info".to_string(),
                addr: Ipv4Addr::new(199, 19, 56, 1),
                ttl: 172800,
            },
            DnsRecord::A {
                domain: "b.gtld-servers.net".to_string(),
                addr: Ipv4Addr::new(192, 33, 14, 30),
                ttl: 172800,
            },
        ];

        assert_eq!(
            packet.resolved_nameserver_address("google.com"),
            Some(Ipv4Addr::new(192, 33, 14, 30))
        );
        assert_eq!(
            packet.resolved_nameserver_address("example.org"),
            Some(Ipv4Addr::new(199, 19, 56, 1))
        );
        assert_eq!(packet.resolved_nameserver_address("example.net"), None);
    }

    #[test]
    fn test_unresolved_nameserver_host() {
        let packet = referral();

        assert_eq!(
            packet.unresolved_nameserver_host("google.com"),
            Some("a.gtld-servers.net")
        );
        assert_eq!(packet.unresolved_nameserver_host("example.net"), None);
    }

    #[test]
    fn test_in_zone() {
        assert!(in_zone("www.example.com", "example.com"));
        assert!(in_zone("example.com", "example.com"));
        assert!(in_zone("WWW.Example.com.", "example.COM"));
        assert!(in_zone("anything.at.all", ""));
        assert!(!in_zone("badexample.com", "example.com"));
        assert!(!in_zone("com", "example.com"));
    }
}
