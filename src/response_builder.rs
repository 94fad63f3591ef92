use crate::packet::DnsPacket;
use crate::protocol::{DnsPacketHeader, DnsQuestion, ResultCode};
use crate::record::DnsRecord;

/// Builder for the responses sent back to clients
pub struct DnsResponseBuilder {
    // Pre-allocated response header template
    response_header: DnsPacketHeader,
    questions: Vec<DnsQuestion>,
    answers: Vec<DnsRecord>,
    authorities: Vec<DnsRecord>,
    additionals: Vec<DnsRecord>,
}

impl DnsResponseBuilder {
    /// Create a new response builder
    pub fn new() -> Self {
        Self {
            response_header: DnsPacketHeader {
                qr: true, // Always a response
                rd: true,
                ra: true, // Recursion available
                ..DnsPacketHeader::default()
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Echo the query's id and questions with the builder's current sections
    pub fn build_response(&mut self, query_packet: &DnsPacket) -> DnsPacket {
        self.response_header.id = query_packet.header.id; // Echo the query ID
        self.response_header.opcode = query_packet.header.opcode;
        self.response_header.qdcount = query_packet.questions.len() as u16;
        self.response_header.ancount = self.answers.len() as u16;
        self.response_header.nscount = self.authorities.len() as u16;
        self.response_header.arcount = self.additionals.len() as u16;

        DnsPacket {
            header: self.response_header,
            questions: query_packet.questions.clone(),
            answers: self.answers.clone(),
            authorities: self.authorities.clone(),
            additionals: self.additionals.clone(),
        }
    }

    /// A response carrying only `rcode`, for queries that get no answer
    pub fn build_error_response(&mut self, query_packet: &DnsPacket, rcode: ResultCode) -> DnsPacket {
        self.response_header.rcode = rcode;
        self.answers.clear();
        self.authorities.clear();
        self.additionals.clear();
        self.build_response(query_packet)
    }

    /// Build response with custom settings
    pub fn build_custom_response<'a>(
        &'a mut self,
        query_packet: &'a DnsPacket,
    ) -> ResponseBuilder<'a> {
        ResponseBuilder {
            builder: self,
            query_packet,
        }
    }
}

/// Fluent interface for building custom responses
pub struct ResponseBuilder<'a> {
    builder: &'a mut DnsResponseBuilder,
    query_packet: &'a DnsPacket,
}

impl<'a> ResponseBuilder<'a> {
    /// Set response code
    pub fn with_rcode(self, rcode: ResultCode) -> Self {
        self.builder.response_header.rcode = rcode;
        self
    }

    /// Set qr (query/response) flag
    pub fn with_qr(self, qr: bool) -> Self {
        self.builder.response_header.qr = qr;
        self
    }

    /// Set reserved bits (z)
    pub fn with_z(self, z: u8) -> Self {
        self.builder.response_header.z = z;
        self
    }

    /// Set authoritative flag
    pub fn with_authoritative(self, aa: bool) -> Self {
        self.builder.response_header.aa = aa;
        self
    }

    /// Set recursion available flag
    pub fn with_recursion_available(self, ra: bool) -> Self {
        self.builder.response_header.ra = ra;
        self
    }

    /// Answer a single question instead of echoing all of the query's
    pub fn with_question(self, question: DnsQuestion) -> Self {
        self.builder.questions.clear();
        self.builder.questions.push(question);
        self.builder.response_header.qdcount = 1;
        self
    }

    /// Take the rcode and all three record sections of an upstream response
    pub fn with_upstream(self, upstream: &DnsPacket) -> Self {
        self.builder.response_header.rcode = upstream.header.rcode;
        self.builder.answers.extend(upstream.answers.iter().cloned());
        self.builder.authorities.extend(upstream.authorities.iter().cloned());
        self.builder.additionals.extend(upstream.additionals.iter().cloned());

        self.builder.response_header.ancount = self.builder.answers.len() as u16;
        self.builder.response_header.nscount = self.builder.authorities.len() as u16;
        self.builder.response_header.arcount = self.builder.additionals.len() as u16;
        self
    }

    /// Build the final response
    pub fn build(self) -> DnsPacket {
        if self.builder.questions.is_empty() {
            // Fall back to original query questions
            return self.builder.build_response(self.query_packet);
        }

        self.builder.response_header.id = self.query_packet.header.id;
        self.builder.response_header.opcode = self.query_packet.header.opcode;

        let built_packet = DnsPacket {
            header: self.builder.response_header,
            questions: self.builder.questions.clone(),
            answers: self.builder.answers.clone(),
            authorities: self.builder.authorities.clone(),
            additionals: self.builder.additionals.clone(),
        };

        tracing::debug!(
            "DNS Response built with custom settings: {:?}",
            built_packet.header
        );

        built_packet
    }
}

impl Default for DnsResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
