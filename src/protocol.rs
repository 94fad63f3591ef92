// DNS header and question section structures, with their wire encoding

use std::fmt;

use crate::buffer::PacketCursor;
use crate::errors::PacketError;

// DNS Class Constants
pub const DNS_CLASS_IN: u16 = 1; // Internet

/// Response code carried in the low 4 bits of the header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultCode {
    #[default]
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl ResultCode {
    /// Unrecognized codes fall back to `NoError`
    pub fn from_num(num: u8) -> ResultCode {
        match num {
            1 => ResultCode::FormatError,
            2 => ResultCode::ServerFailure,
            3 => ResultCode::NameError,
            4 => ResultCode::NotImplemented,
            5 => ResultCode::Refused,
            _ => ResultCode::NoError,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::NoError => "NOERROR",
            ResultCode::FormatError => "FORMERR",
            ResultCode::ServerFailure => "SERVFAIL",
            ResultCode::NameError => "NXDOMAIN",
            ResultCode::NotImplemented => "NOTIMP",
            ResultCode::Refused => "REFUSED",
        };
        write!(f, "{}", name)
    }
}

/// Record type, https://www.rfc-editor.org/rfc/rfc1035#section-3.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    NS,
    CNAME,
    MX,
    AAAA,
    Unknown(u16),
}

impl QueryType {
    pub fn to_num(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::NS => 2,
            QueryType::CNAME => 5,
            QueryType::MX => 15,
            QueryType::AAAA => 28,
            QueryType::Unknown(num) => num,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::NS,
            5 => QueryType::CNAME,
            15 => QueryType::MX,
            28 => QueryType::AAAA,
            _ => QueryType::Unknown(num),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::A => write!(f, "A"),
            QueryType::NS => write!(f, "NS"),
            QueryType::CNAME => write!(f, "CNAME"),
            QueryType::MX => write!(f, "MX"),
            QueryType::AAAA => write!(f, "AAAA"),
            QueryType::Unknown(num) => write!(f, "TYPE{}", num),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsPacketHeader {
    pub id: u16,             // Identifier, 16 bits
    pub qr: bool,            // Query or Response, 1 bit
    pub opcode: u8,          // Operation code, 4 bits
    pub aa: bool,            // Authoritative answer, 1 bit
    pub tc: bool,            // Truncated, 1 bit
    pub rd: bool,            // Recursion desired, 1 bit
    pub ra: bool,            // Recursion available, 1 bit
    pub z: u8,               // Reserved for future use, 3 bits
    pub rcode: ResultCode,   // Response code, 4 bits
    pub qdcount: u16,        // Number of questions, 16 bits
    pub ancount: u16,        // Number of answers, 16 bits
    pub nscount: u16,        // Number of authority records, 16 bits
    pub arcount: u16,        // Number of additional records, 16 bits
}

impl DnsPacketHeader {
    pub const SIZE: usize = 12;

    pub fn read(cursor: &mut PacketCursor) -> Result<Self, PacketError> {
        let id = cursor.read_u16()?;

        // high byte: QR | OPCODE x4 | AA | TC | RD
        // low byte:  RA | Z x3 | RCODE x4
        let flags = cursor.read_u16()?;
        let high = (flags >> 8) as u8;
        let low = (flags & 0xFF) as u8;

        Ok(DnsPacketHeader {
            id,
            qr: high & 0x80 != 0,
            opcode: (high >> 3) & 0x0F,
            aa: high & 0x04 != 0,
            tc: high & 0x02 != 0,
            rd: high & 0x01 != 0,
            ra: low & 0x80 != 0,
            z: (low >> 4) & 0x07,
            rcode: ResultCode::from_num(low & 0x0F),
            qdcount: cursor.read_u16()?,
            ancount: cursor.read_u16()?,
            nscount: cursor.read_u16()?,
            arcount: cursor.read_u16()?,
        })
    }

    pub fn write(&self, cursor: &mut PacketCursor) -> Result<(), PacketError> {
        cursor.write_u16(self.id)?;

        let mut flags: u16 = 0;

        // QR (1 bit) - bit 15
        if self.qr {
            flags |= 0x8000;
        }

        // OPCODE (4 bits) - bits 14-11
        flags |= ((self.opcode as u16) & 0x0F) << 11;

        // AA (1 bit) - bit 10
        if self.aa {
            flags |= 0x0400;
        }

        // TC (1 bit) - bit 9
        if self.tc {
            flags |= 0x0200;
        }

        // RD (1 bit) - bit 8
        if self.rd {
            flags |= 0x0100;
        }

        // RA (1 bit) - bit 7
        if self.ra {
            flags |= 0x0080;
        }

        // Z (3 bits) - bits 6-4
        flags |= ((self.z as u16) & 0x07) << 4;

        // RCODE (4 bits) - bits 3-0
        flags |= (self.rcode as u16) & 0x0F;

        cursor.write_u16(flags)?;
        cursor.write_u16(self.qdcount)?;
        cursor.write_u16(self.ancount)?;
        cursor.write_u16(self.nscount)?;
        cursor.write_u16(self.arcount)
    }
}

// Define the DNS question section structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,     // Domain name, represented as a sequence of "labels"
    pub qtype: QueryType, // Query type (e.g., A, AAAA, CNAME)
}

impl DnsQuestion {
    pub fn new(name: impl Into<String>, qtype: QueryType) -> Self {
        Self {
            name: name.into(),
            qtype,
        }
    }

    pub fn read(cursor: &mut PacketCursor) -> Result<Self, PacketError> {
        let name = cursor.read_name()?;
        let qtype = QueryType::from_num(cursor.read_u16()?);
        let _qclass = cursor.read_u16()?; // always assumed IN

        Ok(DnsQuestion { name, qtype })
    }

    pub fn write(&self, cursor: &mut PacketCursor) -> Result<(), PacketError> {
        cursor.write_name(&self.name)?;
        cursor.write_u16(self.qtype.to_num())?;
        cursor.write_u16(DNS_CLASS_IN)
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} IN {}", self.name, self.qtype)
    }
}
