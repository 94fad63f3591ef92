use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur while reading or writing DNS packets
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("Buffer overrun: {requested} byte(s) at position {position} exceed the buffer")]
    BufferOverrun { position: usize, requested: usize },

    #[error("Truncated message: {section} section is shorter than the header declares")]
    TruncatedMessage { section: &'static str },

    #[error("Compression loop: more than {max_jumps} pointer jumps while reading a name")]
    CompressionLoop { max_jumps: usize },

    #[error("Invalid label length byte {0:#04x}")]
    InvalidLabelLength(u8),

    #[error("RDATA of type {qtype} needs {consumed} byte(s) but RDLENGTH declares {declared}")]
    InvalidRdataLength {
        qtype: u16,
        declared: u16,
        consumed: usize,
    },

    #[error("Label '{label}' exceeds maximum length of 63 bytes")]
    LabelTooLong { label: String },

    #[error("Record of unsupported type {qtype} cannot be encoded")]
    UnsupportedRecordEncode { qtype: u16 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the resolver while talking to upstream servers
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Packet error: {0}")]
    PacketError(#[from] PacketError),

    #[error("Timed out after {timeout:?} waiting for {server} to answer {domain}")]
    Timeout {
        domain: String,
        server: SocketAddr,
        timeout: Duration,
    },

    #[error("No free query id after {attempts} attempts")]
    IdsExhausted { attempts: usize },

    #[error("Pending query actor has shut down")]
    ActorClosed,

    #[error("No nameserver address could be found for {0}")]
    NoNameserver(String),

    #[error("Gave up on {domain} after {hops} referrals")]
    ReferralLimit { domain: String, hops: usize },
}
