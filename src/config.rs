use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Google's public DNS
pub const DEFAULT_UPSTREAM: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 53));

/// a.root-servers.net
pub const DEFAULT_ROOT: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(198, 41, 0, 4), 53));

pub const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 2053));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How client questions are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Send every question to one recursive resolver
    Forward { upstream: SocketAddr },
    /// Follow referrals down from a root server
    Iterative { root: SocketAddr },
}

/// Sockets and behaviour of the resolver, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Local address of the socket used for upstream queries
    pub outbound: SocketAddr,
    pub mode: ResolutionMode,
    /// How long to wait for an upstream response
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address serving client queries
    pub listen: SocketAddr,
    pub resolver: ResolverConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            outbound: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            mode: ResolutionMode::Forward {
                upstream: DEFAULT_UPSTREAM,
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            resolver: ResolverConfig::default(),
        }
    }
}
