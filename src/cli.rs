use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::{
    ResolutionMode, ResolverConfig, ServerConfig, DEFAULT_LISTEN, DEFAULT_ROOT, DEFAULT_UPSTREAM,
};

#[derive(Parser, Debug)]
#[command(name = "dns-forwarder")]
#[command(about = "A forwarding DNS server written in Rust", long_about = None)]
pub struct Args {
    /// Address to serve client queries on, of the form <ip>:<port>
    #[arg(short, long, value_parser = parse_socket_addr, default_value_t = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Local address for upstream queries, of the form <ip>:<port> (port 0 picks one)
    #[arg(short, long, value_parser = parse_socket_addr, default_value = "0.0.0.0:0")]
    pub outbound: SocketAddr,

    /// Resolver, where <address> will be of the form <ip>:<port>
    #[arg(short, long, value_parser = parse_socket_addr)]
    pub resolver: Option<SocketAddr>,

    /// Resolve iteratively from a root server instead of forwarding
    #[arg(short, long, conflicts_with = "resolver")]
    pub iterative: bool,

    /// Root server used in iterative mode, of the form <ip>:<port>
    #[arg(long, value_parser = parse_socket_addr, default_value_t = DEFAULT_ROOT)]
    pub root: SocketAddr,

    /// Milliseconds to wait for an upstream response
    #[arg(short, long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_socket_addr(s: &str) -> Result<SocketAddr, String> {
    s.parse::<SocketAddr>().map_err(|_| {
        format!(
            "Invalid address format: '{}'. Expected format: <ip>:<port>",
            s
        )
    })
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn resolver(&self) -> Option<SocketAddr> {
        self.resolver
    }

    pub fn mode(&self) -> ResolutionMode {
        if self.iterative {
            ResolutionMode::Iterative { root: self.root }
        } else {
            ResolutionMode::Forward {
                upstream: self.resolver().unwrap_or(DEFAULT_UPSTREAM),
            }
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
            resolver: ResolverConfig {
                outbound: self.outbound,
                mode: self.mode(),
                timeout: Duration::from_millis(self.timeout_ms),
            },
        }
    }
}
