use dns_forwarder::cli;
use dns_forwarder::server::DnsServer;

use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse_args();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = args.server_config();
    let server = DnsServer::bind(&config).await?;

    info!(
        listen = %server.local_addr()?,
        mode = ?config.resolver.mode,
        "Starting DNS server"
    );

    server.run().await?;

    Ok(())
}
