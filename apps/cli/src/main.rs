//! wgstream CLI
//!
//! Diagnostics for tunnels carried over dialed streams: validate a config,
//! resolve peer endpoints, and probe a peer with a single datagram.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use wgstream_bind::{Bind, ClientBind, NetBind};
use wgstream_core::{IpOption, SystemResolver, TcpDialer};
use wgstream_logging::LogLevel;
use wgstream_settings::{WireGuardConfig, DEFAULT_MTU};

/// wgstream - WireGuard datagrams over stream transports
#[derive(Parser)]
#[command(name = "wgstream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Resolve IPv4 addresses only
    #[arg(long, global = true, conflicts_with = "ipv6_only")]
    ipv4_only: bool,

    /// Resolve IPv6 addresses only
    #[arg(long, global = true)]
    ipv6_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a tunnel config and resolve its peers
    Check {
        /// Path to the JSON config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Resolve an endpoint and show its wire form
    Resolve {
        /// Peer address, host:port
        endpoint: String,
    },

    /// Send one datagram to a peer over TCP and wait for a reply
    Probe {
        /// Peer address, host:port
        endpoint: String,

        /// Reserved tag, three comma-separated bytes
        #[arg(short, long, value_delimiter = ',')]
        reserved: Vec<u8>,

        /// Seconds to wait for the reply
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// Size of the probe datagram in bytes
        #[arg(short, long, default_value = "32")]
        size: usize,
    },
}

impl Cli {
    fn log_level(&self) -> LogLevel {
        match self.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn ip_option(&self) -> IpOption {
        if self.ipv4_only {
            IpOption::ipv4_only()
        } else if self.ipv6_only {
            IpOption::ipv6_only()
        } else {
            IpOption::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    wgstream_logging::try_init(cli.log_level())?;

    let ip_option = cli.ip_option();
    match cli.command {
        Commands::Check { config } => {
            check(&config, ip_option).await?;
        }
        Commands::Resolve { endpoint } => {
            resolve(&endpoint, ip_option).await?;
        }
        Commands::Probe {
            endpoint,
            reserved,
            timeout,
            size,
        } => {
            probe(&endpoint, ip_option, &reserved, Duration::from_secs(timeout), size).await?;
        }
    }

    Ok(())
}

fn resolving_bind(ip_option: IpOption) -> NetBind {
    NetBind::new(Arc::new(SystemResolver), ip_option, 1)
}

async fn check(path: &Path, ip_option: IpOption) -> Result<()> {
    let config = WireGuardConfig::load_from(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let device = config.build().context("Invalid tunnel config")?;

    println!("Mode:      {}", if device.is_client { "client" } else { "server" });
    println!("Addresses: {}", device.addresses.join(", "));
    println!("MTU:       {}", device.mtu);
    println!("Workers:   {}", device.workers.max(1));
    match &device.reserved {
        Some(tag) => println!("Reserved:  {:?}", tag.as_bytes()),
        None => println!("Reserved:  none"),
    }

    let bind = resolving_bind(ip_option);
    let mut unresolved = 0;
    for (i, peer) in device.peers.iter().enumerate() {
        println!();
        println!("Peer {}:", i);
        println!("  Allowed IPs: {}", peer.allowed_ips.join(", "));
        if peer.keep_alive > 0 {
            println!("  Keepalive:   {}s", peer.keep_alive);
        }

        if peer.endpoint.is_empty() {
            println!("  Endpoint:    none");
            continue;
        }
        match bind.parse_endpoint(&peer.endpoint).await {
            Ok(endpoint) => {
                println!("  Endpoint:    {} -> {}", peer.endpoint, endpoint.dst_to_string());
            }
            Err(e) => {
                warn!("Peer {} endpoint {} unresolved: {}", i, peer.endpoint, e);
                println!("  Endpoint:    {} (unresolved: {})", peer.endpoint, e);
                unresolved += 1;
            }
        }
    }

    if unresolved > 0 {
        bail!("{} peer endpoint(s) could not be resolved", unresolved);
    }
    info!("Config OK");
    Ok(())
}

async fn resolve(endpoint: &str, ip_option: IpOption) -> Result<()> {
    let bind = resolving_bind(ip_option);
    let endpoint = bind
        .parse_endpoint(endpoint)
        .await
        .with_context(|| format!("Failed to resolve {}", endpoint))?;

    println!("{}", endpoint.destination());
    println!("Address: {}", endpoint.dst_to_string());
    println!("Bytes:   {}", hex::encode(endpoint.dst_to_bytes()));
    Ok(())
}

async fn probe(
    endpoint: &str,
    ip_option: IpOption,
    reserved: &[u8],
    timeout: Duration,
    size: usize,
) -> Result<()> {
    if size == 0 || size > DEFAULT_MTU as usize {
        bail!("Probe size must be between 1 and {}", DEFAULT_MTU);
    }

    let bind = ClientBind::new(
        resolving_bind(ip_option),
        Arc::new(TcpDialer::with_timeout(timeout)),
        reserved,
    )
    .context("Invalid reserved tag")?;

    let (mut receivers, _) = bind.open(0)?;
    let mut receiver = receivers.pop().context("Bind opened without workers")?;

    let endpoint = bind
        .parse_endpoint(endpoint)
        .await
        .with_context(|| format!("Failed to resolve {}", endpoint))?;
    info!("Probing {} with {} bytes", endpoint.dst_to_string(), size);

    let mut packet = probe_packet(size);
    bind.send(&mut packet, &endpoint).await.context("Probe send failed")?;

    let mut buf = vec![0u8; DEFAULT_MTU as usize + 80];
    let reply = tokio::time::timeout(timeout, receiver.recv(&mut buf)).await;
    bind.close()?;

    let (n, from) = reply
        .context("No reply before timeout")?
        .context("Probe receive failed")?;
    println!("Reply from {}: {} bytes", from.dst_to_string(), n);
    println!("{}", hex::encode(&buf[..n]));
    Ok(())
}

/// Datagram with a handshake-initiation type byte and zeroed body
fn probe_packet(size: usize) -> Vec<u8> {
    let mut packet = vec![0u8; size];
    packet[0] = 1;
    packet
}
