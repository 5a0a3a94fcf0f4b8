use anyhow::Context;
use clap::Parser;
use engine_app::{TickConfig, TickScheduler, World, WorldConfig};
use engine_component::PeerId;
use engine_net::connection::server_addr_from_env;
use tracing::info;

#[derive(Parser)]
#[command(name = "arena", about = "Replicated platform arena")]
struct Args {
    /// Run as the authoritative host instead of a client
    #[arg(long)]
    server: bool,

    /// Address to bind (host) or connect to (client); defaults to ENGINE_SERVER_ADDR or 127.0.0.1:5560
    #[arg(short, long)]
    addr: Option<String>,

    /// Simulation ticks per second
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Network flushes per second
    #[arg(long, default_value_t = 20.0)]
    network_tick_rate: f64,

    /// Send batches uncompressed (every peer must agree)
    #[arg(long)]
    no_compression: bool,

    /// Client identity; a random UUID if omitted
    #[arg(short, long)]
    identity: Option<String>,

    /// Stop after this many simulation ticks (0 = run until disconnected)
    #[arg(long, default_value_t = 0)]
    max_ticks: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| arena::DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let args = Args::parse();
    let addr = args.addr.unwrap_or_else(server_addr_from_env);

    let mut world = if args.server {
        let config = WorldConfig::host().with_compression(!args.no_compression);
        let world = World::host(config, addr.as_str())
            .with_context(|| format!("failed to listen on {addr}"))?;
        if let Some(local) = world.local_addr() {
            info!(%local, "hosting arena");
        }
        world
    } else {
        let identity = args.identity.map_or_else(PeerId::generate, PeerId::from);
        let config = WorldConfig::client(identity).with_compression(!args.no_compression);
        info!(identity = %config.identity, %addr, "joining arena");
        World::client(config, addr.as_str())
            .with_context(|| format!("failed to connect to {addr}"))?
    };
    arena::install(&mut world);

    let mut scheduler = TickScheduler::new(TickConfig {
        max_tick_rate: args.tick_rate,
        network_tick_rate: args.network_tick_rate,
        max_ticks: args.max_ticks,
    });
    scheduler.run(&mut world);
    Ok(())
}
