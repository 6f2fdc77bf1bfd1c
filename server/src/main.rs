use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use shared::{DEFAULT_PORT, DISCOVERY_PORT};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative arena server", long_about = None)]
struct Args {
    /// Address to bind the game listener to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// TCP port for game sessions
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// UDP port answering LAN discovery queries
    #[arg(long, default_value_t = DISCOVERY_PORT)]
    discovery_port: u16,

    /// Do not answer LAN discovery queries
    #[arg(long)]
    no_discovery: bool,

    /// Name advertised to server browsers
    #[arg(short, long, default_value = "Neon Arena")]
    name: String,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum concurrent players
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds of silence before a session is evicted
    #[arg(long, default_value = "10")]
    idle_timeout: u64,

    /// Upper bound on live bots
    #[arg(long, default_value = "32")]
    max_bots: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            discovery_port: (!self.no_discovery).then_some(self.discovery_port),
            server_name: self.name,
            max_clients: self.max_clients,
            idle_timeout: Duration::from_secs(self.idle_timeout.max(1)),
            max_bots: self.max_bots,
            ..ServerConfig::default()
        }
        .with_tick_rate(self.tick_rate)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting server '{}' on {} at {:.0}Hz",
        config.server_name,
        config.bind_addr,
        1.0 / config.tick_interval.as_secs_f64()
    );

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            eprintln!("Could not start the server: {}", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
