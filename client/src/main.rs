use clap::Parser;
use client::discovery;
use client::input::ScriptedInput;
use client::network::Client;
use log::info;
use shared::DISCOVERY_PORT;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless arena client", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Nickname shown to other players (at most 12 characters)
    #[arg(short, long, default_value = "Player")]
    nickname: String,

    /// Appearance tag sent with the handshake
    #[arg(short, long, default_value = "DEFAULT")]
    appearance: String,

    /// Frames to play before disconnecting
    #[arg(short, long, default_value = "300")]
    cycles: u64,

    /// Frames per second
    #[arg(short, long, default_value = "30")]
    rate: u32,

    /// Chat line to send on the first frame, e.g. "/bot 3"
    #[arg(long)]
    say: Option<String>,

    /// List servers on the LAN and exit
    #[arg(long)]
    scan: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.scan {
        let target = SocketAddr::from(([255, 255, 255, 255], DISCOVERY_PORT));
        let servers = discovery::scan(target, Duration::from_secs(2)).await?;
        if servers.is_empty() {
            println!("No servers found");
        }
        for server in servers {
            println!("{} at {} ({} players)", server.name, server.game_addr(), server.players);
        }
        return Ok(());
    }

    info!("Connecting to: {}", args.server);
    let client = Client::connect(
        args.server.as_str(),
        &args.nickname,
        &args.appearance,
        Duration::from_secs(5),
    )
    .await?;

    let mut input = ScriptedInput::new(u64::from(client.game().id()));
    if let Some(text) = args.say {
        input = input.with_greeting(text);
    }

    let period = Duration::from_secs_f64(1.0 / args.rate.max(1) as f64);
    let game = client.with_input(input).run(args.cycles, period).await?;
    info!(
        "Done: {} hp at ({:.0}, {:.0}), {} other entities",
        game.me.health,
        game.me.x,
        game.me.y,
        game.others.len()
    );

    Ok(())
}
