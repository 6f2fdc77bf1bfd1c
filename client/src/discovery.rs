//! LAN server browser.

use log::debug;
use shared::{DEFAULT_PORT, DISCOVERY_QUERY, DISCOVERY_TAG};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

/// One server that answered a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Where the discovery reply came from
    pub addr: SocketAddr,
    pub name: String,
    pub players: usize,
}

impl ServerInfo {
    /// Game sessions are assumed on the default port of the same host.
    pub fn game_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr.ip(), DEFAULT_PORT)
    }
}

/// Parses `NEON_SERVER|<name>|<count>`. The name may itself contain `|`,
/// so the count is taken from the right.
pub fn parse_reply(datagram: &[u8], from: SocketAddr) -> Option<ServerInfo> {
    let text = std::str::from_utf8(datagram).ok()?;
    let (tag, rest) = text.split_once('|')?;
    if tag != DISCOVERY_TAG {
        return None;
    }
    let (name, count) = rest.rsplit_once('|')?;
    let players = count.trim().parse().ok()?;
    Some(ServerInfo {
        addr: from,
        name: name.to_string(),
        players,
    })
}

/// Sends one discovery query to `target` (usually a broadcast address) and
/// collects replies for `wait`.
pub async fn scan(target: SocketAddr, wait: Duration) -> io::Result<Vec<ServerInfo>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(DISCOVERY_QUERY, target).await?;

    let deadline = Instant::now() + wait;
    let mut buffer = [0u8; 256];
    let mut found = Vec::new();

    while let Ok(received) = timeout_at(deadline, socket.recv_from(&mut buffer)).await {
        let (len, from) = received?;
        match parse_reply(&buffer[..len], from) {
            Some(info) if !found.contains(&info) => found.push(info),
            Some(_) => {}
            None => debug!("Ignoring stray datagram from {}", from),
        }
    }

    Ok(found)
}
