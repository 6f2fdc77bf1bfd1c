//! LAN discovery over UDP.
//!
//! A client broadcasts [`DISCOVERY_QUERY`]; the server answers with
//! `NEON_SERVER|<name>|<human player count>`.

use crate::network::Command;
use log::{debug, warn};
use shared::{DISCOVERY_QUERY, DISCOVERY_TAG};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

/// Only the exact query is answered; anything else is ignored.
pub fn is_query(datagram: &[u8]) -> bool {
    datagram == DISCOVERY_QUERY
}

pub fn discovery_reply(server_name: &str, player_count: usize) -> String {
    format!("{}|{}|{}", DISCOVERY_TAG, server_name, player_count)
}

/// Answers discovery queries until the coordinator goes away.
pub async fn serve(socket: UdpSocket, server_name: String, commands: mpsc::Sender<Command>) {
    let mut buffer = [0u8; 64];

    loop {
        let (len, addr) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Discovery receive failed: {}", e);
                continue;
            }
        };
        if !is_query(&buffer[..len]) {
            continue;
        }

        let (reply, count) = oneshot::channel();
        if commands.send(Command::PlayerCount { reply }).await.is_err() {
            return;
        }
        let Ok(count) = count.await else {
            return;
        };

        let answer = discovery_reply(&server_name, count);
        debug!("Discovery query from {}, answering {}", addr, answer);
        if let Err(e) = socket.send_to(answer.as_bytes(), addr).await {
            warn!("Discovery reply to {} failed: {}", addr, e);
        }
    }
}
