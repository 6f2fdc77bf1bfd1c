//! Bookkeeping for live connections.
//!
//! Tracks which entity id each connection owns, enforces the capacity
//! limit and detects sessions that went silent. Eviction fires the
//! session's shutdown signal so its task closes the socket.

use crate::world::BOT_ID_BASE;
use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// One accepted connection.
#[derive(Debug)]
pub struct Client {
    /// Entity id owned by this connection
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time a frame arrived from this client
    pub last_seen: Instant,
    /// Set once the INIT handshake completed
    pub nickname: Option<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Client {
    /// Creates a client record for a freshly accepted connection
    ///
    /// The client counts as active from this moment. The shutdown sender
    /// is kept until eviction or removal fires it.
    pub fn new(id: u32, addr: SocketAddr, shutdown: oneshot::Sender<()>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            nickname: None,
            shutdown: Some(shutdown),
        }
    }

    /// Marks the client as active now
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Tells the session task to close. Safe to call more than once.
    pub fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Registry of all live connections
///
/// Owned by the coordinator, so it is only ever touched from one task.
/// Player ids count up from 1 and never reach the bot id range.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a connection and assigns its entity id.
    ///
    /// Returns `None` when the server is full or player ids would run into
    /// the bot range.
    pub fn add_client(&mut self, addr: SocketAddr, shutdown: oneshot::Sender<()>) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }
        if self.next_client_id >= BOT_ID_BASE {
            warn!("Player id space exhausted");
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, shutdown));
        Some(client_id)
    }

    /// Removes a client and signals its session to close
    ///
    /// Returns `false` if the id was already gone, e.g. after an eviction
    /// raced with the session's own `Leave`.
    pub fn remove_client(&mut self, client_id: u32) -> bool {
        match self.clients.remove(&client_id) {
            Some(mut client) => {
                client.signal_shutdown();
                info!("Client {} ({}) disconnected", client.id, client.addr);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// Refreshes the idle timer of `client_id`. Returns whether it exists.
    pub fn touch(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Removes every client silent for longer than `timeout`, signalling
    /// each one to close. Returns the evicted ids.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            warn!("Client {} timed out", client_id);
            self.remove_client(*client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn signal() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
        oneshot::channel()
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = signal();
        let client = Client::new(1, test_addr(), tx);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert!(client.nickname.is_none());
    }

    #[test]
    fn test_client_timeout() {
        let (tx, _rx) = signal();
        let mut client = Client::new(1, test_addr(), tx);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, _rx1) = signal();
        let (tx2, _rx2) = signal();

        assert_eq!(manager.add_client(test_addr(), tx1), Some(1));
        assert_eq!(manager.add_client(test_addr2(), tx2), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = signal();
        let (tx2, _rx2) = signal();

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr2(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = ClientManager::new(2);
        let (tx1, _rx1) = signal();
        let (tx2, _rx2) = signal();

        let first = manager.add_client(test_addr(), tx1).unwrap();
        manager.remove_client(first);
        let second = manager.add_client(test_addr(), tx2).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_client_signals_session() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = signal();

        let id = manager.add_client(test_addr(), tx).unwrap();
        assert!(manager.remove_client(id));
        assert!(rx.try_recv().is_ok());
        assert!(manager.is_empty());
        assert!(!manager.remove_client(id));
    }

    #[test]
    fn test_check_timeouts_evicts_silent_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = signal();
        let (tx2, mut rx2) = signal();

        let stale = manager.add_client(test_addr(), tx1).unwrap();
        let fresh = manager.add_client(test_addr2(), tx2).unwrap();
        manager.get_mut(stale).unwrap().last_seen = Instant::now() - Duration::from_secs(30);

        let evicted = manager.check_timeouts(Duration::from_secs(10));
        assert_eq!(evicted, vec![stale]);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
        assert!(manager.get(fresh).is_some());
        assert!(manager.touch(fresh));
        assert!(!manager.touch(stale));
    }
}
