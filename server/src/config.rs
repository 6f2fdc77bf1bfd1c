use shared::{DEFAULT_PORT, DISCOVERY_PORT, MAP_HEIGHT, MAP_WIDTH};
use std::net::SocketAddr;
use std::time::Duration;

/// Resolved runtime settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the TCP game listener.
    pub bind_addr: SocketAddr,
    /// UDP port for LAN discovery; `None` disables the responder.
    pub discovery_port: Option<u16>,
    /// Name advertised to server browsers.
    pub server_name: String,
    pub tick_interval: Duration,
    pub max_clients: usize,
    /// A session with no inbound frame for this long is evicted.
    pub idle_timeout: Duration,
    /// Upper bound on how long a single reply write may take.
    pub write_timeout: Duration,
    pub max_bots: usize,
    pub map_width: f32,
    pub map_height: f32,
}

impl ServerConfig {
    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_interval = Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            discovery_port: Some(DISCOVERY_PORT),
            server_name: "Neon Arena".to_string(),
            tick_interval: Duration::from_millis(33),
            max_clients: 16,
            idle_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            max_bots: 32,
            map_width: MAP_WIDTH,
            map_height: MAP_HEIGHT,
        }
    }
}
