//! Server network layer: TCP accept loop, session tasks and the
//! coordinator that owns the world.
//!
//! Sessions never touch the [`World`] directly. They send [`Command`]s over
//! a channel and wait for the reply, so every packet and every tick is
//! applied by one task in arrival order.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::discovery;
use crate::session::{self, SessionLimits};
use crate::simulation::{self, TickReport};
use crate::world::World;
use log::{debug, error, info, warn};
use shared::{Player, Snapshot, Update};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

const COMMAND_QUEUE: usize = 1024;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const STATS_EVERY_TICKS: u64 = 300;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Requests sent from session tasks to the coordinator
#[derive(Debug)]
pub enum Command {
    /// A connection was accepted; allocate an entity or refuse.
    Join {
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        reply: oneshot::Sender<Result<Player, String>>,
    },
    Init {
        id: u32,
        nickname: String,
        appearance: String,
        reply: oneshot::Sender<Option<Snapshot>>,
    },
    Update {
        id: u32,
        update: Box<Update>,
        reply: oneshot::Sender<Option<Snapshot>>,
    },
    Leave {
        id: u32,
        reason: String,
    },
    /// Number of human players, for discovery replies.
    PlayerCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Sole owner of the world and the connection registry.
pub struct Coordinator {
    world: World,
    clients: ClientManager,
    max_bots: usize,
}

impl Coordinator {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_world(World::new(config.map_width, config.map_height), config)
    }

    /// Wraps an existing world, e.g. one built with a fixed seed.
    pub fn with_world(world: World, config: &ServerConfig) -> Self {
        Self {
            world,
            clients: ClientManager::new(config.max_clients),
            max_bots: config.max_bots,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn clients_mut(&mut self) -> &mut ClientManager {
        &mut self.clients
    }

    /// Applies one command from a session or the discovery responder
    ///
    /// Each command is handled to completion before the next one is read,
    /// so a whole UPDATE (merge, hits, abilities, chat, reply) never
    /// interleaves with a tick or with another client's packet. Replies
    /// whose receiver is gone are dropped silently.
    pub fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Join {
                addr,
                shutdown,
                reply,
            } => {
                let Some(id) = self.clients.add_client(addr, shutdown) else {
                    warn!("Refusing {}: server full", addr);
                    let _ = reply.send(Err("Server full".to_string()));
                    return;
                };
                let player = self.world.add_player(id);
                if reply.send(Ok(player)).is_err() {
                    // Session died before it heard back.
                    self.drop_client(id);
                }
            }
            Command::Init {
                id,
                nickname,
                appearance,
                reply,
            } => {
                if let Some(client) = self.clients.get_mut(id) {
                    client.touch();
                    client.nickname = Some(nickname.clone());
                }
                info!("Player {} joined as '{}'", id, nickname);
                let snapshot =
                    session::process_init(&mut self.world, id, &nickname, &appearance, now);
                let _ = reply.send(snapshot);
            }
            Command::Update { id, update, reply } => {
                self.clients.touch(id);
                let snapshot =
                    session::process_update(&mut self.world, id, *update, self.max_bots, now);
                let _ = reply.send(snapshot);
            }
            Command::Leave { id, reason } => {
                debug!("Player {} leaving: {}", id, reason);
                self.drop_client(id);
            }
            Command::PlayerCount { reply } => {
                let _ = reply.send(self.world.human_count());
            }
        }
    }

    fn drop_client(&mut self, id: u32) {
        self.clients.remove_client(id);
        self.world.remove_player(id);
    }

    /// Runs one simulation step.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        simulation::tick(&mut self.world, now)
    }

    /// Evicts sessions silent for longer than `timeout` and removes their
    /// entities. The session tasks close their sockets on the signal.
    pub fn evict_idle(&mut self, timeout: Duration) -> Vec<u32> {
        let evicted = self.clients.check_timeouts(timeout);
        for id in &evicted {
            self.world.remove_player(*id);
        }
        evicted
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    discovery: Option<UdpSocket>,
    coordinator: Coordinator,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
}

impl Server {
    /// Binds the game listener and, if configured, the discovery socket
    ///
    /// Failing to bind the game port is fatal and returned as
    /// [`ServerError::Bind`]. A discovery port that cannot be bound is only
    /// logged; the server then runs without LAN discovery.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        // Discovery is optional; games are served without it.
        let discovery = match config.discovery_port {
            Some(port) => {
                let addr = SocketAddr::new(config.bind_addr.ip(), port);
                match UdpSocket::bind(addr).await {
                    Ok(socket) => {
                        info!("Discovery responder on {}", socket.local_addr()?);
                        Some(socket)
                    }
                    Err(e) => {
                        warn!("Discovery disabled, cannot bind {}: {}", addr, e);
                        None
                    }
                }
            }
            None => None,
        };

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        Ok(Server {
            coordinator: Coordinator::new(&config),
            config,
            listener,
            discovery,
            commands_tx,
            commands_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    /// Spawns the task accepting connections, one session task each
    fn spawn_acceptor(
        listener: TcpListener,
        commands: mpsc::Sender<Command>,
        limits: SessionLimits,
    ) {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("set_nodelay failed for {}: {}", peer, e);
                        }
                        tokio::spawn(session::run(stream, peer, commands.clone(), limits));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main server loop coordinating all operations
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            config,
            listener,
            discovery,
            mut coordinator,
            commands_tx,
            mut commands_rx,
        } = self;

        let limits = SessionLimits {
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
        };
        Self::spawn_acceptor(listener, commands_tx.clone(), limits);
        if let Some(socket) = discovery {
            tokio::spawn(discovery::serve(
                socket,
                config.server_name.clone(),
                commands_tx.clone(),
            ));
        }
        drop(commands_tx);

        let mut tick_interval = interval(config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_interval = interval(SWEEP_INTERVAL);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                command = commands_rx.recv() => {
                    match command {
                        Some(command) => coordinator.handle_command(command, Instant::now()),
                        None => {
                            info!("All command senders closed, shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let report = coordinator.tick(Instant::now());
                    if report.kills > 0 {
                        debug!("Tick {}: {} kill(s) by bot fire", report.tick, report.kills);
                    }
                    if report.tick % STATS_EVERY_TICKS == 0 {
                        let world = coordinator.world();
                        debug!(
                            "Tick {}: {} players, {} bots, {} walls",
                            report.tick,
                            world.human_count(),
                            world.bot_count(),
                            world.obstacles.len()
                        );
                    }
                },

                _ = sweep_interval.tick() => {
                    let evicted = coordinator.evict_idle(config.idle_timeout);
                    if !evicted.is_empty() {
                        info!("Evicted idle players: {:?}", evicted);
                    }
                },
            }
        }

        Ok(())
    }
}
