//! Per-connection protocol: `HANDSHAKE -> ACTIVE -> CLOSED`.
//!
//! The async half ([`run`]) owns the socket and forwards each decoded
//! message to the coordinator. The world-mutating half ([`process_init`],
//! [`process_update`]) runs inside the coordinator so one packet is
//! applied as one indivisible unit.

use crate::combat;
use crate::network::Command;
use crate::world::World;
use log::{debug, info, warn};
use shared::{
    recv_frame, send_frame, AbilityKind, ClientMessage, FrameError, ServerMessage, Snapshot,
    Update,
};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Chat prefix that spawns bots instead of being broadcast.
pub const BOT_COMMAND: &str = "/bot";
pub const MAX_BOTS_PER_COMMAND: usize = 10;

/// Protocol state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Active,
    Closed,
}

/// Per-connection timeouts
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub idle_timeout: Duration,
    pub write_timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChatAction<'a> {
    SpawnBots(usize),
    Say(&'a str),
    Nothing,
}

/// Classifies a chat line as a bot command, a message or noise.
pub fn parse_chat(text: &str) -> ChatAction<'_> {
    let text = text.trim();
    if text.is_empty() {
        return ChatAction::Nothing;
    }

    let mut words = text.split_whitespace();
    if words.next() == Some(BOT_COMMAND) {
        let count = words
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_BOTS_PER_COMMAND);
        return ChatAction::SpawnBots(count);
    }
    ChatAction::Say(text)
}

/// Applies the INIT handshake. Nickname and appearance are written once.
pub fn process_init(
    world: &mut World,
    id: u32,
    nickname: &str,
    appearance: &str,
    now: Instant,
) -> Option<Snapshot> {
    let player = world.player_mut(id)?;
    player.nickname = nickname.trim().to_string();
    player.appearance = appearance.to_string();
    Some(world.snapshot(0, now))
}

/// Applies one UPDATE packet from the owner of entity `id` and builds its
/// reply. Returns `None` if the entity no longer exists.
///
/// Processing order: merge position and projectiles, respawn a dead
/// sender, apply reported hits, try the ability cast, handle chat, then
/// snapshot everything past `update.chat_ack`. Position and projectiles
/// are only merged when the packet was built in the entity's current
/// life; otherwise the server's respawn placement stands.
pub fn process_update(
    world: &mut World,
    id: u32,
    update: Update,
    max_bots: usize,
    now: Instant,
) -> Option<Snapshot> {
    let (width, height) = (world.width, world.height);

    // 1. Merge the client's view; health and abilities stay server-owned.
    // A view from a previous life would undo the respawn, so it is dropped.
    {
        let player = world.player_mut(id)?;
        if update.entity.life == player.life {
            player.x = update.entity.x;
            player.y = update.entity.y;
            player.clamp_to_map(width, height);
            player.projectiles = update.entity.projectiles;
            player.prune_projectiles(width, height);
        } else {
            debug!(
                "Dropped stale view from {} (life {} != {})",
                id, update.entity.life, player.life
            );
        }
    }

    // 2. Respawn before anything else touches a dead entity.
    combat::respawn_if_dead(world, id);

    // 3. Client hits are requests; the authority decides.
    for hit in &update.hits {
        combat::apply_hit(world, id, hit.target_id, hit.damage);
    }

    let nickname = world.nickname(id)?;

    // 4. Abilities.
    if let Some(kind) = update
        .ability_cast
        .as_ref()
        .and_then(|cast| AbilityKind::from_key(&cast.key))
    {
        if world.cast_ability(id, kind, now) {
            let note = match kind {
                AbilityKind::Shield => format!("[ABILITY] {} raised a SHIELD!", nickname),
                AbilityKind::Wall => format!("[ABILITY] {} built a WALL!", nickname),
            };
            world.chat.push(note);
        }
    }

    // 5. Chat or bot command.
    if let Some(text) = update.chat.as_deref() {
        match parse_chat(text) {
            ChatAction::SpawnBots(count) => {
                let spawned = world.spawn_bots(count, max_bots);
                if spawned.is_empty() {
                    world.chat.push("[SERVER] Bot limit reached");
                } else {
                    info!("{} spawned {} bot(s)", nickname, spawned.len());
                    world
                        .chat
                        .push(format!("[SERVER] {} bot(s) joined the arena", spawned.len()));
                }
            }
            ChatAction::Say(line) => {
                world.chat.push(format!("{}: {}", nickname, line));
            }
            ChatAction::Nothing => {}
        }
    }

    // 6. Reply with everything the client has not acknowledged yet.
    Some(world.snapshot(update.chat_ack, now))
}

fn closed_loop() -> FrameError {
    FrameError::Connection(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "coordinator stopped",
    ))
}

/// Why a session ended without a transport error.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    ClientLeft,
    Evicted,
    Gone,
}

struct Session<R, W> {
    id: u32,
    peer: SocketAddr,
    state: SessionState,
    reader: R,
    writer: W,
    commands: mpsc::Sender<Command>,
    limits: SessionLimits,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn send(&mut self, message: &ServerMessage) -> Result<(), FrameError> {
        let limit = self.limits.write_timeout;
        timeout(limit, send_frame(&mut self.writer, message))
            .await
            .map_err(|_| FrameError::Timeout(limit))?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, FrameError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| closed_loop())?;
        rx.await.map_err(|_| closed_loop())
    }

    async fn drive(
        &mut self,
        welcome: ServerMessage,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Result<SessionEnd, FrameError> {
        self.send(&welcome).await?;

        loop {
            let idle = self.limits.idle_timeout;
            let message: ClientMessage = tokio::select! {
                _ = &mut *shutdown => return Ok(SessionEnd::Evicted),
                frame = timeout(idle, recv_frame::<_, ClientMessage>(&mut self.reader)) => {
                    frame.map_err(|_| FrameError::Timeout(idle))??
                }
            };
            message.validate()?;

            let id = self.id;
            let snapshot = match (self.state, message) {
                (
                    SessionState::Handshake,
                    ClientMessage::Init {
                        nickname,
                        appearance,
                        ..
                    },
                ) => {
                    debug!("Client {} is '{}'", id, nickname);
                    let snapshot = self
                        .request(|reply| Command::Init {
                            id,
                            nickname,
                            appearance,
                            reply,
                        })
                        .await?;
                    self.state = SessionState::Active;
                    snapshot
                }
                (SessionState::Active, ClientMessage::Update(update)) => {
                    self.request(|reply| Command::Update {
                        id,
                        update: Box::new(update),
                        reply,
                    })
                    .await?
                }
                (_, ClientMessage::Disconnect) => return Ok(SessionEnd::ClientLeft),
                (state, other) => {
                    return Err(FrameError::protocol(format!(
                        "unexpected {} while {:?}",
                        message_name(&other),
                        state
                    )))
                }
            };

            match snapshot {
                Some(snapshot) => self.send(&ServerMessage::Snapshot(snapshot)).await?,
                None => return Ok(SessionEnd::Gone),
            }
        }
    }
}

fn message_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::Init { .. } => "INIT",
        ClientMessage::Update(_) => "UPDATE",
        ClientMessage::Disconnect => "DISCONNECT",
    }
}

/// Serves one connection until it closes, then removes its entity.
///
/// The coordinator either admits the connection (the welcome frame carries
/// the new entity) or refuses it with a `Rejected` frame. Transport errors,
/// protocol violations, idle timeouts and eviction all end here with a
/// `Leave` command, so the entity never outlives its connection.
pub async fn run<S>(
    stream: S,
    peer: SocketAddr,
    commands: mpsc::Sender<Command>,
    limits: SessionLimits,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let (join_tx, join_rx) = oneshot::channel();

    let join = Command::Join {
        addr: peer,
        shutdown: shutdown_tx,
        reply: join_tx,
    };
    if commands.send(join).await.is_err() {
        return;
    }
    let player = match join_rx.await {
        Ok(Ok(player)) => player,
        Ok(Err(reason)) => {
            info!("Rejected {}: {}", peer, reason);
            let rejected = ServerMessage::Rejected { reason };
            let _ = timeout(limits.write_timeout, send_frame(&mut writer, &rejected)).await;
            let _ = writer.shutdown().await;
            return;
        }
        Err(_) => return,
    };

    let mut session = Session {
        id: player.id,
        peer,
        state: SessionState::Handshake,
        reader,
        writer,
        commands: commands.clone(),
        limits,
    };

    let reason = match session
        .drive(ServerMessage::Welcome(player), &mut shutdown_rx)
        .await
    {
        Ok(SessionEnd::ClientLeft) => "client disconnected".to_string(),
        Ok(SessionEnd::Evicted) => "evicted".to_string(),
        Ok(SessionEnd::Gone) => "entity no longer exists".to_string(),
        Err(e) if e.is_disconnect() => "peer closed".to_string(),
        Err(e) => {
            warn!("Session {} ({}) failed: {}", session.id, session.peer, e);
            e.to_string()
        }
    };
    session.state = SessionState::Closed;
    let _ = session.writer.shutdown().await;

    info!("Session {} ({}) closed: {}", session.id, session.peer, reason);
    let _ = commands
        .send(Command::Leave {
            id: session.id,
            reason,
        })
        .await;
}
