use crate::game::ClientGame;
use crate::input::ScriptedInput;
use log::{debug, info, warn};
use shared::{
    recv_frame, send_frame, ClientMessage, FrameError, Player, ServerMessage, Snapshot, Update,
    PROTOCOL_VERSION,
};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Errors surfaced to whoever drives the client
///
/// Nothing here is retried; the caller decides whether to reconnect.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no session: {0}")]
    NoSession(String),
    #[error("server rejected the connection: {0}")]
    Rejected(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// One TCP session with the server, request/response style.
pub struct Connection {
    stream: TcpStream,
    io_timeout: Duration,
}

impl Connection {
    /// Connects and waits for the welcome frame carrying the entity the
    /// server created for us. No retries.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        io_timeout: Duration,
    ) -> Result<(Self, Player), ClientError> {
        let stream = match timeout(io_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::NoSession(e.to_string())),
            Err(_) => {
                return Err(ClientError::NoSession(format!(
                    "timed out after {:?}",
                    io_timeout
                )))
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        let mut connection = Connection { stream, io_timeout };
        match connection.recv().await? {
            ServerMessage::Welcome(player) => {
                info!("Connected! Entity ID: {}", player.id);
                Ok((connection, player))
            }
            ServerMessage::Rejected { reason } => Err(ClientError::Rejected(reason)),
            ServerMessage::Snapshot(_) => {
                Err(FrameError::protocol("snapshot before welcome").into())
            }
        }
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        timeout(self.io_timeout, send_frame(&mut self.stream, message))
            .await
            .map_err(|_| FrameError::Timeout(self.io_timeout))??;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        let message: ServerMessage = timeout(self.io_timeout, recv_frame(&mut self.stream))
            .await
            .map_err(|_| FrameError::Timeout(self.io_timeout))??;
        Ok(message)
    }

    async fn expect_snapshot(&mut self) -> Result<Snapshot, ClientError> {
        match self.recv().await? {
            ServerMessage::Snapshot(snapshot) => Ok(snapshot),
            ServerMessage::Rejected { reason } => Err(ClientError::Rejected(reason)),
            ServerMessage::Welcome(_) => Err(FrameError::protocol("unexpected welcome").into()),
        }
    }

    /// Completes the handshake. The reply is a full snapshot.
    pub async fn init(
        &mut self,
        nickname: &str,
        appearance: &str,
    ) -> Result<Snapshot, ClientError> {
        let init = ClientMessage::Init {
            version: PROTOCOL_VERSION,
            nickname: nickname.to_string(),
            appearance: appearance.to_string(),
        };
        self.send(&init).await?;
        self.expect_snapshot().await
    }

    /// Sends one UPDATE and waits for the snapshot answering it.
    pub async fn update(&mut self, update: Update) -> Result<Snapshot, ClientError> {
        self.send(&ClientMessage::Update(update)).await?;
        self.expect_snapshot().await
    }

    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::Disconnect).await
    }
}

/// Headless player: scripted input, local prediction, one update per frame.
pub struct Client {
    connection: Connection,
    game: ClientGame,
    input: ScriptedInput,
}

impl Client {
    /// Connects, completes the handshake and applies the first snapshot
    ///
    /// The scripted input is seeded from the entity id so two clients on
    /// the same machine do not move in lockstep.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        nickname: &str,
        appearance: &str,
        io_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let (mut connection, me) = Connection::connect(addr, io_timeout).await?;
        let seed = u64::from(me.id);
        let mut game = ClientGame::new(me);

        let snapshot = connection.init(nickname, appearance).await?;
        for line in game.apply_snapshot(snapshot) {
            info!("[chat] {}", line.text);
        }

        Ok(Client {
            connection,
            game,
            input: ScriptedInput::new(seed),
        })
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    pub fn with_input(mut self, input: ScriptedInput) -> Self {
        self.input = input;
        self
    }

    /// Runs one frame: input, prediction, local hits, then the round trip.
    pub async fn frame(&mut self) -> Result<(), ClientError> {
        let input = self.input.next_frame(&self.game.me, &self.game.others);
        self.game.apply_input(&input);
        let hits = self.game.step();
        if hits > 0 {
            debug!("Reporting {} hit(s)", hits);
        }

        let update = self.game.build_update();
        let snapshot = self.connection.update(update).await?;
        for line in self.game.apply_snapshot(snapshot) {
            info!("[chat] {}", line.text);
        }
        Ok(())
    }

    /// Plays `cycles` frames at one frame per `period`, then leaves.
    pub async fn run(mut self, cycles: u64, period: Duration) -> Result<ClientGame, ClientError> {
        let mut frame_interval = interval(period);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for _ in 0..cycles {
            frame_interval.tick().await;
            self.frame().await?;
        }

        let game = self.game;
        if let Err(e) = self.connection.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        Ok(game)
    }
}
