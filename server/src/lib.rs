//! # Arena Server Library
//!
//! Authoritative server for a top-down arena shooter. Clients simulate their
//! own movement and shots, then report them; the server merges those
//! reports into one world, decides what damage actually lands, drives the
//! bots and answers every packet with a snapshot of the whole arena.
//!
//! ## Core Responsibilities
//!
//! ### Damage Authority
//! Clients only *request* hits. Health is lowered in exactly one place
//! ([`combat::apply_hit`]), which honours shields, clamps damage, announces
//! kills in chat and respawns the victim on the spot.
//!
//! ### World Ownership
//! Every entity, obstacle and chat line lives in one [`world::World`].
//! A single coordinator task owns it. Session tasks send it commands over a
//! channel and wait for the reply, so a packet is applied as one
//! indivisible unit and ticks never interleave with a half-merged update.
//!
//! ### Session Lifecycle
//! Each TCP connection walks `HANDSHAKE -> ACTIVE -> CLOSED`:
//! - the server assigns an entity and sends it (`Welcome`)
//! - the client introduces itself (`Init`) and gets a full snapshot
//! - every `Update` gets exactly one `Snapshot` back
//! - on close or idle timeout the entity disappears
//!
//! ## Module Organization
//!
//! - `world`: entity registry, obstacles, bounded chat log, snapshots
//! - `combat`: hit resolution and respawn
//! - `bot`: per-tick AI for server-driven opponents
//! - `simulation`: one fixed-interval pass over the world
//! - `session`: per-connection protocol and update processing
//! - `client_manager`: connection registry, capacity and timeouts
//! - `network`: accept loop, coordinator and the main select loop
//! - `discovery`: UDP responder for LAN server browsers
//! - `config`: runtime settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind on the default ports at 30Hz
//!     let server = Server::new(ServerConfig::default().with_tick_rate(30)).await?;
//!
//!     // Runs until every command sender is gone:
//!     // - accepts TCP sessions and LAN discovery queries
//!     // - applies client updates in arrival order
//!     // - ticks abilities, bots, projectiles and walls
//!     // - evicts sessions that went silent
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Trust Boundaries
//!
//! Every decoded message is validated before it reaches the world: text
//! lengths, finite coordinates and bounded list sizes. Health, abilities,
//! ids and nicknames in a client's entity are ignored after the handshake.
//! A malformed frame closes only the connection that sent it.

pub mod bot;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod discovery;
pub mod network;
pub mod session;
pub mod simulation;
pub mod world;
