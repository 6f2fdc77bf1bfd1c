//! # Arena Client Library
//!
//! Headless client for the arena server. It plays the part a graphical
//! client would: it predicts its own avatar, simulates its own shots and
//! reports what it believes it hit, then accepts whatever the server says.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Movement and shooting are applied to the local copy of the own entity
//! immediately. Projectiles are advanced locally and tested against the
//! last-known copies of other entities and obstacles; a projectile that
//! touches an entity is consumed and turned into a hit request.
//!
//! ### Coarse Reconciliation
//! Every reply snapshot overwrites the own position, health and ability
//! timers. There is no input replay and no blending: the server's values
//! simply win each cycle.
//!
//! ### Request/Response Cadence
//! The client sends one `Update` per frame and waits for exactly one
//! `Snapshot`. Chat delivery is acknowledged by sequence number, so each
//! line is received once.
//!
//! ## Module Organization
//!
//! - `game`: local world view, prediction, hit detection, reconciliation
//! - `input`: scripted stand-in for keyboard and mouse
//! - `network`: TCP session (`Connection`) and the frame loop (`Client`)
//! - `discovery`: LAN server browser over UDP broadcast
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let timeout = Duration::from_secs(5);
//!     let client = Client::connect("127.0.0.1:5555", "Neo", "CYAN", timeout).await?;
//!
//!     // 300 frames at ~30Hz, then a clean DISCONNECT
//!     let game = client.run(300, Duration::from_millis(33)).await?;
//!     println!("Finished with {} hp", game.me.health);
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod game;
pub mod input;
pub mod network;
