//! # Dot Client Library
//!
//! Headless client for the position broadcast server. It is used both by the
//! `client` binary, which runs a swarm of wandering bots, and by the workspace
//! integration tests, which drive a live server through it.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! One WebSocket session per [`network::Client`]:
//! - Waits for the `init` event and records the assigned id
//! - Sends typed `move` and `color` events, or raw text for malformed input
//! - Reads `updateAll` broadcasts with optional deadlines and predicates
//!
//! ### World Module (`world`)
//! Mirror of the latest broadcast. Every `updateAll` replaces the previous
//! view, so clients that disconnected or were evicted disappear from it.
//!
//! ### Bot Module (`bot`)
//! Wanderers that orbit the origin in either coordinate system and report
//! their position on a fixed interval.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::network::Client;
//! use shared::Position;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), client::error::ClientError> {
//! let mut client = Client::connect("ws://127.0.0.1:3000").await?;
//! client.send_move(Position::Polar { r: 10.0, theta: 0.5 }).await?;
//! let update = client.next_update(Duration::from_secs(1)).await?;
//! println!("{} clients connected", update.clients.len());
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod error;
pub mod network;
pub mod world;
