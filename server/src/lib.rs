//! # Position Broadcast Server Library
//!
//! This library implements a real-time multiplayer position-broadcast server.
//! Clients connect over WebSocket, report a position and a display color, and
//! the server periodically pushes the full set of client states back to
//! everyone.
//!
//! ## Core Responsibilities
//!
//! ### Session Registry
//! Keeps the last reported state of every connected client:
//! - Insert with default position and color on connect
//! - Field-level overwrite on `move` and `color` events
//! - Removal on disconnect or after a period of inactivity
//!
//! ### State Broadcasting
//! A single global task snapshots the registry at a fixed cadence (20Hz by
//! default) and sends `updateAll` to every open connection. A second,
//! independent task sweeps the registry once per second and evicts entries
//! that have been silent for longer than the staleness threshold.
//!
//! The server trusts reported coordinates verbatim. There is no simulation,
//! interpolation or validation beyond checking that a payload has the
//! expected shape.
//!
//! ## Architecture Design
//!
//! ### Event Funnel
//! Every socket task turns its traffic into an `InboundEvent` (`Connect`,
//! `Move`, `Color`, `Disconnect`) and pushes it onto one queue. The server
//! loop drains that queue through the `Dispatcher`, so registry mutation is
//! independent of the transport and testable without a live socket.
//!
//! ### Shared State
//! The registry is the only shared mutable structure. It guards its table
//! with an internal lock and exposes operations, never the map itself.
//! No network I/O happens while the lock is held: broadcasts encode an owned
//! snapshot and push it into bounded per-connection queues without waiting.
//!
//! ## Module Organization
//!
//! - `registry`: session table, staleness rule, color policy
//! - `connections`: outbound queues and per-recipient failure isolation
//! - `dispatch`: inbound event enum and the single dispatch point
//! - `scheduler`: broadcast and sweep tasks
//! - `network`: WebSocket accept loop and per-connection pumps
//! - `config`: command line options
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 3000,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     println!("Listening on ws://{}", server.local_addr()?);
//!
//!     // Runs the dispatch loop, the 20Hz broadcaster and the 1s sweeper
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connections;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod utils;
