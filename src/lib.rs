//! # worldcore - concurrency core of a multiplayer text world
//!
//! worldcore keeps a persistent world of zones, rooms and characters and serves it to many
//! simultaneous line-oriented TCP sessions.
//!
//! ## Features
//!
//! - **Lock-guarded entities**: every entity carries its own `RwLock` and a dirty flag, so a
//!   commit writes only what changed.
//! - **Shared instances**: the store is an identity map, one `Arc` per live entity, backed by
//!   sled with bincode records and transactional secondary indexes.
//! - **Prompt rendezvous**: each session reads through a single-slot request queue, so exactly
//!   one prompt is on screen while a command, dialog or menu runs.
//! - **World events**: arrivals, departures, speech and ambient ticks reach sessions without ever
//!   blocking the writer.
//! - **Menus**: paginated, filterable keyed-action dialogs for in-game editing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use worldcore::config::Config;
//! use worldcore::server::WorldServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let server = WorldServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`world`] - entities, typed extra fields and the sled-backed store
//! - [`session`] - connection I/O, the event loop, dispatch and menus
//! - [`server`] - TCP accept loop and status reporting
//! - [`config`] - configuration management
//! - [`metrics`] - process-wide session counters
//! - [`logutil`] - log-safe rendering of player input

pub mod config;
pub mod logutil;
pub mod metrics;
pub mod server;
pub mod session;
pub mod world;
