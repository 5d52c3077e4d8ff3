//! # MUD Server Library
//!
//! This library provides the server side of a small text multi-user dungeon.
//! Players connect over TCP, pick a name, and walk a grid of rooms where they
//! can talk to each other and smoke a pipe.
//!
//! ## Core Responsibilities
//!
//! ### Tick-Scheduled World
//! All world state lives in a single world loop (`scheduler`). Commands from
//! every connection are queued as actions and applied in arrival order once
//! per tick, followed by one step of each character's state machine. Nothing
//! else ever touches the world, so there is no locking around rooms or
//! characters.
//!
//! ### Session Handling
//! Each connection gets its own task (`session`) that reads lines, parses them
//! against the command registry for its phase (login or in-world) and waits
//! for exactly one reply per action. Messages caused by other players arrive
//! on a separate broadcast mailbox and are written as they come.
//!
//! ## Module Organization
//!
//! ### World Module (`world`)
//! Rooms on an integer grid, exits as a direction bitmask, and the index of
//! which characters stand where.
//!
//! ### Character Module (`character`)
//! Per-character stats and a small table-driven state machine (idle, smoking).
//!
//! ### Commands and Actions (`commands`, `actions`)
//! Verb parsing and the world mutations each verb turns into. Every action
//! yields exactly one reply for its own session.
//!
//! ### Accounts Module (`accounts`)
//! Connected sessions, their reply mailboxes and the player limit.
//!
//! ### Network Module (`network`)
//! TCP accept loop assigning session ids and spawning session tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         tick: Duration::from_millis(500),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Runs until the world loop stops
//!     Server::bind(config).await?.run().await
//! }
//! ```

pub mod accounts;
pub mod actions;
pub mod character;
pub mod commands;
pub mod config;
pub mod mailbox;
pub mod map;
pub mod network;
pub mod scheduler;
pub mod session;
pub mod world;

/// Identifies one connection for its whole lifetime.
pub type SessionId = u32;
