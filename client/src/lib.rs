//! # MUD Client Library
//!
//! A plain terminal client for the MUD server. It has no game logic of its
//! own: every line typed is sent to the server as a command, and every line
//! the server sends is printed as it arrives. Replies to your own commands
//! and messages about other players share the same connection, so they simply
//! interleave on screen.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Client::connect("127.0.0.1:6000").await?;
//!
//!     // Reads stdin and prints server output until the server hangs up
//!     client.run().await
//! }
//! ```

pub mod network;
