//! Server settings, filled in from the command line by the binary.

use std::time::Duration;

use crate::world::{basic_map, Room};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Length of one world tick
    pub tick: Duration,
    pub max_clients: usize,
    /// Largest batch applied in one tick; the same number may wait in the
    /// inbox behind it before sessions have to wait
    pub inbox_capacity: usize,
    pub rooms: Vec<Room>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: shared::DEFAULT_HOST.to_string(),
            port: shared::DEFAULT_PORT,
            tick: Duration::from_secs(1),
            max_clients: 64,
            inbox_capacity: 1024,
            rooms: basic_map(),
        }
    }
}
