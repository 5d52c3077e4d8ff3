//! Loading room layouts from JSON map files.
//!
//! A map file is a list of rooms:
//!
//! ```json
//! [{ "x": 0, "y": 0, "description": "The village square", "exits": ["east"] }]
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::world::{Coordinate, Direction, Exits, Room};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot read map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("two rooms at {0}")]
    DuplicateRoom(Coordinate),
    #[error("map has no rooms")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RoomEntry {
    x: i32,
    y: i32,
    description: String,
    #[serde(default)]
    exits: Vec<Direction>,
}

/// Parses a JSON map. Every coordinate may hold at most one room, and a
/// map needs at least one room to spawn in.
pub fn parse_map(json: &str) -> Result<Vec<Room>, MapError> {
    let entries: Vec<RoomEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(MapError::Empty);
    }

    let mut seen = HashSet::new();
    let mut rooms = Vec::with_capacity(entries.len());
    for entry in entries {
        let coordinate = Coordinate::new(entry.x, entry.y);
        if !seen.insert(coordinate) {
            return Err(MapError::DuplicateRoom(coordinate));
        }
        let exits: Exits = entry.exits.into_iter().collect();
        rooms.push(Room::new(entry.description, coordinate, exits));
    }

    Ok(rooms)
}

/// Reads and parses a map file.
pub fn load_map(path: impl AsRef<Path>) -> Result<Vec<Room>, MapError> {
    let json = std::fs::read_to_string(path)?;
    parse_map(&json)
}
