//! Spatial world model: coordinates, directions, rooms and who stands where.
//!
//! The world owns every room and every character. Characters are indexed
//! twice: by id, and by the coordinate they stand on. The two views are kept
//! consistent by funnelling every change through [`World::insert`],
//! [`World::remove`] and [`World::move_character`]. Empty occupant lists are
//! dropped from the coordinate index.

use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use crate::character::Character;
use crate::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring coordinate one step in `direction`, or `None` past
    /// the edge of the `i32` grid.
    pub fn step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A compass direction. The discriminants are bit flags so that a set of
/// exits fits in one [`Exits`] mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    None = 0x0,
    North = 0x1,
    East = 0x2,
    South = 0x4,
    West = 0x8,
}

impl Direction {
    /// Canonical order used whenever exits are listed.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Parses a direction name; anything unrecognised is [`Direction::None`].
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "north" => Direction::North,
            "east" => Direction::East,
            "south" => Direction::South,
            "west" => Direction::West,
            _ => Direction::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::None => "nowhere",
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }

    /// The direction you came from after moving this way.
    pub fn opposite(self) -> Self {
        match self {
            Direction::None => Direction::None,
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Grid displacement; north is towards smaller y.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of directions a room can be left through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Exits(u8);

impl Exits {
    pub const NONE: Exits = Exits(0);

    pub fn contains(self, direction: Direction) -> bool {
        direction != Direction::None && self.0 & direction.bit() != 0
    }

    /// Exit names in canonical order: north, east, south, west.
    pub fn names(self) -> Vec<&'static str> {
        Direction::ALL
            .iter()
            .filter(|d| self.contains(**d))
            .map(|d| d.name())
            .collect()
    }
}

impl From<Direction> for Exits {
    fn from(direction: Direction) -> Self {
        Exits(direction.bit())
    }
}

impl BitOr<Direction> for Exits {
    type Output = Exits;

    fn bitor(self, rhs: Direction) -> Exits {
        Exits(self.0 | rhs.bit())
    }
}

impl BitOr for Direction {
    type Output = Exits;

    fn bitor(self, rhs: Direction) -> Exits {
        Exits::from(self) | rhs
    }
}

impl FromIterator<Direction> for Exits {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter().fold(Exits::NONE, |exits, d| exits | d)
    }
}

/// A static location. Rooms never change once the world is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub description: String,
    pub coordinate: Coordinate,
    pub exits: Exits,
}

impl Room {
    pub fn new(description: impl Into<String>, coordinate: Coordinate, exits: impl Into<Exits>) -> Self {
        Self {
            description: description.into(),
            coordinate,
            exits: exits.into(),
        }
    }

    /// True if the room lists an exit that way.
    pub fn has_exit(&self, direction: Direction) -> bool {
        self.exits.contains(direction)
    }
}

/// Two rooms joined by an east/west passage.
pub fn basic_map() -> Vec<Room> {
    vec![
        Room::new("This is the room", Coordinate::new(0, 0), Direction::East),
        Room::new("This is another room", Coordinate::new(1, 0), Direction::West),
    ]
}

/// Every room and character, plus the coordinate index of occupants.
///
/// Invariant: each character id appears in exactly one occupant list, the
/// one for its own coordinate, and no occupant list is empty.
pub struct World {
    rooms: HashMap<Coordinate, Room>,
    characters: HashMap<SessionId, Character>,
    occupants: HashMap<Coordinate, Vec<SessionId>>,
    spawn: Coordinate,
}

impl World {
    /// Builds a world from its rooms. Characters spawn at the origin if there
    /// is a room there, otherwise in the first room given.
    pub fn new(rooms: Vec<Room>) -> Self {
        let origin = Coordinate::default();
        let spawn = if rooms.iter().any(|r| r.coordinate == origin) {
            origin
        } else {
            rooms.first().map(|r| r.coordinate).unwrap_or(origin)
        };

        let rooms: HashMap<Coordinate, Room> =
            rooms.into_iter().map(|r| (r.coordinate, r)).collect();
        info!("World created with {} rooms, spawn at {}", rooms.len(), spawn);

        Self {
            rooms,
            characters: HashMap::new(),
            occupants: HashMap::new(),
            spawn,
        }
    }

    /// Where new characters appear.
    pub fn spawn(&self) -> Coordinate {
        self.spawn
    }

    /// The room at `coordinate`, if the map has one there.
    pub fn room(&self, coordinate: Coordinate) -> Option<&Room> {
        self.rooms.get(&coordinate)
    }

    /// The character controlled by session `id`.
    pub fn character(&self, id: SessionId) -> Option<&Character> {
        self.characters.get(&id)
    }

    /// Mutable access to a character.
    ///
    /// Do not change `coordinate` through this; use
    /// [`World::move_character`] so the occupant index stays in sync.
    pub fn character_mut(&mut self, id: SessionId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// All characters, in no particular order.
    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Number of characters in the world.
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Ids standing on `coordinate`, in arrival order.
    pub fn occupants(&self, coordinate: Coordinate) -> &[SessionId] {
        self.occupants
            .get(&coordinate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of coordinates with at least one occupant.
    pub fn occupied_coordinates(&self) -> usize {
        self.occupants.len()
    }

    /// Places a character at its own coordinate. Re-inserting an id that is
    /// already present replaces the old entry.
    pub fn insert(&mut self, character: Character) {
        let id = character.id;
        self.remove(id);

        self.occupants
            .entry(character.coordinate)
            .or_default()
            .push(id);
        self.characters.insert(id, character);
    }

    /// Takes a character out of the world.
    pub fn remove(&mut self, id: SessionId) -> Option<Character> {
        let character = self.characters.remove(&id)?;
        self.unindex(id, character.coordinate);
        Some(character)
    }

    fn unindex(&mut self, id: SessionId, coordinate: Coordinate) {
        if let Some(list) = self.occupants.get_mut(&coordinate) {
            list.retain(|other| *other != id);
            if list.is_empty() {
                self.occupants.remove(&coordinate);
            }
        }
    }

    /// True if the character's room has an exit that way and there is a room
    /// on the other side.
    pub fn can_move(&self, id: SessionId, direction: Direction) -> bool {
        let Some(character) = self.characters.get(&id) else {
            return false;
        };

        let has_exit = self
            .rooms
            .get(&character.coordinate)
            .map_or(false, |room| room.has_exit(direction));

        has_exit
            && character
                .coordinate
                .step(direction)
                .map_or(false, |next| self.rooms.contains_key(&next))
    }

    /// Moves a character one room over. Returns the new coordinate, or `None`
    /// (leaving everything untouched) when [`World::can_move`] says no.
    pub fn move_character(&mut self, id: SessionId, direction: Direction) -> Option<Coordinate> {
        if !self.can_move(id, direction) {
            return None;
        }

        let character = self.characters.get_mut(&id)?;
        let old = character.coordinate;
        let new = old.step(direction)?;
        character.coordinate = new;

        self.unindex(id, old);
        self.occupants.entry(new).or_default().push(id);

        Some(new)
    }

    /// Everybody else standing where `id` stands.
    pub fn occupants_except(&self, id: SessionId) -> Vec<&Character> {
        let Some(character) = self.characters.get(&id) else {
            return Vec::new();
        };

        self.occupants(character.coordinate)
            .iter()
            .filter(|other| **other != id)
            .filter_map(|other| self.characters.get(other))
            .collect()
    }

    /// Sends `message` to everybody sharing the room with `id`, but not to
    /// `id` itself.
    pub fn broadcast_to_room(&self, id: SessionId, message: &str) {
        for other in self.occupants_except(id) {
            other.broadcast(message);
        }
    }

    /// Room description followed by its exits in canonical order.
    pub fn describe(&self, coordinate: Coordinate) -> String {
        match self.rooms.get(&coordinate) {
            Some(room) => {
                let exits = room.exits.names();
                let exits = if exits.is_empty() {
                    "none".to_string()
                } else {
                    exits.join(", ")
                };
                format!("{}\nExits: {}", room.description, exits)
            }
            None => format!("Nothing but void at {}", coordinate),
        }
    }

    /// Runs every character's behaviour state for one tick, in id order,
    /// and delivers the resulting messages.
    pub fn tick_characters(&mut self, step: Duration) {
        let mut ids: Vec<SessionId> = self.characters.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            let Some(character) = self.characters.get_mut(&id) else {
                continue;
            };
            let transition = character.tick(step);

            if let Some(message) = transition.to_self {
                character.broadcast(message);
            }
            if let Some(message) = transition.to_room {
                self.broadcast_to_room(id, &message);
            }
        }
    }
}
