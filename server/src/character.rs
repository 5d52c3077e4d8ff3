//! Characters and their behaviour state machine.
//!
//! A character always sits in exactly one behaviour state. States are plain
//! data looked up by name in a factory table, and each one carries the
//! function that runs on every world tick. A tick returns a [`Transition`]
//! describing what the character and the room should hear and, optionally,
//! which state comes next; the world delivers the messages.

use log::warn;
use std::fmt;
use std::time::Duration;

use crate::mailbox::Outbox;
use crate::world::Coordinate;
use crate::SessionId;

pub const IDLE: &str = "idle";
pub const SMOKING: &str = "smoking";

/// How long one pipe lasts.
pub const PIPE_DURATION: Duration = Duration::from_secs(5);

type Behavior = fn(&mut State, &str, Duration) -> Transition;

/// Registered states, by name.
const STATES: &[(&str, fn() -> State)] = &[(IDLE, State::idle), (SMOKING, State::smoking)];

/// Looks up the factory for a named state.
pub fn factory(name: &str) -> Option<fn() -> State> {
    STATES
        .iter()
        .find(|(state, _)| *state == name)
        .map(|(_, factory)| *factory)
}

/// Outcome of running a state for one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Sent to the character itself over its broadcast channel
    pub to_self: Option<String>,
    /// Sent to everybody else in the room
    pub to_room: Option<String>,
    /// State to switch to after this tick
    pub next: Option<&'static str>,
}

#[derive(Clone, Copy)]
pub struct State {
    name: &'static str,
    time_left: Duration,
    behavior: Behavior,
}

impl State {
    pub fn idle() -> Self {
        Self {
            name: IDLE,
            time_left: Duration::ZERO,
            behavior: |_, _, _| Transition::default(),
        }
    }

    pub fn smoking() -> Self {
        Self {
            name: SMOKING,
            time_left: PIPE_DURATION,
            behavior: smoke_pipe,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn time_left(&self) -> Duration {
        self.time_left
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("time_left", &self.time_left)
            .finish()
    }
}

fn smoke_pipe(state: &mut State, name: &str, step: Duration) -> Transition {
    state.time_left = state.time_left.saturating_sub(step);

    if !state.time_left.is_zero() {
        Transition {
            to_self: Some("The pipe puffs".to_string()),
            to_room: Some(format!("{} puffs the pipe", name)),
            next: None,
        }
    } else {
        Transition {
            to_self: Some("You run out of tobacco and stopped smoking the pipe".to_string()),
            to_room: Some(format!("{} stopped smoking the pipe", name)),
            next: Some(IDLE),
        }
    }
}

/// A named entity in the world, controlled by one logged-in session.
#[derive(Debug)]
pub struct Character {
    /// Same value as the owning session's id
    pub id: SessionId,
    pub name: String,
    pub health: i32,
    pub attack: i32,
    pub coordinate: Coordinate,
    state: State,
    outbox: Outbox,
}

impl Character {
    pub fn new(id: SessionId, name: impl Into<String>, coordinate: Coordinate, outbox: Outbox) -> Self {
        Self {
            id,
            name: name.into(),
            health: 30,
            attack: 1,
            coordinate,
            state: State::idle(),
            outbox,
        }
    }

    /// Current behaviour state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Switches to the named state. Unknown names are logged and ignored.
    pub fn set_state(&mut self, name: &str) -> bool {
        match factory(name) {
            Some(create) => {
                self.state = create();
                true
            }
            None => {
                warn!("Unknown state '{}' requested for {}", name, self.name);
                false
            }
        }
    }

    /// Runs the current state for one tick of length `step`.
    pub fn tick(&mut self, step: Duration) -> Transition {
        let behavior = self.state.behavior;
        let transition = behavior(&mut self.state, &self.name, step);

        if let Some(next) = transition.next {
            self.set_state(next);
        }

        transition
    }

    /// Pushes an unsolicited message to this character's connection.
    pub fn broadcast(&self, message: impl Into<String>) {
        self.outbox.broadcast(message);
    }
}
