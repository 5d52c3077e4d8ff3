//! Deferred world mutations and the table that applies them.
//!
//! Sessions never touch the world. They build an [`Action`] (what should
//! happen, and on whose behalf) and hand it to the scheduler, which applies
//! it during the next tick via [`Action::execute`]. Every successful
//! execution yields exactly one [`Reply`] for the submitting session.

use log::info;
use thiserror::Error;

use crate::accounts::AccountManager;
use crate::character::{Character, IDLE, SMOKING};
use crate::commands::{Command, CommandRegistry};
use crate::mailbox::{Outbox, Reply};
use crate::world::{Direction, World};
use crate::SessionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("session {id} has no character (action: {action})")]
    UnknownCharacter { id: SessionId, action: &'static str },
}

#[derive(Debug)]
pub enum ActionKind {
    /// A connection was accepted; carries the session's delivery handles
    Joined(Outbox),
    /// The connection went away
    Disconnecting,
    Name(String),
    Help,
    Say(String),
    Go(String),
    Look,
    Smoke(String),
    Unknown(String),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Joined(_) => "joined",
            ActionKind::Disconnecting => "disconnecting",
            ActionKind::Name(_) => "name",
            ActionKind::Help => "help",
            ActionKind::Say(_) => "say",
            ActionKind::Go(_) => "go",
            ActionKind::Look => "look",
            ActionKind::Smoke(_) => "smoke",
            ActionKind::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug)]
pub struct Action {
    pub session: SessionId,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(session: SessionId, kind: ActionKind) -> Self {
        Self { session, kind }
    }

    pub fn joined(session: SessionId, outbox: Outbox) -> Self {
        Self::new(session, ActionKind::Joined(outbox))
    }

    pub fn disconnecting(session: SessionId) -> Self {
        Self::new(session, ActionKind::Disconnecting)
    }

    /// Applies the action. Must only be called by the scheduler.
    pub fn execute(self, world: &mut World, accounts: &mut AccountManager) -> Result<Reply, ActionError> {
        let id = self.session;

        match self.kind {
            ActionKind::Joined(outbox) => Ok(join(accounts, id, outbox)),
            ActionKind::Disconnecting => disconnect(world, accounts, id),
            ActionKind::Name(name) => name_character(world, accounts, id, name),
            ActionKind::Help => show_help(accounts, id),
            ActionKind::Say(text) => say_in_room(world, id, &text),
            ActionKind::Go(direction) => go_in_direction(world, id, &direction),
            ActionKind::Look => look_around(world, id),
            ActionKind::Smoke(what) => smoke_pipe(world, id, &what),
            ActionKind::Unknown(line) => unknown_command(accounts, id, &line),
        }
    }
}

// Constructors referenced by the command registries.

pub fn name(command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Name(command.content))
}

pub fn help(_command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Help)
}

pub fn say(command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Say(command.content))
}

pub fn go(command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Go(command.content))
}

pub fn look(_command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Look)
}

pub fn smoke(command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Smoke(command.content))
}

pub fn unknown(command: Command, session: SessionId) -> Action {
    Action::new(session, ActionKind::Unknown(command.content))
}

fn character<'a>(world: &'a World, id: SessionId, action: &'static str) -> Result<&'a Character, ActionError> {
    world
        .character(id)
        .ok_or(ActionError::UnknownCharacter { id, action })
}

fn join(accounts: &mut AccountManager, id: SessionId, outbox: Outbox) -> Reply {
    if accounts.add_account(id, outbox) {
        Reply::text("Welcome! What is your name? (name <your name>)")
    } else {
        info!("Rejecting session {}: server full", id);
        Reply::Closed("Server full".to_string())
    }
}

fn disconnect(world: &mut World, accounts: &mut AccountManager, id: SessionId) -> Result<Reply, ActionError> {
    let account = accounts
        .remove_account(id)
        .ok_or(ActionError::UnknownSession(id))?;

    if account.in_world() {
        if let Some(ch) = world.character(id) {
            world.broadcast_to_room(id, &format!("{} disconnecting...", ch.name));
        }
        world.remove(id);
    }

    Ok(Reply::text("Goodbye!"))
}

fn name_character(
    world: &mut World,
    accounts: &mut AccountManager,
    id: SessionId,
    name: String,
) -> Result<Reply, ActionError> {
    let account = accounts.get_mut(id).ok_or(ActionError::UnknownSession(id))?;

    if let Some(current) = &account.character {
        return Ok(Reply::text(format!("You are already known as {}", current)));
    }

    let name = name.trim().to_string();
    if name.is_empty() {
        return Ok(Reply::text("What is your name?"));
    }
    if world.characters().any(|ch| ch.name.eq_ignore_ascii_case(&name)) {
        return Ok(Reply::text(format!("The name {} is already taken", name)));
    }

    let spawn = world.spawn();
    world.insert(Character::new(id, name.clone(), spawn, account.outbox.clone()));
    account.character = Some(name.clone());
    info!("Session {} entered the world as {}", id, name);

    world.broadcast_to_room(id, &format!("{} joined!", name));

    Ok(Reply::EnteredWorld(format!(
        "{} woke up in the world\n{}",
        name,
        world.describe(spawn)
    )))
}

fn show_help(accounts: &AccountManager, id: SessionId) -> Result<Reply, ActionError> {
    let account = accounts.get(id).ok_or(ActionError::UnknownSession(id))?;

    let registry = if account.in_world() {
        CommandRegistry::in_world()
    } else {
        CommandRegistry::login()
    };
    Ok(Reply::Text(registry.help()))
}

fn say_in_room(world: &World, id: SessionId, text: &str) -> Result<Reply, ActionError> {
    let ch = character(world, id, "say")?;

    if text.is_empty() {
        return Ok(Reply::text("Say what?"));
    }

    world.broadcast_to_room(id, &format!("{} said {}", ch.name, text));
    Ok(Reply::text(format!("You said {}", text)))
}

fn look_around(world: &World, id: SessionId) -> Result<Reply, ActionError> {
    let ch = character(world, id, "look")?;

    let mut output = format!("You look around\n{}", world.describe(ch.coordinate));

    let mut others: Vec<&str> = world
        .occupants_except(id)
        .iter()
        .map(|other| other.name.as_str())
        .collect();
    if !others.is_empty() {
        others.sort_unstable();
        output.push_str(&format!("\nAlso here: {}", others.join(", ")));
    }

    Ok(Reply::Text(output))
}

fn go_in_direction(world: &mut World, id: SessionId, input: &str) -> Result<Reply, ActionError> {
    let name = character(world, id, "go")?.name.clone();

    if input.is_empty() {
        return Ok(Reply::text("In which direction do you want to move?"));
    }

    let direction = Direction::parse(input);
    if !world.can_move(id, direction) {
        return Ok(Reply::text("You cannot go that way!"));
    }

    world.broadcast_to_room(id, &format!("{} moved to {}", name, direction));

    let Some(destination) = world.move_character(id, direction) else {
        return Ok(Reply::text("You cannot go that way!"));
    };

    world.broadcast_to_room(
        id,
        &format!("{} entered from the {}", name, direction.opposite()),
    );

    Ok(Reply::Text(format!(
        "You move to {}\n{}",
        direction,
        world.describe(destination)
    )))
}

fn smoke_pipe(world: &mut World, id: SessionId, what: &str) -> Result<Reply, ActionError> {
    let ch = world
        .character_mut(id)
        .ok_or(ActionError::UnknownCharacter { id, action: "smoke" })?;
    let name = ch.name.clone();

    let (reply, room) = match what {
        "start" => {
            ch.set_state(SMOKING);
            ("You started to smoke your pipe", format!("{} started to smoke a pipe", name))
        }
        "stop" => {
            ch.set_state(IDLE);
            ("You stopped smoking your pipe", format!("{} stopped smoking a pipe", name))
        }
        _ => return Ok(Reply::text("You either start or stop")),
    };

    world.broadcast_to_room(id, &room);
    Ok(Reply::text(reply))
}

fn unknown_command(accounts: &AccountManager, id: SessionId, line: &str) -> Result<Reply, ActionError> {
    if accounts.get(id).is_none() {
        return Err(ActionError::UnknownSession(id));
    }

    if line.is_empty() {
        Ok(Reply::text("What?"))
    } else {
        Ok(Reply::text(format!("What is {}?", line)))
    }
}
