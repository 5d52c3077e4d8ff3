//! Verb tables that turn input lines into actions.
//!
//! A session looks every line up in exactly one registry: the login registry
//! until the player has picked a name, the in-world registry afterwards. The
//! registries are static tables, so switching phase is just swapping which
//! table the session points at.

use crate::actions::{self, Action};
use crate::SessionId;

pub const UNKNOWN: &str = "unknown";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: &'static str,
    pub content: String,
}

impl Command {
    pub fn new(verb: &'static str, content: impl Into<String>) -> Self {
        Self {
            verb,
            content: content.into(),
        }
    }
}

/// One registry entry.
pub struct CommandInfo {
    pub verb: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    /// Builds the command from the verb as typed and the rest of the line
    pub parser: fn(&str, &str) -> Command,
    pub action: fn(Command, SessionId) -> Action,
}

impl CommandInfo {
    fn matches(&self, verb: &str) -> bool {
        self.verb == verb || self.aliases.iter().any(|alias| *alias == verb)
    }
}

static LOGIN_COMMANDS: [CommandInfo; 2] = [
    CommandInfo {
        verb: "help",
        aliases: &[],
        description: "List all the commands",
        parser: |_, _| Command::new("help", ""),
        action: actions::help,
    },
    CommandInfo {
        verb: "name",
        aliases: &["choose"],
        description: "Choose a character name",
        parser: |_, rest| Command::new("name", rest),
        action: actions::name,
    },
];

static IN_WORLD_COMMANDS: [CommandInfo; 5] = [
    CommandInfo {
        verb: "help",
        aliases: &[],
        description: "List all the commands",
        parser: |_, _| Command::new("help", ""),
        action: actions::help,
    },
    CommandInfo {
        verb: "say",
        aliases: &[],
        description: "Say something to everybody in the room",
        parser: |_, rest| Command::new("say", rest),
        action: actions::say,
    },
    CommandInfo {
        verb: "go",
        aliases: &["n", "e", "s", "w"],
        description: "Move to north, east, south or west",
        parser: parse_go,
        action: actions::go,
    },
    CommandInfo {
        verb: "look",
        aliases: &["l"],
        description: "Look around the room",
        parser: |_, rest| Command::new("look", rest),
        action: actions::look,
    },
    CommandInfo {
        verb: "smoke",
        aliases: &[],
        description: "You can _start_ or _stop_ smoking",
        parser: |_, rest| Command::new("smoke", rest.to_ascii_lowercase()),
        action: actions::smoke,
    },
];

fn parse_go(verb: &str, rest: &str) -> Command {
    let direction = match verb {
        "n" => "north",
        "e" => "east",
        "s" => "south",
        "w" => "west",
        _ => rest,
    };
    Command::new("go", direction.to_ascii_lowercase())
}

#[derive(Clone, Copy)]
pub struct CommandRegistry {
    commands: &'static [CommandInfo],
}

impl CommandRegistry {
    pub fn login() -> Self {
        Self {
            commands: &LOGIN_COMMANDS,
        }
    }

    pub fn in_world() -> Self {
        Self {
            commands: &IN_WORLD_COMMANDS,
        }
    }

    /// Finds a command by its canonical verb or one of its aliases.
    pub fn lookup(&self, verb: &str) -> Option<&'static CommandInfo> {
        let commands: &'static [CommandInfo] = self.commands;
        commands.iter().find(|info| info.matches(verb))
    }

    /// Splits a line into verb and remainder and runs the matching parser.
    /// The verb is matched case-insensitively; unknown verbs give a command
    /// tagged [`UNKNOWN`] holding the whole line.
    pub fn parse(&self, line: &str) -> Command {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let verb = verb.to_ascii_lowercase();

        match self.lookup(&verb) {
            Some(info) => (info.parser)(&verb, rest),
            None => Command::new(UNKNOWN, line),
        }
    }

    /// Parses `line` and builds the action for `session`. Unknown verbs
    /// become an unknown-command action, so every line yields an action.
    pub fn input_to_action(&self, line: &str, session: SessionId) -> Action {
        let command = self.parse(line);

        match self.lookup(command.verb) {
            Some(info) => (info.action)(command, session),
            None => actions::unknown(command, session),
        }
    }

    /// One `verb<TAB>description` line per command, in table order.
    pub fn help(&self) -> String {
        let mut output = String::from("help:");
        for info in self.commands {
            output.push_str(&format!("\n\t{}\t{}", info.verb, info.description));
        }
        output
    }
}
