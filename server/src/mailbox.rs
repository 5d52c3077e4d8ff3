//! Per-session delivery handles.
//!
//! Every session owns two mailboxes: a point-to-point reply channel that
//! answers the command the session is currently waiting on, and a broadcast
//! channel for everything the world pushes at it unprompted (other players
//! talking, activity ticks). The scheduler only ever holds the sending halves.

use log::debug;
use tokio::sync::mpsc;

use crate::SessionId;

/// The single answer to one submitted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text answer; the session stays in its current phase.
    Text(String),
    /// Login completed; the session switches to the in-world registry.
    EnteredWorld(String),
    /// The server refuses the session; it writes the text and hangs up.
    Closed(String),
}

impl Reply {
    /// Shorthand for [`Reply::Text`].
    pub fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }

    /// The text to write to the connection, whatever the reply kind.
    pub fn message(&self) -> &str {
        match self {
            Reply::Text(message) | Reply::EnteredWorld(message) | Reply::Closed(message) => message,
        }
    }
}

/// Sending halves of a session's reply and broadcast channels.
///
/// Both channels are unbounded so that delivering a message never suspends
/// the scheduler. Sends to a session that already went away are dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    session: SessionId,
    reply: mpsc::UnboundedSender<Reply>,
    broadcast: mpsc::UnboundedSender<String>,
}

/// Receiving halves, kept by the session actor.
#[derive(Debug)]
pub struct Inbox {
    pub reply: mpsc::UnboundedReceiver<Reply>,
    pub broadcast: mpsc::UnboundedReceiver<String>,
}

/// Creates the two mailboxes for a session.
pub fn channel(session: SessionId) -> (Outbox, Inbox) {
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    (
        Outbox {
            session,
            reply: reply_tx,
            broadcast: broadcast_tx,
        },
        Inbox {
            reply: reply_rx,
            broadcast: broadcast_rx,
        },
    )
}

impl Outbox {
    /// The session these handles deliver to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Answers the action the session is waiting on.
    ///
    /// Exactly one reply must be sent per action, otherwise the session
    /// either stalls or reads a stale answer for its next command.
    pub fn reply(&self, reply: Reply) {
        if self.reply.send(reply).is_err() {
            debug!("Reply to closed session {} dropped", self.session);
        }
    }

    /// Pushes an unsolicited message, such as another player talking.
    ///
    /// The session writes broadcasts as they arrive, independently of the
    /// command it may be waiting on.
    pub fn broadcast(&self, message: impl Into<String>) {
        if self.broadcast.send(message.into()).is_err() {
            debug!("Broadcast to closed session {} dropped", self.session);
        }
    }
}
