//! One actor per connection.
//!
//! The session reads lines, turns them into actions through its current
//! command registry, submits them to the world loop and waits for the one
//! reply each action produces before reading the next line. A second task
//! copies the session's broadcast channel to the connection until the world
//! loop drops the last sender, which happens when the session disconnects.

use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::actions::Action;
use crate::commands::CommandRegistry;
use crate::mailbox::{self, Reply};
use crate::SessionId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("world loop is not accepting actions")]
    SchedulerGone,
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

type SharedWriter<S> = Arc<Mutex<io::WriteHalf<S>>>;

/// Drives one connection until the peer goes away.
pub async fn run<S>(id: SessionId, stream: S, actions: mpsc::Sender<Action>) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = io::split(stream);
    let writer: SharedWriter<S> = Arc::new(Mutex::new(writer));
    let (outbox, inbox) = mailbox::channel(id);
    let mut replies = inbox.reply;

    submit(&actions, Action::joined(id, outbox)).await?;

    let forwarder = tokio::spawn(forward_broadcasts(id, inbox.broadcast, Arc::clone(&writer)));

    let result = serve(id, reader, &writer, &actions, &mut replies).await;

    // The broadcast channel closes once the world loop has let go of us
    if let Err(e) = forwarder.await {
        debug!("Broadcast task of session {} ended abnormally: {}", id, e);
    }
    let _ = writer.lock().await.shutdown().await;

    info!("Session {} closed", id);
    result
}

async fn serve<S>(
    id: SessionId,
    reader: io::ReadHalf<S>,
    writer: &SharedWriter<S>,
    actions: &mpsc::Sender<Action>,
    replies: &mut mpsc::UnboundedReceiver<Reply>,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite,
{
    let mut registry = CommandRegistry::login();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    // Greeting for the join action
    match replies.recv().await {
        Some(Reply::Closed(message)) => {
            let _ = write_message(writer, &message).await;
            return Ok(());
        }
        Some(reply) => {
            if write_message(writer, reply.message()).await.is_err() {
                return disconnect(id, writer, actions, replies).await;
            }
        }
        None => return Ok(()),
    }

    loop {
        buf.clear();
        let line = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Session {} reached end of stream", id);
                break;
            }
            // Telnet negotiation and other binary noise must not end the session
            Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
            Err(e) => {
                debug!("Session {} read failed: {}", id, e);
                break;
            }
        };

        let action = registry.input_to_action(&shared::sanitize(&line), id);
        submit(actions, action).await?;

        let message = match replies.recv().await {
            Some(Reply::Text(message)) => message,
            Some(Reply::EnteredWorld(message)) => {
                registry = CommandRegistry::in_world();
                message
            }
            Some(Reply::Closed(message)) => {
                let _ = write_message(writer, &message).await;
                return Ok(());
            }
            None => {
                debug!("Session {} reply channel closed", id);
                return Ok(());
            }
        };

        if let Err(e) = write_message(writer, &message).await {
            debug!("Session {} write failed: {}", id, e);
            break;
        }
    }

    disconnect(id, writer, actions, replies).await
}

async fn disconnect<W>(
    id: SessionId,
    writer: &Mutex<W>,
    actions: &mpsc::Sender<Action>,
    replies: &mut mpsc::UnboundedReceiver<Reply>,
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    submit(actions, Action::disconnecting(id)).await?;

    // The peer may only have closed its write side
    if let Some(reply) = replies.recv().await {
        let _ = write_message(writer, reply.message()).await;
    }
    Ok(())
}

async fn submit(actions: &mpsc::Sender<Action>, action: Action) -> Result<(), SessionError> {
    actions
        .send(action)
        .await
        .map_err(|_| SessionError::SchedulerGone)
}

async fn forward_broadcasts<W>(id: SessionId, mut broadcasts: mpsc::UnboundedReceiver<String>, writer: Arc<Mutex<W>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = broadcasts.recv().await {
        if let Err(e) = write_message(&writer, &message).await {
            debug!("Session {} broadcast write failed: {}", id, e);
            break;
        }
    }
}

/// Writes one framed message and flushes it.
async fn write_message<W>(writer: &Mutex<W>, message: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer.write_all(shared::frame(message).as_bytes()).await?;
    writer.flush().await
}
