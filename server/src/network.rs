//! Server network layer: accepts TCP connections and wires them to the world loop

use log::{error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::accounts::AccountManager;
use crate::actions::Action;
use crate::config::ServerConfig;
use crate::scheduler::Scheduler;
use crate::session;
use crate::world::World;
use crate::SessionId;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Main server owning the listener and the world it will hand to the scheduler
pub struct Server {
    listener: TcpListener,
    scheduler: Scheduler,
    actions: mpsc::Sender<Action>,
    next_session: SessionId,
}

impl Server {
    /// Binds the listener and builds the world. Nothing runs until
    /// [`Server::run`] is called.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addr()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let capacity = config.inbox_capacity.max(1);
        let (actions, inbox) = mpsc::channel(capacity);
        let world = World::new(config.rooms);
        let scheduler = Scheduler::new(world, AccountManager::new(config.max_clients), config.tick, inbox)
            .with_batch_limit(capacity);

        Ok(Server {
            listener,
            scheduler,
            actions,
            next_session: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the world loop and accepts connections until the world loop stops.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            scheduler,
            actions,
            mut next_session,
        } = self;
        let mut world_loop = tokio::spawn(scheduler.run());

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Could not disable Nagle for {}: {}", addr, e);
                            }
                            let id = allocate_session(&mut next_session);
                            info!("Session {} connected from {}", id, addr);

                            let actions = actions.clone();
                            tokio::spawn(async move {
                                if let Err(e) = session::run(id, stream, actions).await {
                                    warn!("Session {} ended with error: {}", id, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                result = &mut world_loop => {
                    if let Err(e) = result {
                        error!("World loop panicked: {}", e);
                        return Err(e.into());
                    }
                    info!("World loop stopped, server shutting down");
                    break;
                },
            }
        }

        Ok(())
    }
}

/// Hands out ids from 1 upwards, never 0.
fn allocate_session(next: &mut SessionId) -> SessionId {
    let id = *next;
    *next = next.wrapping_add(1).max(1);
    id
}
