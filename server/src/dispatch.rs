//! Single entry point for everything that arrives from connections.
//!
//! Socket tasks translate their traffic into [`InboundEvent`]s and push them
//! onto one queue; the server loop feeds that queue through [`Dispatcher`].
//! Because one connection always writes to the queue in arrival order, a
//! client's own updates are applied in the order it sent them.

use crate::connections::{encode_message, push, ConnectionTable, OutboundSender};
use crate::registry::{SessionRegistry, UpdateOutcome};
use log::{debug, error, warn};
use shared::{ClientEvent, ClientId, Position, ServerEvent};
use std::sync::Arc;

/// Events sent from connection tasks to the dispatch loop
#[derive(Debug)]
pub enum InboundEvent {
    Connect {
        id: ClientId,
        sender: OutboundSender,
    },
    Move {
        id: ClientId,
        position: Position,
    },
    Color {
        id: ClientId,
        color: String,
    },
    Disconnect {
        id: ClientId,
    },
}

impl InboundEvent {
    /// Wraps a decoded client message with the id of the connection it came from
    pub fn from_client_event(id: ClientId, event: ClientEvent) -> Self {
        match event {
            ClientEvent::Move(position) => InboundEvent::Move { id, position },
            ClientEvent::Color(color) => InboundEvent::Color { id, color },
        }
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            InboundEvent::Connect { id, .. }
            | InboundEvent::Move { id, .. }
            | InboundEvent::Color { id, .. }
            | InboundEvent::Disconnect { id } => id,
        }
    }
}

/// Applies inbound events to the registry and the connection table
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionTable>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, connections: Arc<ConnectionTable>) -> Self {
        Self {
            registry,
            connections,
        }
    }

    pub async fn dispatch(&self, event: InboundEvent) {
        match event {
            InboundEvent::Connect { id, sender } => self.handle_connect(id, sender).await,
            InboundEvent::Move { id, position } => {
                match self.registry.on_update_position(&id, position).await {
                    UpdateOutcome::Applied => {}
                    UpdateOutcome::UnknownClient => {
                        debug!("Ignoring move from unknown client {}", id);
                    }
                    UpdateOutcome::WrongCoordinates => {
                        warn!(
                            "Discarding move from {}: expected {} coordinates",
                            id,
                            self.registry.position_mode()
                        );
                    }
                }
            }
            InboundEvent::Color { id, color } => {
                if self.registry.on_update_color(&id, color).await == UpdateOutcome::UnknownClient {
                    debug!("Ignoring color from unknown client {}", id);
                }
            }
            InboundEvent::Disconnect { id } => {
                self.connections.unregister(&id).await;
                self.registry.on_disconnect(&id).await;
            }
        }
    }

    /// Registers a new connection and tells the client its id
    ///
    /// `init` is queued before the connection joins the broadcast table so it
    /// is always the first event the client sees. A refused connection gets
    /// `rejected` and its sender is dropped, which closes the socket.
    async fn handle_connect(&self, id: ClientId, sender: OutboundSender) {
        match self.registry.on_connect(id.clone()).await {
            Ok(_) => {
                let init = match encode_message(&ServerEvent::Init(id.clone())) {
                    Ok(message) => message,
                    Err(e) => {
                        error!("Failed to encode init for {}: {}", id, e);
                        self.registry.on_disconnect(&id).await;
                        return;
                    }
                };
                if let Err(e) = push(&id, &sender, init) {
                    warn!("Failed to send init to {}: {}", id, e);
                }
                self.connections.register(id, sender).await;
            }
            Err(e) => {
                warn!("Refusing connection {}: {}", id, e);
                let rejected = ServerEvent::Rejected(e.to_string());
                match encode_message(&rejected) {
                    Ok(message) => {
                        if let Err(e) = push(&id, &sender, message) {
                            debug!("Could not notify refused client {}: {}", id, e);
                        }
                    }
                    Err(e) => error!("Failed to encode rejection for {}: {}", id, e),
                }
            }
        }
    }
}
