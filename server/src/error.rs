//! Error types for the broadcast server.

use shared::{ClientId, ProtocolError};
use thiserror::Error;

/// Reasons the registry refuses a new connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("server full ({0} clients connected)")]
    AtCapacity(usize),
    #[error("client '{0}' is already registered")]
    DuplicateId(ClientId),
}

/// Failure to hand an event to a single connection's outbound queue
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("client '{0}' has no open connection")]
    UnknownClient(ClientId),
    #[error("outbound queue for client '{0}' is full")]
    QueueFull(ClientId),
    #[error("connection to client '{0}' is closed")]
    Closed(ClientId),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Process-level server failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
