//! Error types for the headless client.

use shared::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("server rejected connection: {0}")]
    Rejected(String),

    #[error("connection closed by server")]
    Closed,

    #[error("timed out waiting for the server")]
    Timeout,

    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(e))
    }
}
