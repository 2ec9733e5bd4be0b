//! Server network layer handling WebSocket connections and task coordination

use crate::config::ServerConfig;
use crate::connections::ConnectionTable;
use crate::dispatch::{Dispatcher, InboundEvent};
use crate::error::ServerError;
use crate::registry::SessionRegistry;
use crate::scheduler::{spawn_broadcaster, spawn_sweeper, TaskSet};
use crate::utils::generate_client_id;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ClientId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Main server coordinating connections, dispatch and periodic tasks
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionTable>,
}

impl Server {
    /// Binds the listening socket without starting any task
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let registry = Arc::new(SessionRegistry::new(
            config.coordinates,
            config.color_policy(),
            config.max_clients,
        ));

        Ok(Server {
            listener,
            config,
            registry,
            connections: Arc::new(ConnectionTable::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Runs until the future is dropped
    ///
    /// Spawns the broadcast task, the sweep task (unless eviction is
    /// disabled) and one task per accepted socket; inbound events from every
    /// socket are applied here, one at a time.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            config,
            registry,
            connections,
        } = self;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<InboundEvent>();
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&connections));

        let mut tasks = TaskSet::new();
        tasks.push(spawn_broadcaster(
            Arc::clone(&registry),
            Arc::clone(&connections),
            config.broadcast_interval(),
            config.include_count,
        ));
        match config.stale_timeout() {
            Some(timeout) => {
                tasks.push(spawn_sweeper(
                    Arc::clone(&registry),
                    config.sweep_interval(),
                    timeout,
                ));
            }
            None => info!("Stale-entry eviction disabled"),
        }

        info!(
            "Server started: broadcast every {}ms, {} coordinates",
            config.broadcast_interval_ms, config.coordinates
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let events_tx = events_tx.clone();
                            tokio::spawn(handle_connection(
                                stream,
                                addr,
                                events_tx,
                                config.outbound_buffer,
                            ));
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                Some(event) = events_rx.recv() => {
                    debug!("Dispatching event for {}", event.client_id());
                    dispatcher.dispatch(event).await;
                },
            }
        }
    }
}

/// Upgrades one TCP stream and pumps its traffic until either side closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
    outbound_buffer: usize,
) {
    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let id = generate_client_id();
    info!("Client {} connected from {}", id, addr);

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(outbound_buffer);
    if events_tx
        .send(InboundEvent::Connect {
            id: id.clone(),
            sender: out_tx,
        })
        .is_err()
    {
        error!("Dispatch loop is gone, dropping {}", id);
        return;
    }

    let (mut sink, mut source) = socket.split();

    // Forward queued events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Decode client frames into inbound events
    let mut recv_task = {
        let id = id.clone();
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = decode_frame(&id, text.as_str()) {
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Client {} requested close", id);
                        break;
                    }
                    Ok(Message::Binary(_)) => {
                        warn!("Ignoring binary frame from {}", id);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                }
            }
        })
    };

    // If either direction finishes, stop the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    info!("Client {} disconnected", id);
    let _ = events_tx.send(InboundEvent::Disconnect { id });
}

/// Decodes one text frame, discarding anything malformed
fn decode_frame(id: &ClientId, text: &str) -> Option<InboundEvent> {
    match ClientEvent::from_json(text) {
        Ok(event) => Some(InboundEvent::from_client_event(id.clone(), event)),
        Err(e) => {
            warn!("Discarding malformed message from {}: {}", id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Position;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_decode_frame_move() {
        let id = ClientId::new("a");

        let event = decode_frame(&id, r#"{"event":"move","data":{"r":2,"theta":1}}"#);

        match event {
            Some(InboundEvent::Move { id: i, position }) => {
                assert_eq!(i, id);
                assert_eq!(position, Position::Polar { r: 2.0, theta: 1.0 });
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_frame_discards_malformed() {
        let id = ClientId::new("a");

        assert!(decode_frame(&id, "garbage").is_none());
        assert!(decode_frame(&id, r#"{"event":"move","data":{"theta":1}}"#).is_none());
        assert!(decode_frame(&id, r##"{"event":"color","data":{"hex":"#fff"}}"##).is_none());
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(test_config()).await.unwrap();

        let addr = server.local_addr().unwrap();

        assert_ne!(addr.port(), 0);
        assert!(server.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_bind_failure_surfaces_io_error() {
        let first = Server::bind(test_config()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let result = Server::bind(ServerConfig {
            port: taken.port(),
            ..ServerConfig::default()
        })
        .await;

        assert!(matches!(result, Err(ServerError::Io(_))));
    }
}
