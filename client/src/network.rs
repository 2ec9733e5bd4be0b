use crate::error::ClientError;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientEvent, ClientId, Position, ServerEvent, UpdateAll};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `connect` waits for the `init` event
pub const INIT_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One WebSocket session with the broadcast server
pub struct Client {
    stream: WsStream,
    id: ClientId,
}

impl Client {
    /// Opens a session and waits for the server to assign an id
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", url);
        let (stream, _) = connect_async(url).await?;

        let mut client = Client {
            stream,
            id: ClientId::new(""),
        };

        match client.next_event(INIT_TIMEOUT).await? {
            ServerEvent::Init(id) => {
                info!("Connected! Client ID: {}", id);
                client.id = id;
                Ok(client)
            }
            ServerEvent::Rejected(reason) => {
                warn!("Rejected: {}", reason);
                Err(ClientError::Rejected(reason))
            }
            other => Err(ClientError::UnexpectedEvent(format!("{:?}", other))),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub async fn send_move(&mut self, position: Position) -> Result<(), ClientError> {
        self.send_event(&ClientEvent::Move(position)).await
    }

    pub async fn send_color(&mut self, color: &str) -> Result<(), ClientError> {
        self.send_event(&ClientEvent::Color(color.to_string())).await
    }

    pub async fn send_event(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        self.send_raw(event.to_json()?).await
    }

    /// Sends an arbitrary text frame, bypassing the typed protocol
    pub async fn send_raw(&mut self, text: String) -> Result<(), ClientError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Reads the next server event, skipping control frames
    pub async fn recv(&mut self) -> Result<ServerEvent, ClientError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Err(ClientError::Closed);
            };

            match frame? {
                Message::Text(text) => return Ok(ServerEvent::from_json(text.as_str())?),
                Message::Close(_) => return Err(ClientError::Closed),
                other => debug!("Skipping frame {:?}", other),
            }
        }
    }

    /// Like `recv`, but gives up after `deadline`
    pub async fn next_event(&mut self, deadline: Duration) -> Result<ServerEvent, ClientError> {
        tokio::time::timeout(deadline, self.recv())
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    /// Waits for the next `updateAll`, ignoring other events
    pub async fn next_update(&mut self, deadline: Duration) -> Result<UpdateAll, ClientError> {
        self.wait_for_update(deadline, |_| true).await
    }

    /// Waits for the first `updateAll` matching `predicate`
    pub async fn wait_for_update<F>(
        &mut self,
        deadline: Duration,
        predicate: F,
    ) -> Result<UpdateAll, ClientError>
    where
        F: Fn(&UpdateAll) -> bool,
    {
        let fut = async {
            loop {
                if let ServerEvent::UpdateAll(update) = self.recv().await? {
                    if predicate(&update) {
                        return Ok(update);
                    }
                }
            }
        };

        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    /// Sends a close frame and waits for the server to acknowledge it
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        while let Some(frame) = self.stream.next().await {
            if frame.is_err() {
                break;
            }
        }
        Ok(())
    }
}
