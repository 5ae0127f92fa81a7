//! Socket.IO adapter for the process event source.
//!
//! Each subscription opens its own WebSocket connection, performs the
//! Engine.IO handshake, joins the namespace and then forwards the events of a
//! single channel. Heartbeats are answered from the reader task.

pub mod packet;

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::errors::AdapterError;
use crate::models::{Channel, ProcessEvent};
use crate::{Delivery, EventSource, Subscription, SUBSCRIPTION_BUFFER};
use packet::{EnginePacket, SocketPacket, SocketPacketKind};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SocketIoSource {
    url: String,
    namespace: String,
}

impl SocketIoSource {
    /// Builds a source for a base URL such as `http://localhost:8000`.
    ///
    /// `http`/`https` map onto `ws`/`wss`. A URL without a path gets the
    /// default Socket.IO endpoint appended, carrying over any query string;
    /// an explicit path is kept as is.
    pub fn new(base_url: &str) -> Result<Self, AdapterError> {
        Ok(Self {
            url: websocket_url(base_url)?,
            namespace: "/".to_string(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.starts_with('/') {
            namespace
        } else {
            format!("/{}", namespace)
        };
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Socket, AdapterError> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| AdapterError::ConnectionError(format!("{}: {}", self.url, err)))?;

        tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut socket, &self.namespace))
            .await
            .map_err(|_| {
                AdapterError::HandshakeError(format!(
                    "no answer from {} within {:?}",
                    self.url, HANDSHAKE_TIMEOUT
                ))
            })??;

        Ok(socket)
    }
}

#[async_trait]
impl EventSource for SocketIoSource {
    async fn subscribe(&self, channel: Channel) -> Result<Subscription, AdapterError> {
        let socket = self.connect().await?;
        log::info!("subscribed to {} on {}", channel, self.url);

        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(read_events(
            socket,
            self.namespace.clone(),
            channel,
            events_tx,
            shutdown_rx,
        ));

        Ok(Subscription::new(channel, events_rx, shutdown_tx))
    }

    fn describe(&self) -> String {
        format!("socket.io {}", self.url)
    }
}

fn websocket_url(base_url: &str) -> Result<String, AdapterError> {
    let trimmed = base_url.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| AdapterError::InvalidUrl(format!("missing scheme in {:?}", base_url)))?;

    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AdapterError::InvalidUrl(format!(
                "unsupported scheme {:?} in {:?}",
                other, base_url
            )))
        }
    };

    let (authority, path) = match rest.find(['/', '?']) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(AdapterError::InvalidUrl(format!(
            "missing host in {:?}",
            base_url
        )));
    }

    // A bare query (`host?token=x` or `host/?token=x`) rides on the default endpoint.
    let path = match path.trim_start_matches('/').strip_prefix('?') {
        Some("") => SOCKET_IO_PATH.to_string(),
        Some(query) => format!("{}&{}", SOCKET_IO_PATH, query),
        None if path.is_empty() || path == "/" => SOCKET_IO_PATH.to_string(),
        None => path.to_string(),
    };
    Ok(format!("{}://{}{}", scheme, authority, path))
}

async fn handshake(socket: &mut Socket, namespace: &str) -> Result<(), AdapterError> {
    let mut opened = false;

    while let Some(frame) = socket.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => return Err(AdapterError::HandshakeError(err.to_string())),
        };

        match EnginePacket::parse(&text)? {
            EnginePacket::Open(open) => {
                log::debug!(
                    "engine.io session {} (ping every {}ms)",
                    open.sid,
                    open.ping_interval
                );
                opened = true;
                let connect = EnginePacket::Message(SocketPacket::connect(namespace).encode());
                send(socket, connect).await?;
            }
            EnginePacket::Ping(data) => send(socket, EnginePacket::Pong(data)).await?,
            EnginePacket::Message(body) if opened => {
                let packet = SocketPacket::parse(&body)?;
                if packet.namespace != namespace {
                    continue;
                }
                match packet.kind {
                    SocketPacketKind::Connect => return Ok(()),
                    SocketPacketKind::ConnectError => {
                        return Err(AdapterError::HandshakeError(packet.error_message()))
                    }
                    _ => continue,
                }
            }
            EnginePacket::Close => break,
            _ => continue,
        }
    }

    Err(AdapterError::HandshakeError(
        "connection closed during handshake".to_string(),
    ))
}

async fn send(socket: &mut Socket, packet: EnginePacket) -> Result<(), AdapterError> {
    socket
        .send(Message::Text(packet.encode()))
        .await
        .map_err(|err| AdapterError::ConnectionError(err.to_string()))
}

/// What the reader should do with one inbound frame.
#[derive(Debug, PartialEq)]
enum Frame {
    Deliver(ProcessEvent),
    Reply(EnginePacket),
    Closed(String),
    Skip,
}

fn classify(text: &str, namespace: &str, channel: Channel) -> Frame {
    let packet = match EnginePacket::parse(text) {
        Ok(packet) => packet,
        Err(err) => {
            log::warn!("ignoring frame on {}: {}", channel, err);
            return Frame::Skip;
        }
    };

    let body = match packet {
        EnginePacket::Message(body) => body,
        EnginePacket::Ping(data) => return Frame::Reply(EnginePacket::Pong(data)),
        EnginePacket::Close => return Frame::Closed("server closed the session".to_string()),
        _ => return Frame::Skip,
    };

    let packet = match SocketPacket::parse(&body) {
        Ok(packet) if packet.namespace == namespace => packet,
        Ok(_) => return Frame::Skip,
        Err(err) => {
            log::warn!("ignoring packet on {}: {}", channel, err);
            return Frame::Skip;
        }
    };

    if packet.kind == SocketPacketKind::Disconnect {
        return Frame::Closed(format!("server disconnected namespace {}", namespace));
    }

    match packet.into_event() {
        Some((name, payload)) if name == channel.as_str() => {
            match ProcessEvent::from_payload(&payload) {
                Ok(event) => Frame::Deliver(event),
                Err(err) => {
                    log::warn!("dropping event on {}: {}", channel, err);
                    Frame::Skip
                }
            }
        }
        _ => Frame::Skip,
    }
}

async fn read_events(
    mut socket: Socket,
    namespace: String,
    channel: Channel,
    events: mpsc::Sender<Delivery>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let disconnect = EnginePacket::Message(SocketPacket::disconnect(&namespace).encode());
                let _ = send(&mut socket, disconnect).await;
                let _ = socket.close(None).await;
                log::debug!("closed socket for {}", channel);
                return;
            }
            frame = socket.next() => {
                let outcome = match frame {
                    Some(Ok(Message::Text(text))) => classify(&text, &namespace, channel),
                    Some(Ok(Message::Close(_))) | None => {
                        Frame::Closed("socket closed by server".to_string())
                    }
                    Some(Ok(_)) => Frame::Skip,
                    Some(Err(err)) => {
                        let _ = events.send(Err(AdapterError::ConnectionError(err.to_string()))).await;
                        return;
                    }
                };

                match outcome {
                    Frame::Deliver(event) => {
                        if events.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                    Frame::Reply(packet) => {
                        if let Err(err) = send(&mut socket, packet).await {
                            let _ = events.send(Err(err)).await;
                            return;
                        }
                    }
                    Frame::Closed(reason) => {
                        log::info!("{} stream ended: {}", channel, reason);
                        let _ = events.send(Err(AdapterError::Closed(reason))).await;
                        return;
                    }
                    Frame::Skip => {}
                }
            }
        }
    }
}
