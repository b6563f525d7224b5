//! One live websocket per logical request, multiplexed under its owning tab.
//! The bridge owns the socket task; the tab owns the bridge.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use netconsole_protocol::{PacketDirection, PayloadEncoding, ProtocolError};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::tab::TabEvent;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("websocket for request {0} is not connected")]
    NotConnected(String),
    #[error(transparent)]
    Payload(#[from] ProtocolError),
}

/// Socket-side notifications re-entering the owning tab's inbox.
#[derive(Debug)]
pub enum SocketNotice {
    Connected {
        request_id: String,
    },
    Packet {
        request_id: String,
        data: String,
        encoding: PayloadEncoding,
        direction: PacketDirection,
        elapsed_ms: u64,
    },
    Disconnected {
        request_id: String,
        /// Identifies the bridge instance, so a replaced bridge's exit
        /// cannot evict its replacement under the same request id.
        generation: u64,
    },
}

enum SocketCommand {
    Send(Message),
    Close,
}

pub struct WebsocketBridge {
    request_id: String,
    generation: u64,
    url: String,
    events: mpsc::UnboundedSender<TabEvent>,
    commands: Option<mpsc::UnboundedSender<SocketCommand>>,
    connected_at: Arc<Mutex<Option<Instant>>>,
}

impl WebsocketBridge {
    pub fn new(
        url: String,
        request_id: String,
        generation: u64,
        events: mpsc::UnboundedSender<TabEvent>,
    ) -> Self {
        Self {
            request_id,
            generation,
            url,
            events,
            commands: None,
            connected_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Opens the socket. The task emits exactly one `Disconnected` notice
    /// when the socket ends, whether the close was local, peer-initiated, or
    /// a failed connect; `disconnect()` never notifies by itself.
    pub fn connect(&mut self) {
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        self.commands = Some(commands_tx);

        let url = self.url.clone();
        let request_id = self.request_id.clone();
        let generation = self.generation;
        let events = self.events.clone();
        let connected_at = self.connected_at.clone();

        tokio::spawn(async move {
            let mut ws = match connect_async(&url).await {
                Ok((ws, _)) => ws,
                Err(err) => {
                    warn!(event = "websocket_connect_failed", request_id = %request_id, error = %err);
                    let _ = events.send(TabEvent::Socket(SocketNotice::Disconnected {
                        request_id,
                        generation,
                    }));
                    return;
                }
            };

            let opened = Instant::now();
            *connected_at.lock().expect("connect time lock poisoned") = Some(opened);
            let _ = events.send(TabEvent::Socket(SocketNotice::Connected {
                request_id: request_id.clone(),
            }));

            let mut commands_open = true;
            loop {
                tokio::select! {
                    command = commands_rx.recv(), if commands_open => match command {
                        Some(SocketCommand::Send(frame)) => {
                            if let Err(err) = ws.send(frame).await {
                                debug!(event = "websocket_send_failed", request_id = %request_id, error = %err);
                            }
                        }
                        Some(SocketCommand::Close) | None => {
                            // Keep draining; the close handshake ends the
                            // stream and the single exit path below fires.
                            commands_open = false;
                            let _ = ws.close(None).await;
                        }
                    },
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = events.send(TabEvent::Socket(SocketNotice::Packet {
                                request_id: request_id.clone(),
                                data: text,
                                encoding: PayloadEncoding::Text,
                                direction: PacketDirection::Recv,
                                elapsed_ms: opened.elapsed().as_millis() as u64,
                            }));
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            let _ = events.send(TabEvent::Socket(SocketNotice::Packet {
                                request_id: request_id.clone(),
                                data: STANDARD.encode(bytes),
                                encoding: PayloadEncoding::Base64,
                                direction: PacketDirection::Recv,
                                elapsed_ms: opened.elapsed().as_millis() as u64,
                            }));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    },
                }
            }

            let _ = events.send(TabEvent::Socket(SocketNotice::Disconnected {
                request_id,
                generation,
            }));
        });
    }

    /// Queues one outbound frame. State error if `connect()` was never
    /// called. The packet mirror always fires once the frame is accepted,
    /// regardless of wire delivery success.
    pub fn send(&self, message: &str, encoding: PayloadEncoding) -> Result<(), BridgeError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| BridgeError::NotConnected(self.request_id.clone()))?;

        let frame = match encoding {
            PayloadEncoding::Base64 => Message::Binary(
                STANDARD
                    .decode(message)
                    .map_err(|err| ProtocolError::Base64(err.to_string()))?,
            ),
            PayloadEncoding::Text => Message::Text(message.to_string()),
        };
        if commands.send(SocketCommand::Send(frame)).is_err() {
            debug!(event = "websocket_already_closed", request_id = %self.request_id);
        }

        let elapsed_ms = self
            .connected_at
            .lock()
            .expect("connect time lock poisoned")
            .map(|opened| opened.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let _ = self.events.send(TabEvent::Socket(SocketNotice::Packet {
            request_id: self.request_id.clone(),
            data: message.to_string(),
            encoding,
            direction: PacketDirection::Send,
            elapsed_ms,
        }));
        Ok(())
    }

    /// No-op when never connected; otherwise asks the socket task to close.
    /// The disconnect notification comes from the task's exit path only, so
    /// repeated calls cannot duplicate it.
    pub fn disconnect(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(SocketCommand::Close);
        }
    }
}
