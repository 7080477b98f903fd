//! WebSocket connection to the assistant service.
//!
//! A [`ConnectionManager`] owns one background I/O task. The task performs the
//! handshake, forwards inbound text frames to an [`InboundFrames`] channel and
//! writes queued outbound frames. Its lifecycle is published as a
//! [`ConnectionState`] that only ever moves forward; there is no reconnect.

use std::sync::Arc;

use derive_more::{Display, IsVariant};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::frame::{FrameError, OutboundFrame};
use crate::reducer::FrameSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw inbound text frames, in arrival order. Closed once the connection ends.
pub type InboundFrames = async_channel::Receiver<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IsVariant)]
pub enum ConnectionState {
    #[display("connecting")]
    Connecting,
    #[display("open")]
    Open,
    #[display("closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is not open")]
    NotOpen,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

enum Command {
    Send(String),
    Close,
}

pub struct ConnectionManager {
    endpoint: String,
    state: Arc<watch::Sender<ConnectionState>>,
    commands: mpsc::UnboundedSender<Command>,
    io_task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Start connecting to `endpoint` in the background.
    ///
    /// Must be called from within a tokio runtime. The manager starts in
    /// [`ConnectionState::Connecting`].
    pub fn open(endpoint: impl Into<String>) -> (Self, InboundFrames) {
        let endpoint = endpoint.into();
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state_tx);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = async_channel::unbounded();

        let io_task = tokio::spawn(run_connection(
            endpoint.clone(),
            command_rx,
            inbound_tx,
            state.clone(),
        ));

        let manager = Self {
            endpoint,
            state,
            commands: command_tx,
            io_task,
        };
        (manager, inbound_rx)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the handshake has either succeeded or failed.
    pub async fn settled(&self) -> ConnectionState {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if !state.is_connecting() {
                return state;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Queue one frame for delivery. Only allowed while open.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), ConnectionError> {
        if !self.state().is_open() {
            return Err(ConnectionError::NotOpen);
        }
        let json = frame.to_json()?;
        self.commands
            .send(Command::Send(json))
            .map_err(|_| ConnectionError::NotOpen)
    }

    /// Close the connection. Terminal: the manager cannot be reopened.
    pub fn close(&self) {
        if self.state().is_closed() {
            return;
        }
        info!(endpoint = %self.endpoint, "closing connection");
        let _ = self.commands.send(Command::Close);
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Close and wait for the I/O task to finish.
    pub async fn shutdown(self) {
        self.close();
        if let Err(err) = self.io_task.await {
            warn!(error = %err, "connection task ended abnormally");
        }
    }
}

impl FrameSink for ConnectionManager {
    fn send_frame(&self, frame: &OutboundFrame) -> Result<(), ConnectionError> {
        self.send(frame)
    }
}

async fn run_connection(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    inbound: async_channel::Sender<String>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    info!(endpoint = %endpoint, "connecting");

    let stream = tokio::select! {
        result = connect_async(endpoint.as_str()) => match result {
            Ok((stream, response)) => {
                debug!(status = %response.status(), "handshake complete");
                stream
            }
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "connection failed");
                state.send_replace(ConnectionState::Closed);
                return;
            }
        },
        _ = commands.recv() => {
            debug!("connection abandoned before handshake completed");
            state.send_replace(ConnectionState::Closed);
            return;
        }
    };

    // A close requested during the handshake already moved the state on.
    let opened = state.send_if_modified(|current| {
        if current.is_connecting() {
            *current = ConnectionState::Open;
            true
        } else {
            false
        }
    });
    if !opened {
        return;
    }
    info!(endpoint = %endpoint, "connected");

    pump_frames(stream, &mut commands, &inbound).await;

    state.send_replace(ConnectionState::Closed);
    info!(endpoint = %endpoint, "disconnected");
}

async fn pump_frames(
    stream: WsStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    inbound: &async_channel::Sender<String>,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(json)) => {
                    if let Err(err) = write.send(Message::text(json)).await {
                        warn!(error = %err, "failed to send frame");
                        return;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(err) = write.send(Message::Close(None)).await {
                        debug!(error = %err, "close frame not delivered");
                    }
                    return;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(text.as_str().to_owned()).await.is_err() {
                        debug!("inbound receiver dropped");
                        return;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    warn!(len = bytes.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "server closed the connection");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "connection error");
                    return;
                }
                None => return,
            }
        }
    }
}
