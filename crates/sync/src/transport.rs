//! Transport seam for the AI job connection.
//!
//! The session never touches sockets. Outbound messages go through a
//! `Transport`; inbound messages arrive on an mpsc `Receiver<ServerMessage>`
//! fed by whatever owns the connection, and are drained by `SyncSession::pump`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use sheetpilot_protocol::{ClientMessage, ServerMessage};

use crate::error::SyncError;

pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Id the backend knows this connection by (`websocketClientId`).
    fn client_id(&self) -> &str;

    fn send(&mut self, msg: &ClientMessage) -> Result<(), SyncError>;
}

/// Encode an outbound frame.
pub fn encode_frame(msg: &ClientMessage) -> Result<String, SyncError> {
    serde_json::to_string(msg).map_err(|e| SyncError::Transport(e.to_string()))
}

/// Decode an inbound frame. Unknown message types are an error for the caller to log and skip.
pub fn decode_frame(text: &str) -> Result<ServerMessage, SyncError> {
    serde_json::from_str(text).map_err(|e| SyncError::Transport(format!("bad frame: {}", e)))
}

/// In-process transport backed by channels. The far end is a `TransportPeer`.
pub struct ChannelTransport {
    client_id: String,
    connected: Arc<AtomicBool>,
    outbound: Sender<ClientMessage>,
}

/// The backend side of a `ChannelTransport`.
pub struct TransportPeer {
    connected: Arc<AtomicBool>,
    outbound: Receiver<ClientMessage>,
    inbound: Sender<ServerMessage>,
}

/// Build a connected transport, its peer, and the inbound receiver for the session.
pub fn channel_transport(client_id: &str) -> (ChannelTransport, TransportPeer, Receiver<ServerMessage>) {
    let connected = Arc::new(AtomicBool::new(true));
    let (out_tx, out_rx) = mpsc::channel();
    let (in_tx, in_rx) = mpsc::channel();
    (
        ChannelTransport {
            client_id: client_id.to_string(),
            connected: connected.clone(),
            outbound: out_tx,
        },
        TransportPeer { connected, outbound: out_rx, inbound: in_tx },
        in_rx,
    )
}

impl Transport for ChannelTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), SyncError> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.outbound
            .send(msg.clone())
            .map_err(|_| SyncError::Transport("peer closed".into()))
    }
}

impl TransportPeer {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Deliver a message to the session.
    pub fn push(&self, msg: ServerMessage) -> bool {
        self.inbound.send(msg).is_ok()
    }

    /// Deliver a raw JSON frame. Returns false if it does not decode.
    pub fn push_frame(&self, text: &str) -> bool {
        match decode_frame(text) {
            Ok(msg) => self.push(msg),
            Err(e) => {
                log::warn!("Dropping inbound frame: {}", e);
                false
            }
        }
    }

    /// Everything the session has sent so far.
    pub fn drain_sent(&self) -> Vec<ClientMessage> {
        self.outbound.try_iter().collect()
    }
}
