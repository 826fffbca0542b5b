//! Channel-based network client for the chat server.
//!
//! Spawns background reader/writer tasks and exposes channels so the
//! connection manager can send and receive frames without owning the socket
//! stream directly.
//!
//! Use [`NetClient::from_transport`] to construct a client over any
//! [`Transport`](banter_core::transport::Transport) implementation, or the
//! convenience method [`connect_ws`](NetClient::connect_ws) (WebSocket).

use tokio::sync::mpsc;

use banter_core::protocol::{ClientFrame, ServerFrame};
use banter_core::transport::{Transport, TransportError, TransportReader, TransportWriter};
use banter_core::ws_transport::WsTransport;

// ---------------------------------------------------------------------------
// Wire-level parsing
// ---------------------------------------------------------------------------

/// Outcome of parsing one inbound text frame.
#[derive(Debug)]
pub enum ParsedFrame {
    /// A well-formed [`ServerFrame`].
    Frame(ServerFrame),
    /// Empty / whitespace-only — skip it.
    Empty,
    /// Couldn't parse the frame (kept as raw text for logging).
    Malformed(String),
}

/// Parse a raw inbound text frame.
pub fn parse_server_frame(text: &str) -> ParsedFrame {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedFrame::Empty;
    }
    match serde_json::from_str::<ServerFrame>(trimmed) {
        Ok(frame) => ParsedFrame::Frame(frame),
        Err(_) => ParsedFrame::Malformed(trimmed.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Channel-based network events
// ---------------------------------------------------------------------------

/// High-level events produced by the background reader task.
#[derive(Debug)]
pub enum NetEvent {
    /// A successfully parsed [`ServerFrame`].
    Frame(ServerFrame),
    /// An unparseable frame (raw text, kept for logging).
    Malformed(String),
    /// The server closed the connection cleanly.
    Disconnected,
    /// An I/O error occurred on the connection.
    Error(String),
}

// ---------------------------------------------------------------------------
// NetClient
// ---------------------------------------------------------------------------

/// A channel-based network client for the chat server.
///
/// The returned client exposes:
/// - [`incoming`](NetClient::incoming) — an [`mpsc::UnboundedReceiver<NetEvent>`]
///   for server events.
/// - [`send`](NetClient::send) — a non-async, non-blocking method to enqueue
///   a [`ClientFrame`] for transmission.
///
/// Background tasks handle the actual I/O, making this safe to use from any
/// async context. Dropping the client ends both tasks and with them the
/// underlying stream.
pub struct NetClient {
    /// Receive parsed server events.
    pub incoming: mpsc::UnboundedReceiver<NetEvent>,
    /// Send-side of the writer channel (kept for [`Self::send`]).
    outgoing: mpsc::UnboundedSender<ClientFrame>,
}

impl NetClient {
    /// Create a `NetClient` over any [`Transport`] implementation.
    ///
    /// Splits the transport into read/write halves, spawns background tasks,
    /// and returns the ready-to-use client. No frames are sent automatically.
    pub fn from_transport<T: Transport>(transport: T) -> Self {
        let (reader, writer) = transport.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientFrame>();

        Self::spawn_reader_task(reader, event_tx);
        Self::spawn_writer_task(writer, cmd_rx);

        Self {
            incoming: event_rx,
            outgoing: cmd_tx,
        }
    }

    /// Connect to a WebSocket server and spawn background I/O tasks.
    pub async fn connect_ws(url: &str) -> Result<Self, TransportError> {
        let transport = WsTransport::connect(url).await?;
        Ok(Self::from_transport(transport))
    }

    /// Enqueue a [`ClientFrame`] for transmission to the server.
    ///
    /// This is non-blocking — the frame is written to a channel and the
    /// background writer task handles the actual I/O.
    pub fn send(&self, frame: ClientFrame) -> Result<(), mpsc::error::SendError<ClientFrame>> {
        self.outgoing.send(frame)
    }

    // ------------------------------------------------------------------
    // Private: background task spawners
    // ------------------------------------------------------------------

    /// Spawn the reader task that reads from any [`TransportReader`].
    fn spawn_reader_task<R: TransportReader>(
        mut reader: R,
        event_tx: mpsc::UnboundedSender<NetEvent>,
    ) {
        tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(text)) => {
                        let event = match parse_server_frame(&text) {
                            ParsedFrame::Frame(frame) => NetEvent::Frame(frame),
                            ParsedFrame::Malformed(raw) => NetEvent::Malformed(raw),
                            ParsedFrame::Empty => continue,
                        };
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = event_tx.send(NetEvent::Disconnected);
                        break;
                    }
                    Err(e) => {
                        let _ = event_tx.send(NetEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        });
    }

    /// Spawn the writer task that writes to any [`TransportWriter`].
    fn spawn_writer_task<W: TransportWriter>(
        mut writer: W,
        mut cmd_rx: mpsc::UnboundedReceiver<ClientFrame>,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = cmd_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(_) => continue,
                };
                if writer.send(&json).await.is_err() {
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_frames() {
        let raw = r#"{"messageType":"joined","payload":{"roomId":"AB12"}}"#;
        match parse_server_frame(raw) {
            ParsedFrame::Frame(ServerFrame::Joined { room_id }) => assert_eq!(room_id, "AB12"),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn blank_frames_are_skipped() {
        assert!(matches!(parse_server_frame("   \n"), ParsedFrame::Empty));
    }

    #[test]
    fn garbage_is_malformed_not_fatal() {
        match parse_server_frame("{\"messageType\":\"nope\"}") {
            ParsedFrame::Malformed(raw) => assert!(raw.contains("nope")),
            other => panic!("unexpected parse: {:?}", other),
        }
        assert!(matches!(
            parse_server_frame("not json"),
            ParsedFrame::Malformed(_)
        ));
    }
}
