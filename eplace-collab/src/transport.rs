//! Bidirectional connection to the room authority.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect) with a pre-ready hook
//! - Outbound frame send, dropped with a warning while disconnected
//! - Inbound frame decoding; malformed frames are logged and skipped
//!
//! The socket itself is owned by spawned reader/writer tasks; the session
//! only ever sees a [`Link`], a pair of channels. Tests drive the same
//! session through [`Link::pair`] without any socket.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{InboundFrame, OutboundFrame};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection closed")]
    Closed,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the socket tasks report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(String),
    Closed(Option<String>),
}

/// Channel pair standing in for an open socket.
#[derive(Debug)]
pub struct Link {
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// The far side of an in-memory [`Link`].
#[derive(Debug)]
pub struct RemoteEnd {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> Self {
        Self { outgoing, events }
    }

    /// In-memory link with no socket behind it.
    pub fn pair() -> (Link, RemoteEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        (
            Link::new(out_tx, evt_rx),
            RemoteEnd {
                sent: out_rx,
                inbound: evt_tx,
            },
        )
    }

    fn send_text(&self, text: String) -> bool {
        self.outgoing.send(text).is_ok()
    }
}

impl RemoteEnd {
    /// Next frame the client wrote, waiting for it.
    pub async fn next_sent(&mut self) -> Option<OutboundFrame> {
        let text = self.sent.recv().await?;
        OutboundFrame::decode(&text).ok()
    }

    /// Every frame written so far, without waiting.
    pub fn drain_sent(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.sent.try_recv() {
            if let Ok(frame) = OutboundFrame::decode(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    pub fn deliver(&self, frame: &InboundFrame) -> bool {
        match frame.encode() {
            Ok(text) => self.deliver_raw(text),
            Err(_) => false,
        }
    }

    pub fn deliver_raw(&self, text: impl Into<String>) -> bool {
        self.inbound.send(LinkEvent::Frame(text.into())).is_ok()
    }

    pub fn close(&self, reason: Option<&str>) -> bool {
        self.inbound
            .send(LinkEvent::Closed(reason.map(str::to_string)))
            .is_ok()
    }
}

/// Opens links to the authority.
pub trait Connector {
    fn open(&self) -> impl Future<Output = Result<Link, TransportError>> + Send;
}

/// WebSocket connector (text frames carrying JSON).
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self) -> impl Future<Output = Result<Link, TransportError>> + Send {
        open_ws(self.url.clone())
    }
}

async fn open_ws(url: String) -> Result<Link, TransportError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connect {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    let (mut ws_writer, mut ws_reader) = ws_stream.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<LinkEvent>();

    // Writer task: forward outgoing channel to WebSocket
    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_writer.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_writer.close().await;
    });

    // Reader task: surface text frames until the socket goes away
    tokio::spawn(async move {
        let reason = loop {
            match ws_reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    if evt_tx.send(LinkEvent::Frame(text.as_str().to_owned())).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        if evt_tx.send(LinkEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Err(_) => log::warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_owned());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            }
        };
        let _ = evt_tx.send(LinkEvent::Closed(reason));
    });

    Ok(Link::new(out_tx, evt_rx))
}

/// Anything that can carry an outbound frame.
pub trait FrameSink {
    /// Returns `false` if the frame was dropped.
    fn send_frame(&mut self, frame: &OutboundFrame) -> bool;
}

fn encode_for_send(frame: &OutboundFrame) -> Option<String> {
    match frame.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            log::error!("Failed to encode outbound frame: {e}");
            None
        }
    }
}

/// Sink handed to the connect hook: the link is open, the session is not
/// yet `Connected`.
struct HandshakeSink<'a> {
    link: &'a Link,
}

impl FrameSink for HandshakeSink<'_> {
    fn send_frame(&mut self, frame: &OutboundFrame) -> bool {
        encode_for_send(frame).is_some_and(|text| self.link.send_text(text))
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    Frame(InboundFrame),
    Disconnected { reason: Option<String> },
}

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One logical connection to the authority.
pub struct TransportSession<C> {
    connector: C,
    state: ConnectionState,
    link: Option<Link>,
    connect_timeout: Duration,
}

impl<C: Connector> TransportSession<C> {
    pub fn new(connector: C) -> Self {
        Self::with_timeout(connector, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeout(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            state: ConnectionState::Disconnected,
            link: None,
            connect_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Establish the link. No-op when already connected.
    ///
    /// `on_ready` runs exactly once per successful connect, after the link
    /// is open and before the state becomes `Connected`, so frames it sends
    /// precede anything sent through [`send`](Self::send).
    pub async fn connect<F>(&mut self, on_ready: F) -> Result<(), TransportError>
    where
        F: FnOnce(&mut dyn FrameSink),
    {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        self.state = ConnectionState::Connecting;

        let opened = match tokio::time::timeout(self.connect_timeout, self.connector.open()).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.connect_timeout)),
        };
        let link = match opened {
            Ok(link) => link,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                log::warn!("Connect failed: {e}");
                return Err(e);
            }
        };

        on_ready(&mut HandshakeSink { link: &link });
        self.link = Some(link);
        self.state = ConnectionState::Connected;
        log::info!("Connected to room authority");
        Ok(())
    }

    /// Send one frame. Dropped with a warning while not connected.
    pub fn send(&mut self, frame: &OutboundFrame) -> bool {
        let Some(link) = self.link.as_ref().filter(|_| self.state == ConnectionState::Connected)
        else {
            log::warn!("Not connected; dropping outbound frame");
            return false;
        };
        let Some(text) = encode_for_send(frame) else {
            return false;
        };
        if link.send_text(text) {
            true
        } else {
            log::warn!("Link writer is gone; dropping outbound frame");
            false
        }
    }

    /// Next decoded inbound frame or the disconnect that ended the link.
    ///
    /// Returns `None` when there is no link to read from.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let link = self.link.as_mut()?;
            let reason = match link.events.recv().await {
                Some(LinkEvent::Frame(text)) => match InboundFrame::decode(&text) {
                    Ok(frame) => return Some(SessionEvent::Frame(frame)),
                    Err(e) => {
                        log::warn!("Dropping malformed inbound frame: {e}");
                        continue;
                    }
                },
                Some(LinkEvent::Closed(reason)) => reason,
                None => None,
            };
            self.link = None;
            self.state = ConnectionState::Disconnected;
            log::info!(
                "Disconnected from room authority ({})",
                reason.as_deref().unwrap_or("no reason")
            );
            return Some(SessionEvent::Disconnected { reason });
        }
    }

    /// Drop the link. The writer task closes the socket.
    pub fn disconnect(&mut self) {
        if self.link.take().is_some() {
            log::info!("Disconnecting from room authority");
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl<C: Connector> FrameSink for TransportSession<C> {
    fn send_frame(&mut self, frame: &OutboundFrame) -> bool {
        self.send(frame)
    }
}

/// Hands out pre-built links, one per `open`. For tests and embedding.
#[derive(Debug, Default)]
pub struct QueuedConnector {
    links: std::sync::Mutex<std::collections::VecDeque<Link>>,
}

impl QueuedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fresh in-memory link and return its far side.
    pub fn push_pair(&self) -> RemoteEnd {
        let (link, remote) = Link::pair();
        if let Ok(mut links) = self.links.lock() {
            links.push_back(link);
        }
        remote
    }
}

impl Connector for QueuedConnector {
    fn open(&self) -> impl Future<Output = Result<Link, TransportError>> + Send {
        let next = self.links.lock().ok().and_then(|mut links| links.pop_front());
        std::future::ready(next.ok_or_else(|| TransportError::Connect {
            url: "memory".to_string(),
            reason: "no link queued".to_string(),
        }))
    }
}
