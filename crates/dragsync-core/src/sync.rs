//! WebSocket sync channel.
//!
//! Owns the single duplex connection to the remote peer. Outbound drag
//! positions are written immediately while the connection is open; inbound
//! frames are turned into radius updates. Transport notifications are
//! queued and applied on the caller's thread by `poll_events()`, so state
//! transitions happen one at a time in delivery order.

use std::fmt;

use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{PositionMessage, parse_inbound};

/// Connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    /// The peer sent a close frame; waiting for the socket to shut down.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Address of the remote peer as entered by the user.
///
/// Not validated here: a bad host or port surfaces as a failed connection
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", "8080")
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// WebSocket URL for this endpoint.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Events reported to the owner of the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Handshake completed; the connection is open.
    Connected,
    /// The connection is gone. `reason` is set when it ended because of a
    /// failure rather than a close.
    Disconnected { reason: Option<String> },
    /// The peer sent a new radius.
    RadiusChanged(f64),
}

/// Sync channel errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Connection already {0}")]
    AlreadyActive(ConnectionState),
    #[error("Not connected")]
    NotOpen,
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Raw notifications produced by a transport.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TransportEvent {
    Opened,
    Text(String),
    Closing,
    Closed,
    Failed(String),
}

/// Connection state machine shared by the platform transports.
#[derive(Debug, Default)]
pub(crate) struct ChannelState {
    state: ConnectionState,
    events: Vec<SyncEvent>,
}

impl ChannelState {
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn begin_connect(&mut self) -> Result<(), SyncError> {
        if self.state != ConnectionState::Disconnected {
            return Err(SyncError::AlreadyActive(self.state));
        }
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Local close. Returns false if there was nothing to close.
    pub(crate) fn close(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        self.events.push(SyncEvent::Disconnected { reason: None });
        true
    }

    /// Apply one transport notification. Returns true once the transport
    /// has finished and its handles can be released.
    pub(crate) fn apply(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    self.events.push(SyncEvent::Connected);
                } else {
                    log::warn!("Ignoring open notification while {}", self.state);
                }
                false
            }
            TransportEvent::Text(text) => {
                if self.state != ConnectionState::Open {
                    log::debug!("Dropping message received while {}", self.state);
                    return false;
                }
                match parse_inbound(&text) {
                    Ok(radius) => self.events.push(SyncEvent::RadiusChanged(radius)),
                    Err(e) => log::warn!("Discarding message {:?}: {}", truncate(&text), e),
                }
                false
            }
            TransportEvent::Closing => {
                if self.state == ConnectionState::Open {
                    self.state = ConnectionState::Closing;
                }
                false
            }
            TransportEvent::Closed => {
                if self.state != ConnectionState::Disconnected {
                    self.state = ConnectionState::Disconnected;
                    self.events.push(SyncEvent::Disconnected { reason: None });
                }
                true
            }
            TransportEvent::Failed(message) => {
                log::error!("WebSocket failure: {}", message);
                if self.state != ConnectionState::Disconnected {
                    self.state = ConnectionState::Disconnected;
                    self.events.push(SyncEvent::Disconnected {
                        reason: Some(message),
                    });
                }
                true
            }
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn encode_position(position: Point) -> Result<String, SyncError> {
    Ok(PositionMessage::from(position).to_json()?)
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    type Queue = Rc<RefCell<Vec<TransportEvent>>>;

    /// Sync channel backed by the browser's WebSocket.
    ///
    /// Callbacks only enqueue notifications; `poll_events()` applies them.
    pub struct WasmSyncChannel {
        ws: Option<WebSocket>,
        channel: ChannelState,
        queue: Queue,
        _on_open: Option<Closure<dyn Fn()>>,
        _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
        _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
        _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
    }

    impl WasmSyncChannel {
        pub fn new() -> Self {
            Self {
                ws: None,
                channel: ChannelState::default(),
                queue: Rc::new(RefCell::new(Vec::new())),
                _on_open: None,
                _on_message: None,
                _on_close: None,
                _on_error: None,
            }
        }

        /// Start connecting to `endpoint`.
        pub fn connect(&mut self, endpoint: &Endpoint) -> Result<(), SyncError> {
            self.channel.begin_connect()?;
            let url = endpoint.url();
            log::info!("Connecting to {}", url);

            let ws = match WebSocket::new(&url) {
                Ok(ws) => ws,
                Err(e) => {
                    self.queue
                        .borrow_mut()
                        .push(TransportEvent::Failed(format!("Failed to create WebSocket: {:?}", e)));
                    return Ok(());
                }
            };

            let queue_open = self.queue.clone();
            let on_open = Closure::wrap(Box::new(move || {
                queue_open.borrow_mut().push(TransportEvent::Opened);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let queue_msg = self.queue.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                    queue_msg.borrow_mut().push(TransportEvent::Text(txt.into()));
                } else {
                    log::warn!("Ignoring non-text WebSocket message");
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let queue_close = self.queue.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                queue_close.borrow_mut().push(TransportEvent::Closed);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            let queue_err = self.queue.clone();
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                queue_err
                    .borrow_mut()
                    .push(TransportEvent::Failed("WebSocket error".to_string()));
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self._on_open = Some(on_open);
            self._on_message = Some(on_message);
            self._on_close = Some(on_close);
            self._on_error = Some(on_error);

            Ok(())
        }

        /// Close the connection. No-op when already disconnected.
        pub fn disconnect(&mut self) {
            if self.channel.close() {
                log::info!("Disconnect requested");
                self.release();
            }
        }

        /// Transmit the dragged point's position. Dropped unless open.
        pub fn send_position(&self, position: Point) -> Result<(), SyncError> {
            if self.channel.state() != ConnectionState::Open {
                return Err(SyncError::NotOpen);
            }
            let ws = self.ws.as_ref().ok_or(SyncError::NotOpen)?;
            let msg = encode_position(position)?;
            ws.send_with_str(&msg)
                .map_err(|e| SyncError::Transport(format!("Send failed: {:?}", e)))
        }

        /// Apply queued notifications and return the resulting events.
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let pending = std::mem::take(&mut *self.queue.borrow_mut());
            for event in pending {
                if self.channel.apply(event) {
                    self.release();
                    break;
                }
            }
            self.channel.take_events()
        }

        pub fn state(&self) -> ConnectionState {
            self.channel.state()
        }

        pub fn is_open(&self) -> bool {
            self.channel.state() == ConnectionState::Open
        }

        fn release(&mut self) {
            if let Some(ws) = self.ws.take() {
                ws.set_onopen(None);
                ws.set_onmessage(None);
                ws.set_onclose(None);
                ws.set_onerror(None);
                let _ = ws.close();
            }
            self.queue.borrow_mut().clear();
            self._on_open = None;
            self._on_message = None;
            self._on_close = None;
            self._on_error = None;
        }
    }

    impl Default for WasmSyncChannel {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmSyncChannel;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// How long a read may block before pending sends are flushed.
    const READ_TIMEOUT: Duration = Duration::from_millis(20);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Sync channel for native platforms.
    ///
    /// The blocking socket lives on a background thread; the owner talks to
    /// it through channels and never blocks.
    pub struct NativeSyncChannel {
        channel: ChannelState,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive notifications from the WebSocket thread.
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeSyncChannel {
        pub fn new() -> Self {
            Self {
                channel: ChannelState::default(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Start connecting to `endpoint`.
        ///
        /// Fails without side effects if a connection already exists. A
        /// handshake failure (including an unparsable endpoint) is reported
        /// later as `SyncEvent::Disconnected` with a reason.
        pub fn connect(&mut self, endpoint: &Endpoint) -> Result<(), SyncError> {
            self.channel.begin_connect()?;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = endpoint.url();

            let handle = thread::spawn(move || run_socket(&url, &cmd_rx, &event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Close the connection. No-op when already disconnected.
        pub fn disconnect(&mut self) {
            if self.channel.close() {
                log::info!("Disconnect requested");
                if let Some(tx) = self.cmd_tx.as_ref() {
                    let _ = tx.send(WsCommand::Close);
                }
                self.release();
            }
        }

        /// Transmit the dragged point's position. Dropped unless open.
        pub fn send_position(&self, position: Point) -> Result<(), SyncError> {
            if self.channel.state() != ConnectionState::Open {
                return Err(SyncError::NotOpen);
            }
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotOpen)?;
            let msg = encode_position(position)?;
            tx.send(WsCommand::Send(msg))
                .map_err(|e| SyncError::Transport(format!("Send failed: {}", e)))
        }

        /// Apply pending notifications and return the resulting events.
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let mut finished = false;
            if let Some(ref rx) = self.event_rx {
                loop {
                    match rx.try_recv() {
                        Ok(event) => {
                            if self.channel.apply(event) {
                                finished = true;
                                break;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            self.channel
                                .apply(TransportEvent::Failed("WebSocket thread exited".to_string()));
                            finished = true;
                            break;
                        }
                    }
                }
            }
            if finished {
                self.release();
            }
            self.channel.take_events()
        }

        pub fn state(&self) -> ConnectionState {
            self.channel.state()
        }

        pub fn is_open(&self) -> bool {
            self.channel.state() == ConnectionState::Open
        }

        fn release(&mut self) {
            self.cmd_tx = None;
            self.event_rx = None;
            self._thread = None;
        }
    }

    impl Default for NativeSyncChannel {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeSyncChannel {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Body of the WebSocket thread.
    fn run_socket(url: &str, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<TransportEvent>) {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = event_tx.send(TransportEvent::Failed(format!("Invalid URL {}: {}", url, e)));
                return;
            }
        };

        log::info!("WebSocket thread: connecting to {}", parsed);
        let mut socket = match connect(parsed.as_str()) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                socket
            }
            Err(e) => {
                let _ = event_tx.send(TransportEvent::Failed(format!("Connection failed: {}", e)));
                return;
            }
        };

        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
            let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
        }

        if event_tx.send(TransportEvent::Opened).is_err() {
            let _ = socket.close(None);
            return;
        }

        loop {
            // Flush every queued command before blocking on a read.
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(msg)) => {
                        log::trace!("WebSocket sending: {}", msg);
                        if let Err(e) = socket.send(Message::Text(msg)) {
                            let _ = event_tx.send(TransportEvent::Failed(format!("Send failed: {}", e)));
                            return;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        log::info!("WebSocket close requested");
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        return;
                    }
                    Err(TryRecvError::Disconnected) => {
                        log::info!("WebSocket command channel disconnected");
                        let _ = socket.close(None);
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", truncate(&txt));
                    if event_tx.send(TransportEvent::Text(txt)).is_err() {
                        let _ = socket.close(None);
                        return;
                    }
                }
                Ok(Message::Close(frame)) => {
                    log::info!("WebSocket received close frame: {:?}", frame);
                    let _ = event_tx.send(TransportEvent::Closing);
                }
                // Pings are answered by tungstenite on the next write/flush.
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    log::info!("WebSocket closed by peer");
                    let _ = event_tx.send(TransportEvent::Closed);
                    return;
                }
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Failed(format!("Read failed: {}", e)));
                    return;
                }
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeSyncChannel;

// ============================================================================
// Platform type alias
// ============================================================================

/// Platform-specific sync channel type.
#[cfg(target_arch = "wasm32")]
pub type PlatformSyncChannel = WasmSyncChannel;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformSyncChannel = NativeSyncChannel;

#[cfg(test)]
mod tests {
    use super::*;

    fn open_channel() -> ChannelState {
        let mut channel = ChannelState::default();
        channel.begin_connect().unwrap();
        channel.apply(TransportEvent::Opened);
        channel.take_events();
        channel
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(Endpoint::default().url(), "ws://127.0.0.1:8080");
        assert_eq!(Endpoint::new("example.com", "9000").to_string(), "example.com:9000");
    }

    #[test]
    fn test_connect_transitions_to_open() {
        let mut channel = ChannelState::default();
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        channel.begin_connect().unwrap();
        assert_eq!(channel.state(), ConnectionState::Connecting);
        assert!(channel.take_events().is_empty());

        assert!(!channel.apply(TransportEvent::Opened));
        assert_eq!(channel.state(), ConnectionState::Open);
        assert_eq!(channel.take_events(), vec![SyncEvent::Connected]);
    }

    #[test]
    fn test_connect_while_active_is_rejected() {
        let mut channel = open_channel();
        assert!(matches!(
            channel.begin_connect(),
            Err(SyncError::AlreadyActive(ConnectionState::Open))
        ));
        assert_eq!(channel.state(), ConnectionState::Open);

        let mut connecting = ChannelState::default();
        connecting.begin_connect().unwrap();
        assert!(connecting.begin_connect().is_err());
        assert_eq!(connecting.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_failed_handshake() {
        let mut channel = ChannelState::default();
        channel.begin_connect().unwrap();
        assert!(channel.apply(TransportEvent::Failed("refused".to_string())));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(
            channel.take_events(),
            vec![SyncEvent::Disconnected {
                reason: Some("refused".to_string())
            }]
        );

        // A fresh attempt is allowed afterwards.
        assert!(channel.begin_connect().is_ok());
    }

    #[test]
    fn test_remote_close_goes_through_closing() {
        let mut channel = open_channel();
        assert!(!channel.apply(TransportEvent::Closing));
        assert_eq!(channel.state(), ConnectionState::Closing);
        assert!(channel.take_events().is_empty());

        assert!(channel.apply(TransportEvent::Closed));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.take_events(), vec![SyncEvent::Disconnected { reason: None }]);
    }

    #[test]
    fn test_radius_message() {
        let mut channel = open_channel();
        channel.apply(TransportEvent::Text(r#"{"radius": 50}"#.to_string()));
        assert_eq!(channel.take_events(), vec![SyncEvent::RadiusChanged(50.0)]);
    }

    #[test]
    fn test_bad_messages_are_discarded() {
        let mut channel = open_channel();
        assert!(!channel.apply(TransportEvent::Text("not json".to_string())));
        assert!(!channel.apply(TransportEvent::Text(r#"{"size": 3}"#.to_string())));
        assert!(channel.take_events().is_empty());
        assert_eq!(channel.state(), ConnectionState::Open);
    }

    #[test]
    fn test_open_ignored_unless_connecting() {
        let mut channel = ChannelState::default();
        channel.apply(TransportEvent::Opened);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.take_events().is_empty());
    }

    #[test]
    fn test_local_close() {
        let mut channel = ChannelState::default();
        assert!(!channel.close());
        assert!(channel.take_events().is_empty());

        let mut channel = open_channel();
        assert!(channel.close());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.take_events(), vec![SyncEvent::Disconnected { reason: None }]);
        assert!(!channel.close());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "é".repeat(150);
        assert_eq!(truncate(&long).chars().count(), 100);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_send_dropped_when_not_open() {
        let channel = NativeSyncChannel::new();
        assert!(matches!(
            channel.send_position(Point::new(1.0, 2.0)),
            Err(SyncError::NotOpen)
        ));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_disconnect_when_disconnected_is_noop() {
        let mut channel = NativeSyncChannel::new();
        channel.disconnect();
        assert!(channel.poll_events().is_empty());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }
}
