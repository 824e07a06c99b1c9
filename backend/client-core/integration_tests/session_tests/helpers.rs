//! Test helpers for session integration tests.
//!
//! This module provides:
//! - A local WebSocket server that hands each accepted connection to the test
//! - A driver that feeds session events until a condition holds
//! - Envelope send/receive helpers

use client_core::bridge::{AudioCapture, CaptureConstraints, CaptureDevice, CaptureFuture, CaptureStream};
use client_core::config::ClientConfig;
use client_core::protocol::Envelope;
use client_core::session::{Effect, Session, SessionContext, SessionEvent};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type ServerSocket = WebSocketStream<TcpStream>;
pub type TestSession = Session<Vec<Effect>>;

/// Test helper: WebSocket server on an ephemeral port.
///
/// Every accepted connection is handed over together with its request path.
pub struct TestServer {
    pub base_url: String,
    connections: mpsc::UnboundedReceiver<(String, ServerSocket)>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let address = listener.local_addr().expect("Failed to read local address");
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut path = String::new();
                    let record_path = |request: &Request,
                                       response: Response|
                     -> Result<Response, ErrorResponse> {
                        path = request.uri().path().to_string();
                        Ok(response)
                    };
                    if let Ok(socket) = accept_hdr_async(stream, record_path).await {
                        let _ = tx.send((path, socket));
                    }
                });
            }
        });

        Self {
            base_url: format!("http://{address}"),
            connections: rx,
        }
    }

    /// Wait for the next connection and check which endpoint it hit.
    pub async fn accept(&mut self, expected_path: &str) -> ServerSocket {
        let (path, socket) = tokio::time::timeout(TEST_TIMEOUT, self.connections.recv())
            .await
            .expect("No connection in time")
            .expect("Server stopped");
        assert_eq!(path, expected_path, "Connection hit the wrong endpoint");
        socket
    }
}

/// Test helper: Config pointing at `base_url` with short delays.
pub fn config_for(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.server.base_url = base_url.to_string();
    config.server.reconnect_delay_secs = 1;
    config.ui.layout_settle_ms = 10;
    config
}

/// Test helper: Session recording every effect.
pub fn new_session(
    config: ClientConfig,
    capture: Arc<dyn AudioCapture>,
) -> (TestSession, mpsc::UnboundedReceiver<SessionEvent>) {
    Session::new(config, SessionContext::default(), capture, Vec::new())
        .expect("Failed to build session")
}

/// Test helper: Feed events to the session until `done` holds.
pub async fn drive_until<F>(
    session: &mut TestSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut done: F,
) where
    F: FnMut(&TestSession) -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !done(session) {
            let event = events.recv().await.expect("Session events closed");
            session.handle(event);
        }
    })
    .await
    .expect("Condition not reached in time");
}

/// Test helper: Connect the session to `server` and wait until it is live.
pub async fn connect_live(
    session: &mut TestSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    server: &mut TestServer,
) -> ServerSocket {
    session.connect();
    let socket = server.accept("/ws").await;
    drive_until(session, events, |s| s.is_live()).await;
    socket
}

/// Test helper: Next text frame as an envelope, skipping everything else.
pub async fn receive_envelope(socket: &mut ServerSocket) -> Envelope {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let message = socket
                .next()
                .await
                .expect("Connection closed")
                .expect("Error receiving message");
            if let Message::Text(text) = message {
                return Envelope::parse(text.as_str()).expect("Failed to parse envelope");
            }
        }
    })
    .await
    .expect("No envelope in time")
}

/// Test helper: Next binary frame.
pub async fn receive_binary(socket: &mut ServerSocket) -> Vec<u8> {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let message = socket
                .next()
                .await
                .expect("Connection closed")
                .expect("Error receiving message");
            if let Message::Binary(bytes) = message {
                return bytes.to_vec();
            }
        }
    })
    .await
    .expect("No binary frame in time")
}

/// Test helper: Send a JSON value as a text frame.
pub async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send message");
}

/// True if any recorded effect satisfies `predicate`.
pub fn saw(session: &TestSession, predicate: impl Fn(&Effect) -> bool) -> bool {
    session.sink().iter().any(predicate)
}

/// Test helper: Capture device that reports whether it is still held.
pub struct FakeDevice {
    active: Arc<AtomicBool>,
}

impl CaptureDevice for FakeDevice {
    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Test helper: Microphone that yields one fixed block, then stays open.
pub struct FakeCapture {
    pub block: Vec<f32>,
    pub active: Arc<AtomicBool>,
}

impl FakeCapture {
    pub fn new(block: Vec<f32>) -> Self {
        Self {
            block,
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AudioCapture for FakeCapture {
    fn open(&self, constraints: CaptureConstraints) -> CaptureFuture {
        let block = self.block.clone();
        let active = self.active.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(constraints.block_size.max(1));
            tokio::spawn(async move {
                if tx.send(block).await.is_ok() {
                    tx.closed().await;
                }
            });
            active.store(true, Ordering::SeqCst);
            Ok(CaptureStream {
                device: Box::new(FakeDevice { active }),
                blocks: rx,
            })
        })
    }
}
