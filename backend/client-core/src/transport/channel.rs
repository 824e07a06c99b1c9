use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// What the background task observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connection established; the channel is live.
    Open,
    /// A text frame from the server.
    Message(String),
    /// The connection ended or could not be made. A reconnect is already scheduled.
    Closed { was_live: bool },
    /// Connect or read failure detail, always followed by `Closed`.
    Failed(String),
}

/// Caller-side handle for a spawned [`ControlChannel`].
#[derive(Debug)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<Message>,
    live: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Queue a text frame. Fails when the channel is not currently live.
    #[track_caller]
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.send(Message::Text(text.into()))
    }

    #[track_caller]
    pub fn send_binary(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send(Message::Binary(bytes.into()))
    }

    #[track_caller]
    fn send(&self, message: Message) -> Result<(), TransportError> {
        if !self.is_live() {
            return Err(TransportError::NotLive {
                message: "Control channel is not connected".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.outbound
            .send(message)
            .map_err(|e| TransportError::Send {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Stop reconnecting and drop the connection.
    pub fn shutdown(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct ControlChannel {
    url: String,
    retry: Constant,
    live: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl ControlChannel {
    /// Start connecting to `url` in the background.
    ///
    /// A malformed URL is not an error here: it surfaces as `Failed` + `Closed`
    /// and is retried like any other failed attempt.
    pub fn spawn(
        url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(false));

        let channel = ControlChannel {
            url: url.into(),
            retry: Constant::new(reconnect_delay),
            live: live.clone(),
            events: events_tx,
            outbound: outbound_rx,
        };

        let task = tokio::spawn(channel.run());

        let handle = ChannelHandle {
            outbound: outbound_tx,
            live,
            task,
        };

        (handle, events_rx)
    }

    async fn run(mut self) {
        loop {
            self.drain_stale_outbound();

            let was_live = match self.connect_once().await {
                Ok(was_live) => was_live,
                Err(e) => {
                    warn!("Control channel connect failed: {e}");
                    if !self.emit(ChannelEvent::Failed(e.to_string())) {
                        return;
                    }
                    false
                }
            };

            self.live.store(false, Ordering::SeqCst);
            if !self.emit(ChannelEvent::Closed { was_live }) {
                return;
            }

            let delay = self
                .retry
                .next_backoff()
                .unwrap_or(Duration::from_secs(3));

            if was_live {
                info!("Control channel disconnected, reconnecting in {delay:?}");
            } else {
                info!("Control channel connection failed, retrying in {delay:?}");
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// One connection lifetime. `Ok(true)` once a live connection has ended.
    async fn connect_once(&mut self) -> Result<bool, TransportError> {
        let url = Url::parse(&self.url)?;
        debug!("Connecting control channel to {url}");

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        self.live.store(true, Ordering::SeqCst);
        info!("Control channel connected to {url}");
        if !self.emit(ChannelEvent::Open) {
            return Ok(true);
        }

        loop {
            tokio::select! {
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if !self.emit(ChannelEvent::Message(text.as_str().to_owned())) {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Control channel closed by server: {frame:?}");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Control channel read error: {e}");
                        self.emit(ChannelEvent::Failed(e.to_string()));
                        break;
                    }
                    None => break,
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(message) => {
                        if let Err(e) = write.send(message).await {
                            warn!("Control channel write error: {e}");
                            self.emit(ChannelEvent::Failed(e.to_string()));
                            break;
                        }
                    }
                    // Every handle is gone: nobody can send or listen any more.
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
            }
        }

        Ok(true)
    }

    /// Frames queued during a race with a disconnect belong to the old connection.
    fn drain_stale_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dropped {dropped} frame(s) queued while the control channel was down");
        }
    }

    fn emit(&self, event: ChannelEvent) -> bool {
        self.events.send(event).is_ok()
    }
}
