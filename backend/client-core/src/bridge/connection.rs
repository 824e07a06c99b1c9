use crate::bridge::pcm::encode_block;
use crate::error::transport::TransportError;
use crate::protocol::{BridgeInit, Envelope};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Open,
    Init(BridgeInit),
    Closed,
    Failed(String),
}

/// A bridge event tagged with the bridge session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSignal {
    pub bridge_id: u64,
    pub event: BridgeEvent,
}

/// Writes converted audio blocks to the bridge connection.
#[derive(Debug, Clone)]
pub struct PcmSink {
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl PcmSink {
    #[track_caller]
    pub fn send_block(&self, samples: &[f32]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::NotLive {
                message: "Bridge connection is closed".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.outbound
            .send(Message::Binary(encode_block(samples).into()))
            .map_err(|e| TransportError::Send {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// The handshake/streaming connection of one live audio session. Never reconnects.
#[derive(Debug)]
pub struct BridgeConnection {
    outbound: Option<mpsc::UnboundedSender<Message>>,
    open: Arc<AtomicBool>,
}

impl BridgeConnection {
    /// Connect in the background, reporting through `events`.
    pub fn connect<E>(url: Url, bridge_id: u64, events: mpsc::UnboundedSender<E>) -> Self
    where
        E: From<BridgeSignal> + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(run(url, bridge_id, events, outbound_rx, open.clone()));

        Self {
            outbound: Some(outbound_tx),
            open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn pcm_sink(&self) -> Option<PcmSink> {
        self.outbound.as_ref().map(|outbound| PcmSink {
            outbound: outbound.clone(),
            open: self.open.clone(),
        })
    }

    /// Send a close frame if the connection is open. Returns whether it was.
    pub fn close(&mut self) -> bool {
        let was_open = self.open.swap(false, Ordering::SeqCst);
        if let Some(outbound) = self.outbound.take()
            && was_open
        {
            let _ = outbound.send(Message::Close(None));
        }
        was_open
    }
}

async fn run<E>(
    url: Url,
    bridge_id: u64,
    events: mpsc::UnboundedSender<E>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
) where
    E: From<BridgeSignal> + Send + 'static,
{
    let emit = |event: BridgeEvent| {
        let _ = events.send(E::from(BridgeSignal { bridge_id, event }));
    };

    debug!("Connecting bridge #{bridge_id} to {url}");
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            warn!("Bridge #{bridge_id} connect failed: {e}");
            emit(BridgeEvent::Failed(e.to_string()));
            emit(BridgeEvent::Closed);
            return;
        }
    };

    if outbound.is_closed() {
        // Torn down while the handshake was in flight.
        debug!("Bridge #{bridge_id} abandoned before open");
        return;
    }

    let (mut write, mut read) = ws_stream.split();
    open.store(true, Ordering::SeqCst);
    info!("Bridge #{bridge_id} connected to {url}");
    emit(BridgeEvent::Open);

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match Envelope::parse(text.as_str()).and_then(|envelope| BridgeInit::from_envelope(&envelope)) {
                        Ok(Some(init)) => {
                            info!("Bridge #{bridge_id} endpoint: {}", init.writer_socket);
                            emit(BridgeEvent::Init(init));
                        }
                        Ok(None) => debug!("Bridge #{bridge_id} ignoring message: {}", text.as_str()),
                        Err(e) => warn!("Bridge #{bridge_id} undecodable message: {e}"),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Bridge #{bridge_id} closed by server: {frame:?}");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Bridge #{bridge_id} read error: {e}");
                    emit(BridgeEvent::Failed(e.to_string()));
                    break;
                }
                None => break,
            },
            message = outbound.recv() => match message {
                Some(Message::Close(frame)) => {
                    let _ = write.send(Message::Close(frame)).await;
                    debug!("Bridge #{bridge_id} closed by client");
                    break;
                }
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        warn!("Bridge #{bridge_id} write error: {e}");
                        emit(BridgeEvent::Failed(e.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::SeqCst);
    emit(BridgeEvent::Closed);
}
