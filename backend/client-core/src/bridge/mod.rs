//! Live microphone bridge.
//!
//! `Closed → BridgeConnecting → BridgeOpen → Streaming → Closed`. The bridge
//! connection hands out a socket endpoint; the remote job is launched on the
//! control channel only once that endpoint and the microphone are both ready.

pub mod capture;
pub mod connection;
pub mod gate;
pub mod pcm;

pub use capture::{
    AudioCapture, CaptureConstraints, CaptureDevice, CaptureFuture, CaptureStream,
    CommandCapture, acquire,
};
pub use connection::{BridgeConnection, BridgeEvent, BridgeSignal, PcmSink};
pub use gate::{LaunchGate, LaunchRequest};

use crate::error::bridge::BridgeError;
use crate::error::capture::CaptureError;
use crate::protocol::{BridgeInit, JobDescriptor};

use common::ErrorLocation;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Closed,
    BridgeConnecting,
    /// Connected; waiting for the endpoint and the microphone.
    BridgeOpen,
    Streaming,
}

/// One action actually performed during teardown, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    StopTracks,
    DisconnectGraph,
    CloseHandshake,
    ClearPending,
}

pub struct LiveAudioBridge {
    phase: BridgePhase,
    bridge_id: u64,
    gate: LaunchGate,
    connection: Option<BridgeConnection>,
    device: Option<Box<dyn CaptureDevice>>,
    blocks: Option<mpsc::Receiver<Vec<f32>>>,
    pump: Option<JoinHandle<()>>,
}

impl Default for LiveAudioBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveAudioBridge {
    pub fn new() -> Self {
        Self {
            phase: BridgePhase::Closed,
            bridge_id: 0,
            gate: LaunchGate::default(),
            connection: None,
            device: None,
            blocks: None,
            pump: None,
        }
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != BridgePhase::Closed
    }

    pub fn bridge_id(&self) -> u64 {
        self.bridge_id
    }

    pub fn gate(&self) -> &LaunchGate {
        &self.gate
    }

    /// Whether a microphone device is still held and running.
    pub fn has_live_device(&self) -> bool {
        self.device.as_ref().is_some_and(|device| device.is_active())
    }

    /// Start a session for `job`. Returns the id its events will carry.
    pub fn begin(&mut self, job: JobDescriptor) -> Result<u64, BridgeError> {
        if self.phase != BridgePhase::Closed {
            return Err(BridgeError::Busy {
                message: format!("Bridge already {:?}", self.phase),
                location: ErrorLocation::here(),
            });
        }

        self.bridge_id += 1;
        self.gate.arm(job);
        self.phase = BridgePhase::BridgeConnecting;
        info!("Bridge #{} connecting", self.bridge_id);
        Ok(self.bridge_id)
    }

    pub fn attach(&mut self, connection: BridgeConnection) {
        self.connection = Some(connection);
    }

    /// Returns true when the microphone should now be acquired.
    pub fn on_open(&mut self, bridge_id: u64) -> bool {
        if self.is_stale(bridge_id) || self.phase != BridgePhase::BridgeConnecting {
            return false;
        }
        self.phase = BridgePhase::BridgeOpen;
        debug!("Bridge #{bridge_id} open, acquiring microphone");
        true
    }

    pub fn on_init(&mut self, bridge_id: u64, init: BridgeInit) -> Option<LaunchRequest> {
        if self.is_stale(bridge_id) || self.phase == BridgePhase::Closed {
            return None;
        }
        self.gate.offer_endpoint(init.writer_socket)
    }

    /// Take ownership of an acquired microphone. A stream for a stale or closed
    /// session is stopped on the spot.
    pub fn on_microphone_ready(
        &mut self,
        bridge_id: u64,
        mut stream: CaptureStream,
    ) -> Option<LaunchRequest> {
        if self.is_stale(bridge_id) || self.phase == BridgePhase::Closed {
            debug!("Releasing microphone acquired for closed bridge #{bridge_id}");
            stream.device.stop();
            return None;
        }

        self.device = Some(stream.device);
        self.blocks = Some(stream.blocks);
        info!("Bridge #{bridge_id} microphone ready");
        self.gate.offer_microphone()
    }

    pub fn on_capture_failed(
        &mut self,
        bridge_id: u64,
        error: &CaptureError,
    ) -> Option<Vec<TeardownStep>> {
        if self.is_stale(bridge_id) || self.phase == BridgePhase::Closed {
            return None;
        }
        warn!("Bridge #{bridge_id} capture failed: {error}");
        Some(self.teardown())
    }

    /// The bridge connection ended on its own.
    pub fn on_connection_closed(&mut self, bridge_id: u64) -> Option<Vec<TeardownStep>> {
        if self.is_stale(bridge_id) || self.phase == BridgePhase::Closed {
            return None;
        }
        info!("Bridge #{bridge_id} connection closed");
        Some(self.teardown())
    }

    /// Pump captured blocks into the bridge connection.
    pub fn start_streaming(&mut self) -> Result<(), BridgeError> {
        let sink = self
            .connection
            .as_ref()
            .filter(|connection| connection.is_open())
            .and_then(BridgeConnection::pcm_sink)
            .ok_or_else(|| BridgeError::Handshake {
                message: "Bridge connection is not open".to_string(),
                location: ErrorLocation::here(),
            })?;

        let mut blocks = self.blocks.take().ok_or_else(|| BridgeError::Handshake {
            message: "Microphone is not ready".to_string(),
            location: ErrorLocation::here(),
        })?;

        let bridge_id = self.bridge_id;
        self.pump = Some(tokio::spawn(async move {
            let mut sent = 0usize;
            while let Some(block) = blocks.recv().await {
                if let Err(e) = sink.send_block(&block) {
                    debug!("Bridge #{bridge_id} stopped streaming: {e}");
                    break;
                }
                sent += 1;
            }
            debug!("Bridge #{bridge_id} pump finished after {sent} block(s)");
        }));

        self.phase = BridgePhase::Streaming;
        info!("Bridge #{bridge_id} streaming");
        Ok(())
    }

    /// Release everything in order: microphone, processing, handshake, pending launch.
    ///
    /// Returns the steps that had something to do; a second call returns none.
    pub fn teardown(&mut self) -> Vec<TeardownStep> {
        let mut steps = Vec::new();

        if let Some(mut device) = self.device.take() {
            device.stop();
            steps.push(TeardownStep::StopTracks);
        }

        let pump = self.pump.take();
        let blocks = self.blocks.take();
        if pump.is_some() || blocks.is_some() {
            if let Some(pump) = pump {
                pump.abort();
            }
            drop(blocks);
            steps.push(TeardownStep::DisconnectGraph);
        }

        if let Some(mut connection) = self.connection.take()
            && connection.close()
        {
            steps.push(TeardownStep::CloseHandshake);
        }

        if self.gate.has_state() {
            self.gate.clear();
            steps.push(TeardownStep::ClearPending);
        }

        if self.phase != BridgePhase::Closed {
            info!("Bridge #{} closed ({steps:?})", self.bridge_id);
        }
        self.phase = BridgePhase::Closed;
        steps
    }

    fn is_stale(&self, bridge_id: u64) -> bool {
        if bridge_id != self.bridge_id {
            debug!(
                "Ignoring event for bridge #{bridge_id} (current #{})",
                self.bridge_id
            );
            return true;
        }
        false
    }
}

impl Drop for LiveAudioBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}
