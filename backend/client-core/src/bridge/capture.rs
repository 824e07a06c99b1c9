use crate::bridge::pcm::decode_f32_le;
use crate::config::{AudioConfig, CaptureStrategy};
use crate::error::capture::CaptureError;

use common::ErrorLocation;

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::future::Future;
use std::io::Error as IoError;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;

/// Render quantum used by the low-latency strategy.
pub const LOW_LATENCY_BLOCK_SIZE: usize = 128;
const CAPTURE_QUEUE_DEPTH: usize = 32;
const BYTES_PER_SAMPLE: usize = 4;

const QUIET_FLAG: &str = "-q";
const TYPE_FLAG: &str = "-t";
const RAW_TYPE: &str = "raw";
const FORMAT_FLAG: &str = "-f";
const FLOAT_FORMAT: &str = "FLOAT_LE";
const CHANNELS_FLAG: &str = "-c";
const RATE_FLAG: &str = "-r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub block_size: usize,
}

impl CaptureConstraints {
    /// Mono at the configured rate, chunked per the configured strategy.
    pub fn from_config(audio: &AudioConfig) -> Self {
        let block_size = match audio.strategy {
            CaptureStrategy::LowLatency => LOW_LATENCY_BLOCK_SIZE,
            CaptureStrategy::Buffered => audio.block_size,
        };

        Self {
            sample_rate: Some(audio.sample_rate),
            channels: Some(1),
            block_size,
        }
    }

    /// Same block size, device defaults for everything else.
    pub fn unconstrained(self) -> Self {
        Self {
            sample_rate: None,
            channels: None,
            block_size: self.block_size,
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.sample_rate.is_some() || self.channels.is_some()
    }
}

/// An acquired input device.
pub trait CaptureDevice: Send {
    /// Release the device. Safe to call more than once.
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// A running capture: the device plus its blocks of f32 samples in [-1, 1].
pub struct CaptureStream {
    pub device: Box<dyn CaptureDevice>,
    pub blocks: mpsc::Receiver<Vec<f32>>,
}

impl Debug for CaptureStream {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("CaptureStream")
            .field("active", &self.device.is_active())
            .finish()
    }
}

pub type CaptureFuture = Pin<Box<dyn Future<Output = Result<CaptureStream, CaptureError>> + Send>>;

/// Source of microphone audio.
pub trait AudioCapture: Send + Sync {
    fn open(&self, constraints: CaptureConstraints) -> CaptureFuture;
}

/// Open the microphone, retrying once without constraints if they are rejected.
pub async fn acquire(
    capture: Arc<dyn AudioCapture>,
    constraints: CaptureConstraints,
) -> Result<CaptureStream, CaptureError> {
    match capture.open(constraints).await {
        Err(e) if e.is_constraint_rejection() && constraints.is_constrained() => {
            warn!("Capture constraints rejected ({e}), retrying with device defaults");
            capture.open(constraints.unconstrained()).await
        }
        result => result,
    }
}

/// Captures through an external recorder writing raw FLOAT_LE to stdout (`arecord` by default).
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
}

impl CommandCapture {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(audio: &AudioConfig) -> Self {
        Self::new(audio.capture_command.clone())
    }

    pub(crate) fn build_command(&self, constraints: &CaptureConstraints) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.arg(QUIET_FLAG)
            .arg(TYPE_FLAG)
            .arg(RAW_TYPE)
            .arg(FORMAT_FLAG)
            .arg(FLOAT_FORMAT);

        if let Some(channels) = constraints.channels {
            cmd.arg(CHANNELS_FLAG).arg(channels.to_string());
        }
        if let Some(rate) = constraints.sample_rate {
            cmd.arg(RATE_FLAG).arg(rate.to_string());
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl AudioCapture for CommandCapture {
    fn open(&self, constraints: CaptureConstraints) -> CaptureFuture {
        let command = self.build_command(&constraints);
        let program = self.program.clone();
        Box::pin(async move { start_recorder(command, &program, constraints.block_size).await })
    }
}

struct RecorderDevice {
    child: TokioChild,
    active: Arc<AtomicBool>,
}

impl CaptureDevice for RecorderDevice {
    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Stopping recorder (PID: {:?})", self.child.id());
        }
        let _ = self.child.start_kill();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

async fn start_recorder(
    mut command: TokioCommand,
    program: &str,
    block_size: usize,
) -> Result<CaptureStream, CaptureError> {
    debug!("Spawning {program} for capture");
    let mut child = command.spawn()?;

    let Some(mut stdout) = child.stdout.take() else {
        let _ = child.start_kill();
        return Err(CaptureError::Io {
            message: format!("{program} has no stdout"),
            location: ErrorLocation::here(),
        });
    };
    let stderr = child.stderr.take();

    // The first block proves the device accepted the parameters.
    let mut first = vec![0u8; block_size * BYTES_PER_SAMPLE];
    if let Err(e) = stdout.read_exact(&mut first).await {
        let diagnostics = match stderr {
            Some(mut stderr) => {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            }
            None => String::new(),
        };
        let _ = child.wait().await;
        return Err(classify_failure(&diagnostics, e));
    }

    if let Some(stderr) = stderr {
        tokio::spawn(log_diagnostics(stderr));
    }

    info!("Capture started (PID: {:?}, {block_size}-sample blocks)", child.id());

    let active = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel(CAPTURE_QUEUE_DEPTH);
    tokio::spawn(read_blocks(stdout, first, block_size, tx, active.clone()));

    Ok(CaptureStream {
        device: Box::new(RecorderDevice { child, active }),
        blocks: rx,
    })
}

async fn read_blocks<R>(
    mut stdout: R,
    first: Vec<u8>,
    block_size: usize,
    blocks: mpsc::Sender<Vec<f32>>,
    active: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = first;
    loop {
        if blocks.send(decode_f32_le(&buffer)).await.is_err() {
            break;
        }

        buffer = vec![0u8; block_size * BYTES_PER_SAMPLE];
        if let Err(e) = stdout.read_exact(&mut buffer).await {
            debug!("Capture stream ended: {e}");
            break;
        }
    }
    active.store(false, Ordering::SeqCst);
}

async fn log_diagnostics<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!("recorder: {line}");
    }
}

/// Map recorder diagnostics onto the capture error taxonomy.
pub(crate) fn classify_failure(diagnostics: &str, error: IoError) -> CaptureError {
    let text = diagnostics.to_ascii_lowercase();
    let message = if diagnostics.trim().is_empty() {
        error.to_string()
    } else {
        diagnostics.trim().to_string()
    };
    let location = ErrorLocation::here();

    if text.contains("channels count")
        || text.contains("sample rate")
        || text.contains("rate is not accurate")
        || text.contains("invalid argument")
    {
        CaptureError::ConstraintsRejected { message, location }
    } else if text.contains("permission denied") {
        CaptureError::PermissionDenied { message, location }
    } else if text.contains("no such file")
        || text.contains("no such device")
        || text.contains("cannot find card")
        || text.contains("audio open error")
    {
        CaptureError::NoDevice { message, location }
    } else {
        CaptureError::Io { message, location }
    }
}
