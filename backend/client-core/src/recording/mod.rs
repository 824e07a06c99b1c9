//! Microphone recordings saved as 16-bit PCM WAV files for upload.

use crate::bridge::pcm::encode_block;
use crate::bridge::{AudioCapture, CaptureConstraints, acquire};
use crate::error::capture::CaptureError;

use common::ErrorLocation;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

/// Rate written to the header when the constraints leave it to the device.
pub const FALLBACK_SAMPLE_RATE: u32 = 48_000;
pub const RECORDING_EXTENSION: &str = ".wav";

const WAV_HEADER_LEN: u32 = 44;
const FMT_CHUNK_LEN: u32 = 16;
const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Recording {
    /// Upload name for a recording made at `unix_secs`.
    pub fn filename(unix_secs: u64) -> String {
        format!("recording_{unix_secs}{RECORDING_EXTENSION}")
    }

    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() as f64 / f64::from(self.channels.max(1));
        Duration::from_secs_f64(frames / f64::from(self.sample_rate.max(1)))
    }

    /// RIFF/WAVE bytes: a 44-byte header followed by little-endian samples.
    pub fn to_wav(&self) -> Vec<u8> {
        let data = encode_block(&self.samples);
        let data_len = u32::try_from(data.len()).unwrap_or(u32::MAX - WAV_HEADER_LEN);
        let block_align = self.channels * BYTES_PER_SAMPLE;
        let byte_rate = self.sample_rate * u32::from(block_align);

        let mut wav = Vec::with_capacity(WAV_HEADER_LEN as usize + data.len());
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(WAV_HEADER_LEN - 8 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        wav.extend_from_slice(&PCM_FORMAT.to_le_bytes());
        wav.extend_from_slice(&self.channels.to_le_bytes());
        wav.extend_from_slice(&self.sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend_from_slice(&data);
        wav
    }

    #[track_caller]
    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        std::fs::write(path, self.to_wav())?;
        debug!("Wrote {:?} of audio to {}", self.duration(), path.display());
        Ok(())
    }
}

/// Capture mono audio until `stop` resolves or the device stops delivering.
///
/// Blocks already queued when `stop` fires are kept.
pub async fn record<F>(
    capture: Arc<dyn AudioCapture>,
    constraints: CaptureConstraints,
    stop: F,
) -> Result<Recording, CaptureError>
where
    F: Future<Output = ()>,
{
    let mut stream = acquire(capture, constraints).await?;
    info!("Recording started");

    let mut samples = Vec::new();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            biased;
            block = stream.blocks.recv() => match block {
                Some(block) => samples.extend(block),
                None => {
                    debug!("Capture ended before the recording was stopped");
                    break;
                }
            },
            () = &mut stop => break,
        }
    }
    stream.device.stop();

    if samples.is_empty() {
        return Err(CaptureError::Io {
            message: "no audio was captured".to_string(),
            location: ErrorLocation::here(),
        });
    }

    let recording = Recording {
        samples,
        sample_rate: constraints.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE),
        channels: 1,
    };
    info!("Recorded {:?}", recording.duration());
    Ok(recording)
}
