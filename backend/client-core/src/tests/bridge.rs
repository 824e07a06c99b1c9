// Unit tests for the live audio bridge: launch gate, PCM conversion, capture
// error classification and the bridge state machine

use crate::bridge::capture::classify_failure;
use crate::bridge::pcm::{decode_f32_le, encode_block, sample_to_i16};
use crate::bridge::{
    AudioCapture, BridgePhase, CaptureConstraints, CaptureDevice, CaptureFuture, CaptureStream,
    CommandCapture, LaunchGate, LiveAudioBridge, TeardownStep, acquire,
};
use crate::config::{AudioConfig, CaptureStrategy};
use crate::error::capture::CaptureError;
use crate::modules::SOCKET_PATH_ARG;
use crate::protocol::{BridgeInit, JobDescriptor};

use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, json};
use tokio::sync::mpsc;

struct FakeDevice {
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

fn fake_stream() -> (CaptureStream, Arc<AtomicBool>) {
    let active = Arc::new(AtomicBool::new(true));
    let (_tx, rx) = mpsc::channel(4);
    let stream = CaptureStream {
        device: Box::new(FakeDevice {
            active: active.clone(),
        }),
        blocks: rx,
    };
    (stream, active)
}

/// Microphone that refuses constrained opens with a fixed error and records every request.
struct PickyCapture {
    refusal: fn() -> CaptureError,
    requests: Arc<Mutex<Vec<CaptureConstraints>>>,
}

impl PickyCapture {
    fn new(refusal: fn() -> CaptureError) -> Self {
        Self {
            refusal,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<CaptureConstraints> {
        self.requests.lock().unwrap().clone()
    }
}

impl AudioCapture for PickyCapture {
    fn open(&self, constraints: CaptureConstraints) -> CaptureFuture {
        self.requests.lock().unwrap().push(constraints);
        let result = if constraints.is_constrained() {
            Err((self.refusal)())
        } else {
            Ok(fake_stream().0)
        };
        Box::pin(async move { result })
    }
}

fn constraints_rejected() -> CaptureError {
    CaptureError::ConstraintsRejected {
        message: "Channels count non available".to_string(),
        location: common::ErrorLocation::here(),
    }
}

fn permission_denied() -> CaptureError {
    CaptureError::PermissionDenied {
        message: "Permission denied".to_string(),
        location: common::ErrorLocation::here(),
    }
}

fn live_job() -> JobDescriptor {
    let mut args = Map::new();
    args.insert("frequency".to_string(), json!(431000000));
    JobDescriptor::new("audiosock-broadcast", args)
}

fn init(path: &str) -> BridgeInit {
    BridgeInit {
        writer_socket: path.to_string(),
        reader_socket: None,
    }
}

/// **VALUE**: Verifies endpoint-then-microphone fires exactly one launch with the endpoint.
///
/// **WHY THIS MATTERS**: Launching twice starts two transmitters on one socket.
///
/// **BUG THIS CATCHES**: Would catch a gate that fires on each input or never clears.
#[test]
fn given_endpoint_first_when_microphone_ready_then_fires_once() {
    // GIVEN: An armed gate
    let mut gate = LaunchGate::default();
    gate.arm(live_job());

    // WHEN: Endpoint arrives, then the microphone, then the microphone again
    let first = gate.offer_endpoint("/tmp/bridge.sock");
    let second = gate.offer_microphone();
    let third = gate.offer_microphone();

    // THEN: Only the second input fires, with socketPath filled in
    assert!(first.is_none());
    let request = second.expect("launch");
    assert_eq!(request.socket_path, "/tmp/bridge.sock");
    assert_eq!(request.job.args[SOCKET_PATH_ARG], "/tmp/bridge.sock");
    assert!(third.is_none());
    assert!(!gate.is_armed());
}

/// **VALUE**: Verifies microphone-then-endpoint fires exactly one launch with the endpoint.
///
/// **WHY THIS MATTERS**: The two inputs race; either order must behave the same.
///
/// **BUG THIS CATCHES**: Would catch a gate that only handles the endpoint arriving first.
#[test]
fn given_microphone_first_when_endpoint_arrives_then_fires_once() {
    let mut gate = LaunchGate::default();
    gate.arm(live_job());

    assert!(gate.offer_microphone().is_none());
    let request = gate.offer_endpoint("/tmp/late.sock").expect("launch");
    assert_eq!(request.job.args[SOCKET_PATH_ARG], "/tmp/late.sock");
    assert!(gate.offer_endpoint("/tmp/again.sock").is_none());
}

/// **VALUE**: Verifies the sample scaling is asymmetric and clamped.
///
/// **WHY THIS MATTERS**: -1.0 must map to i16::MIN and 1.0 to i16::MAX without overflow.
///
/// **BUG THIS CATCHES**: Would catch a single 32767 or 32768 scale for both signs.
#[test]
fn given_samples_when_converted_then_scaled_per_sign_and_clamped() {
    assert_eq!(sample_to_i16(-1.0), i16::MIN);
    assert_eq!(sample_to_i16(1.0), i16::MAX);
    assert_eq!(sample_to_i16(0.0), 0);
    assert_eq!(sample_to_i16(-0.5), -16384);
    assert_eq!(sample_to_i16(0.5), 16383);
    assert_eq!(sample_to_i16(7.0), i16::MAX);
    assert_eq!(sample_to_i16(-7.0), i16::MIN);
}

/// **VALUE**: Verifies blocks are written as little-endian 16-bit samples.
///
/// **WHY THIS MATTERS**: The remote process reads raw S16_LE.
///
/// **BUG THIS CATCHES**: Would catch big-endian output or a wrong byte count.
#[test]
fn given_block_when_encoded_then_little_endian_i16_bytes() {
    let bytes = encode_block(&[1.0, -1.0, 0.0]);
    assert_eq!(bytes, vec![0xff, 0x7f, 0x00, 0x80, 0x00, 0x00]);

    let raw: Vec<u8> = [0.25f32, -0.75]
        .iter()
        .flat_map(|sample| sample.to_le_bytes())
        .chain([0xaa])
        .collect();
    assert_eq!(decode_f32_le(&raw), vec![0.25, -0.75]);
}

/// **VALUE**: Verifies tearing down twice is clean and leaves no running device.
///
/// **WHY THIS MATTERS**: Stop, remote stop and bridge close can all trigger teardown.
///
/// **BUG THIS CATCHES**: Would catch a second teardown repeating steps or a device left running.
#[test]
fn given_open_bridge_with_microphone_when_torn_down_twice_then_second_is_noop() {
    // GIVEN: A bridge that is open with a microphone attached
    let mut bridge = LiveAudioBridge::new();
    let id = bridge.begin(live_job()).unwrap();
    assert!(bridge.on_open(id));
    let (stream, active) = fake_stream();
    assert!(bridge.on_microphone_ready(id, stream).is_none());
    assert!(bridge.has_live_device());

    // WHEN: Tearing down twice
    let first = bridge.teardown();
    let second = bridge.teardown();

    // THEN: Steps ran in order once, the device is stopped, the bridge is closed
    assert_eq!(
        first,
        vec![
            TeardownStep::StopTracks,
            TeardownStep::DisconnectGraph,
            TeardownStep::ClearPending
        ]
    );
    assert!(second.is_empty());
    assert!(!active.load(Ordering::SeqCst));
    assert!(!bridge.has_live_device());
    assert_eq!(bridge.phase(), BridgePhase::Closed);
}

/// **VALUE**: Verifies init then microphone on the live bridge yields one launch.
///
/// **WHY THIS MATTERS**: This is the gate wired into the bridge's own phases.
///
/// **BUG THIS CATCHES**: Would catch init being ignored before the microphone is ready.
#[test]
fn given_bridge_open_when_init_then_microphone_then_launch_once() {
    let mut bridge = LiveAudioBridge::new();
    let id = bridge.begin(live_job()).unwrap();
    bridge.on_open(id);

    assert!(bridge.on_init(id, init("/tmp/w.sock")).is_none());
    let (stream, _active) = fake_stream();
    let request = bridge.on_microphone_ready(id, stream).expect("launch");

    assert_eq!(request.socket_path, "/tmp/w.sock");
    assert_eq!(bridge.phase(), BridgePhase::BridgeOpen);
}

/// **VALUE**: Verifies events from a previous bridge session are ignored, and late
/// microphones are released.
///
/// **WHY THIS MATTERS**: A slow microphone from a cancelled start must not stay open.
///
/// **BUG THIS CATCHES**: Would catch stale events launching jobs or keeping devices.
#[test]
fn given_stale_bridge_id_when_events_arrive_then_ignored_and_device_released() {
    // GIVEN: A first session torn down and a second started
    let mut bridge = LiveAudioBridge::new();
    let old = bridge.begin(live_job()).unwrap();
    bridge.teardown();
    let current = bridge.begin(live_job()).unwrap();
    assert_ne!(old, current);

    // WHEN: Events for the old session arrive
    let (stream, active) = fake_stream();
    let launched = bridge.on_microphone_ready(old, stream);

    // THEN: Nothing fires and the stale device is stopped
    assert!(launched.is_none());
    assert!(!active.load(Ordering::SeqCst));
    assert!(!bridge.on_open(old));
    assert!(bridge.on_init(old, init("/tmp/old.sock")).is_none());
    assert_eq!(bridge.phase(), BridgePhase::BridgeConnecting);
}

/// **VALUE**: Verifies a second begin is refused while a session is active.
///
/// **WHY THIS MATTERS**: Only one microphone bridge may exist at a time.
///
/// **BUG THIS CATCHES**: Would catch begin silently replacing a running session.
#[test]
fn given_active_bridge_when_begin_again_then_busy() {
    let mut bridge = LiveAudioBridge::new();
    bridge.begin(live_job()).unwrap();
    assert!(bridge.begin(live_job()).is_err());
}

/// **VALUE**: Verifies a capture failure tears down an active session.
///
/// **WHY THIS MATTERS**: Capture errors abort only the bridge, and must leave it `Closed`.
///
/// **BUG THIS CATCHES**: Would catch the pending launch surviving a failed microphone.
#[test]
fn given_connecting_bridge_when_capture_fails_then_closed_and_pending_cleared() {
    let mut bridge = LiveAudioBridge::new();
    let id = bridge.begin(live_job()).unwrap();
    bridge.on_open(id);

    let error = CaptureError::PermissionDenied {
        message: "denied".to_string(),
        location: common::ErrorLocation::here(),
    };
    let steps = bridge.on_capture_failed(id, &error).expect("teardown");

    assert_eq!(steps, vec![TeardownStep::ClearPending]);
    assert_eq!(bridge.phase(), BridgePhase::Closed);
    assert!(!bridge.gate().is_armed());
    assert!(bridge.on_capture_failed(id, &error).is_none());
}

/// **VALUE**: Verifies recorder diagnostics map onto the capture error taxonomy.
///
/// **WHY THIS MATTERS**: Only constraint rejections are retried without constraints.
///
/// **BUG THIS CATCHES**: Would catch permission errors being retried or mislabelled.
#[test]
fn given_recorder_diagnostics_when_classified_then_matching_capture_error() {
    let eof = || IoError::new(ErrorKind::UnexpectedEof, "early eof");

    assert!(classify_failure("arecord: set_params:1339: Channels count non available", eof())
        .is_constraint_rejection());
    assert!(matches!(
        classify_failure("audio open error: Permission denied", eof()),
        CaptureError::PermissionDenied { .. }
    ));
    assert!(matches!(
        classify_failure("main:831: audio open error: No such file or directory", eof()),
        CaptureError::NoDevice { .. }
    ));
    assert!(matches!(
        classify_failure("", eof()),
        CaptureError::Io { .. }
    ));
}

/// **VALUE**: Verifies the recorder is asked for mono float at the configured rate,
/// and unconstrained retries drop both.
///
/// **WHY THIS MATTERS**: The unconstrained retry must really let the device pick.
///
/// **BUG THIS CATCHES**: Would catch `-c`/`-r` passed on the retry.
#[test]
fn given_constraints_when_build_command_then_flags_follow_constraints() {
    let audio = AudioConfig {
        sample_rate: 44_100,
        ..AudioConfig::default()
    };
    let capture = CommandCapture::from_config(&audio);
    let constraints = CaptureConstraints::from_config(&audio);

    let args = |constraints: &CaptureConstraints| -> Vec<String> {
        capture
            .build_command(constraints)
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    };

    assert_eq!(
        args(&constraints),
        vec!["-q", "-t", "raw", "-f", "FLOAT_LE", "-c", "1", "-r", "44100"]
    );
    assert_eq!(
        args(&constraints.unconstrained()),
        vec!["-q", "-t", "raw", "-f", "FLOAT_LE"]
    );
}

/// **VALUE**: Verifies the strategy picks the block size.
///
/// **WHY THIS MATTERS**: Low latency trades throughput for 128-sample blocks.
///
/// **BUG THIS CATCHES**: Would catch the strategy being ignored.
#[test]
fn given_strategies_when_constraints_built_then_block_size_follows() {
    let buffered = AudioConfig::default();
    let low_latency = AudioConfig {
        strategy: CaptureStrategy::LowLatency,
        ..AudioConfig::default()
    };

    assert_eq!(CaptureConstraints::from_config(&buffered).block_size, 4096);
    assert_eq!(CaptureConstraints::from_config(&low_latency).block_size, 128);
    assert!(CaptureConstraints::from_config(&buffered).is_constrained());
}

/// **VALUE**: Verifies a constraint rejection is retried exactly once without constraints.
///
/// **WHY THIS MATTERS**: Many devices only run at their native rate; one retry with device
/// defaults keeps live audio working on them.
///
/// **BUG THIS CATCHES**: Would catch no retry, repeated retries, or a retry that still
/// carries the rejected rate and channel count.
#[tokio::test]
async fn given_constraints_rejected_when_acquired_then_one_unconstrained_retry() {
    // GIVEN: A microphone that refuses any constraint
    let capture = Arc::new(PickyCapture::new(constraints_rejected));
    let constraints = CaptureConstraints::from_config(&AudioConfig::default());

    // WHEN: Acquiring with the configured constraints
    let result = acquire(capture.clone(), constraints).await;

    // THEN: Two opens, the second unconstrained with the same block size
    assert!(result.is_ok());
    let requests = capture.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], constraints);
    assert_eq!(requests[1].sample_rate, None);
    assert_eq!(requests[1].channels, None);
    assert_eq!(requests[1].block_size, constraints.block_size);
}

/// **VALUE**: Verifies other capture failures are not retried.
///
/// **WHY THIS MATTERS**: Dropping constraints cannot fix a denied permission; retrying
/// only delays the error.
///
/// **BUG THIS CATCHES**: Would catch the retry firing for every error kind.
#[tokio::test]
async fn given_permission_denied_when_acquired_then_no_retry() {
    // GIVEN: A microphone the user is not allowed to open
    let capture = Arc::new(PickyCapture::new(permission_denied));
    let constraints = CaptureConstraints::from_config(&AudioConfig::default());

    // WHEN: Acquiring
    let result = acquire(capture.clone(), constraints).await;

    // THEN: One attempt, permission error surfaced
    assert!(matches!(result, Err(CaptureError::PermissionDenied { .. })));
    assert_eq!(capture.requests().len(), 1);
}
