//! The session driver.
//!
//! [`Session`] owns every state machine plus the live connections, and is fed
//! [`SessionEvent`]s one at a time from a single receiver. Background tasks
//! (control channel, bridge connection, microphone, HTTP calls, timers) never
//! touch state directly: they post an event and the owner of the receiver
//! hands it to [`Session::handle`].

pub mod context;
pub mod effect;
pub mod log;
pub mod sink;

pub use self::context::SessionContext;
pub use self::effect::{ConnectionState, Effect, ExecutionMode, LogEntry, LogKind};
pub use self::log::{MAX_LOG_ENTRIES, OutputLog};
pub use self::sink::{EffectSink, NullSink};

use crate::bridge::{
    AudioCapture, BridgeConnection, BridgeEvent, BridgePhase, BridgeSignal, CaptureConstraints,
    CaptureStream, LaunchRequest, LiveAudioBridge, TeardownStep, acquire,
};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::error::capture::CaptureError;
use crate::error::listing::ListingError;
use crate::error::transport::TransportError;
use crate::error::validation::ValidationError;
use crate::execution::{ExecutionMachine, LayoutMetrics, OutputLayout};
use crate::file_ops::{FileMutationProtocol, RenameRequest};
use crate::listing::{ListedFile, ListingClient, UploadReceipt};
use crate::modules::{self, ModuleForm, ModuleSpec};
use crate::playlist::PlaylistEntry;
use crate::protocol::{
    Command, ExecutionStarted, ExecutionStopped, FileCategory, FileOpKind, FileReply,
    JobDescriptor, OutputLine, PlaylistCreated, PlaylistFailed, Rejection,
};
use crate::router::{EventHandler, Framed, Router};
use crate::snapshot::Snapshot;
use crate::transport::{ChannelEvent, ChannelHandle, ControlChannel};

use common::ErrorLocation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ::log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const NOTICE_DISCONNECTED: &str = "WebSocket disconnected - reconnecting...";
const NOTICE_CONNECT_FAILED: &str = "WebSocket connection failed - retrying...";

/// Everything that can happen to a session from the outside.
#[derive(Debug)]
pub enum SessionEvent {
    Channel(ChannelEvent),
    Bridge(BridgeSignal),
    Capture {
        bridge_id: u64,
        result: Result<CaptureStream, CaptureError>,
    },
    /// The settle delay after entering `Executing` has passed.
    LayoutSettled,
    Listing {
        category: FileCategory,
        select: Option<String>,
        result: Result<Vec<ListedFile>, ListingError>,
    },
    Upload {
        category: FileCategory,
        result: Result<UploadReceipt, ListingError>,
    },
    SfxListing {
        result: Result<Vec<ListedFile>, ListingError>,
    },
}

impl From<ChannelEvent> for SessionEvent {
    fn from(event: ChannelEvent) -> Self {
        SessionEvent::Channel(event)
    }
}

impl From<BridgeSignal> for SessionEvent {
    fn from(signal: BridgeSignal) -> Self {
        SessionEvent::Bridge(signal)
    }
}

pub struct Session<S: EffectSink> {
    config: ClientConfig,
    context: SessionContext,
    router: Router,
    execution: ExecutionMachine,
    files: FileMutationProtocol,
    bridge: LiveAudioBridge,
    capture: Arc<dyn AudioCapture>,
    listing: ListingClient,
    channel: Option<ChannelHandle>,
    forwarder: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    sink: S,
}

impl<S: EffectSink> Session<S> {
    /// Build a session. The returned receiver must be drained into [`Session::handle`].
    pub fn new(
        config: ClientConfig,
        context: SessionContext,
        capture: Arc<dyn AudioCapture>,
        sink: S,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), CoreError> {
        let (events, receiver) = mpsc::unbounded_channel();
        let listing = ListingClient::new(&config)?;

        let debug = config.ui.debug;
        let mut execution = ExecutionMachine::new(
            OutputLayout::new(config.ui.min_output_height),
            config.layout_settle_delay(),
        );
        execution.set_debug(debug);

        let session = Self {
            files: FileMutationProtocol::new(config.server.files_root.clone()),
            router: Router::new(debug),
            execution,
            bridge: LiveAudioBridge::new(),
            capture,
            listing,
            channel: None,
            forwarder: None,
            events,
            sink,
            context,
            config,
        };

        Ok((session, receiver))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn execution(&self) -> &ExecutionMachine {
        &self.execution
    }

    pub fn files(&self) -> &FileMutationProtocol {
        &self.files
    }

    pub fn bridge(&self) -> &LiveAudioBridge {
        &self.bridge
    }

    pub fn capture(&self) -> Arc<dyn AudioCapture> {
        self.capture.clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// A sender for posting events from outside the session.
    pub fn events(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events.clone()
    }

    pub fn is_live(&self) -> bool {
        self.channel.as_ref().is_some_and(ChannelHandle::is_live)
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.router.set_debug(debug);
        self.execution.set_debug(debug);
    }

    /// Start the control channel. Reconnects forever until [`Session::shutdown`].
    pub fn connect(&mut self) {
        let url = match self.config.control_url() {
            Ok(url) => url.to_string(),
            Err(e) => {
                // Handed over as-is; the channel reports it as a failed attempt.
                warn!("Control URL is invalid: {e}");
                format!(
                    "{}{}",
                    self.config.server.base_url, self.config.server.control_path
                )
            }
        };

        info!("Connecting control channel to {url}");
        let (handle, channel_events) = ControlChannel::spawn(url, self.config.reconnect_delay());
        self.attach_channel(handle, channel_events);
    }

    /// Use an already spawned channel, forwarding its events into this session.
    pub fn attach_channel(
        &mut self,
        handle: ChannelHandle,
        mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) {
        self.detach_channel();

        let events = self.events.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = channel_events.recv().await {
                if events.send(SessionEvent::Channel(event)).is_err() {
                    break;
                }
            }
        }));
        self.channel = Some(handle);
        self.apply(Effect::Connection(ConnectionState::Connecting));
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Channel(event) => self.on_channel(event),
            SessionEvent::Bridge(signal) => self.on_bridge(signal),
            SessionEvent::Capture { bridge_id, result } => self.on_capture(bridge_id, result),
            SessionEvent::LayoutSettled => {
                let effects = self.execution.layout_settled();
                self.apply_all(effects);
            }
            SessionEvent::Listing {
                category,
                select,
                result,
            } => self.on_listing(category, select, result),
            SessionEvent::Upload { category, result } => self.on_upload(category, result),
            SessionEvent::SfxListing { result } => self.on_sfx_listing(result),
        }
    }

    pub fn select_module(&mut self, name: &str) -> Result<&'static ModuleSpec, CoreError> {
        let spec = find_module(name)?;
        if self.context.module != spec.name {
            debug!("Selected module {}", spec.name);
            self.context.module = spec.name.to_string();
        }
        Ok(spec)
    }

    /// Form of the selected module.
    pub fn form_mut(&mut self) -> Result<&mut ModuleForm, CoreError> {
        let spec = find_module(&self.context.module)?;
        Ok(self.context.forms.form_mut(spec))
    }

    pub fn select_file(&mut self, category: FileCategory, path: impl Into<String>) {
        let path = path.into();
        self.context.selections.set(category, path.clone());
        self.apply(Effect::SelectionChanged {
            category,
            path: (!path.is_empty()).then_some(path),
        });
    }

    /// Start the selected module with its current form values.
    ///
    /// The live audio module goes through the bridge and launches later, once
    /// the bridge endpoint and the microphone are both ready. A pending live
    /// launch counts as a running job.
    pub fn start(&mut self) -> Result<(), CoreError> {
        let spec = find_module(&self.context.module)?;
        self.execution.ensure_idle()?;
        if self.bridge.is_active() {
            return Err(ValidationError::AlreadyExecuting {
                message: format!("Live audio is {:?}", self.bridge.phase()),
                location: ErrorLocation::here(),
            }
            .into());
        }

        let job = self
            .context
            .forms
            .form(spec)
            .build_job(spec, &self.context.selections)?;
        self.context.check_sfx(&job)?;

        if spec.live_audio {
            self.start_live(job)
        } else {
            self.send_start(job)
        }
    }

    /// Stop the running job and tear down any bridge session.
    ///
    /// While idle nothing is sent unless `force` is set.
    pub fn stop(&mut self, force: bool) -> Result<(), CoreError> {
        let steps = self.bridge.teardown();
        self.report_teardown(steps);

        if !self.execution.request_stop(force) {
            return Ok(());
        }

        let framed = self.router.frame(Command::StopExecution)?;
        self.send(framed)?;
        self.apply(Effect::Status("Stopping...".to_string()));
        Ok(())
    }

    pub fn open_editor(&mut self, category: FileCategory) -> Result<(), CoreError> {
        let effects = self.files.open_editor(category, &self.context.selections)?;
        self.apply_all(effects);
        Ok(())
    }

    pub fn close_editor(&mut self, category: FileCategory) {
        let effects = self.files.close_editor(category);
        self.apply_all(effects);
    }

    pub fn rename(&mut self, category: FileCategory, new_name: &str) -> Result<(), CoreError> {
        let live = self.is_live();
        match self.files.rename(&self.router, category, new_name, live)? {
            RenameRequest::Unchanged(effects) => self.apply_all(effects),
            RenameRequest::Send(framed) => {
                let request_id = framed.envelope.id.clone();
                if let Err(e) = self.send(framed) {
                    self.files.abandon(request_id.as_deref());
                    return Err(e.into());
                }
                self.apply(Effect::Loading(Some(format!(
                    "Renaming to {}...",
                    new_name.trim()
                ))));
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, category: FileCategory) -> Result<(), CoreError> {
        let live = self.is_live();
        let framed = self.files.delete(&self.router, category, live)?;
        let request_id = framed.envelope.id.clone();
        if let Err(e) = self.send(framed) {
            self.files.abandon(request_id.as_deref());
            return Err(e.into());
        }
        self.apply(Effect::Loading(Some("Deleting...".to_string())));
        Ok(())
    }

    pub fn add_to_playlist(&mut self, server_path: impl Into<String>) {
        let effects = self
            .context
            .playlist
            .append(PlaylistEntry::from_server_path(server_path));
        self.apply_all(effects);
    }

    pub fn submit_playlist(&mut self) -> Result<(), CoreError> {
        let live = self.is_live();
        let framed = self.context.playlist.submit(&self.router, live)?;
        if let Err(e) = self.send(framed) {
            self.context.playlist.abandon();
            return Err(e.into());
        }
        self.apply(Effect::Loading(Some("Creating playlist...".to_string())));
        Ok(())
    }

    /// Fetch a category listing in the background. `select` is pre-selected if listed.
    pub fn reload_listing(&self, category: FileCategory, select: Option<String>) {
        debug!("Reloading {category} listing");
        let client = self.listing.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.list(category).await;
            let _ = events.send(SessionEvent::Listing {
                category,
                select,
                result,
            });
        });
    }

    /// Fetch the intro/outro sound effects in the background.
    pub fn reload_sfx(&self) {
        debug!("Reloading sound effects");
        let client = self.listing.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.list_sfx().await;
            let _ = events.send(SessionEvent::SfxListing { result });
        });
    }

    /// Upload a file tagged with `module`; the matching listing reloads afterwards.
    pub fn upload(&mut self, path: PathBuf, module: &str) {
        let category = FileCategory::for_upload_module(module);
        let module = module.to_string();
        info!("Uploading {} as {module} ({category})", path.display());
        self.apply(Effect::Loading(Some(format!(
            "Uploading {}...",
            path.display()
        ))));

        let client = self.listing.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.upload(&path, &module).await;
            let _ = events.send(SessionEvent::Upload { category, result });
        });
    }

    pub fn resize(&mut self, metrics: LayoutMetrics) {
        let effects = self.execution.on_resize(metrics);
        self.apply_all(effects);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.context)
    }

    /// Saved intro/outro choices survive only while they are still listed.
    pub fn restore(&mut self, snapshot: Snapshot) {
        snapshot.apply(&mut self.context);
        let effects = self.context.prune_sfx_choices();
        self.apply_all(effects);
    }

    /// Tear down the bridge and stop reconnecting.
    pub fn shutdown(&mut self) {
        let steps = self.bridge.teardown();
        self.report_teardown(steps);
        self.detach_channel();
        info!("Session shut down");
    }

    fn detach_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.shutdown();
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    fn on_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                info!("Control channel live");
                self.apply(Effect::Connection(ConnectionState::Live));
                self.apply(Effect::ClearNotice);
                self.apply(Effect::system("Connected to server"));
            }
            ChannelEvent::Message(text) => self.on_message(&text),
            ChannelEvent::Closed { was_live } => {
                let notice = if was_live {
                    NOTICE_DISCONNECTED
                } else {
                    NOTICE_CONNECT_FAILED
                };
                self.apply(Effect::Connection(ConnectionState::Disconnected));
                self.apply(Effect::Notice(notice.to_string()));
            }
            ChannelEvent::Failed(reason) => debug!("Control channel attempt failed: {reason}"),
        }
    }

    fn on_message(&mut self, text: &str) {
        let routed = match self.router.decode(text) {
            Ok(routed) => routed,
            Err(e) => {
                warn!("Dropping malformed message: {e}");
                return;
            }
        };

        if let Some(mirror) = routed.mirror {
            self.apply(Effect::log(LogKind::Receive, mirror));
        }
        if let Some(event) = routed.event {
            Router::dispatch(event, self);
        }
    }

    fn on_bridge(&mut self, signal: BridgeSignal) {
        let bridge_id = signal.bridge_id;
        match signal.event {
            BridgeEvent::Open => {
                if !self.bridge.on_open(bridge_id) {
                    return;
                }
                self.apply(Effect::Bridge(BridgePhase::BridgeOpen));
                self.apply(Effect::system("Audio bridge connected, requesting microphone..."));
                self.acquire_microphone(bridge_id);
            }
            BridgeEvent::Init(init) => {
                if let Some(request) = self.bridge.on_init(bridge_id, init) {
                    self.launch(request);
                }
            }
            BridgeEvent::Failed(reason) => {
                if bridge_id == self.bridge.bridge_id() && self.bridge.is_active() {
                    error!("Audio bridge #{bridge_id} failed: {reason}");
                    self.apply(Effect::Error(format!("Audio bridge error: {reason}")));
                }
            }
            BridgeEvent::Closed => {
                if let Some(steps) = self.bridge.on_connection_closed(bridge_id) {
                    self.report_teardown(steps);
                }
            }
        }
    }

    fn acquire_microphone(&self, bridge_id: u64) {
        let capture = self.capture.clone();
        let constraints = CaptureConstraints::from_config(&self.config.audio);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = acquire(capture, constraints).await;
            let _ = events.send(SessionEvent::Capture { bridge_id, result });
        });
    }

    fn on_capture(&mut self, bridge_id: u64, result: Result<CaptureStream, CaptureError>) {
        match result {
            Ok(stream) => {
                let request = self.bridge.on_microphone_ready(bridge_id, stream);
                if self.bridge.has_live_device() {
                    self.apply(Effect::system("Microphone ready"));
                }
                if let Some(request) = request {
                    self.launch(request);
                }
            }
            Err(e) => {
                if let Some(steps) = self.bridge.on_capture_failed(bridge_id, &e) {
                    self.apply(Effect::Error(e.user_message()));
                    self.report_teardown(steps);
                }
            }
        }
    }

    /// Both the bridge endpoint and the microphone are ready: start the remote job.
    fn launch(&mut self, request: LaunchRequest) {
        let LaunchRequest { socket_path, job } = request;
        info!("Launching {} on {socket_path}", job.module_name);

        if let Err(e) = self.send_start(job) {
            error!("Failed to launch live audio job: {e}");
            self.apply(Effect::Error(format!("Failed to start live audio: {e}")));
            let steps = self.bridge.teardown();
            self.report_teardown(steps);
            return;
        }

        match self.bridge.start_streaming() {
            Ok(()) => {
                self.apply(Effect::Bridge(BridgePhase::Streaming));
                self.apply(Effect::system(format!(
                    "Streaming microphone audio to {socket_path}"
                )));
            }
            Err(e) => {
                error!("Failed to stream live audio: {e}");
                self.apply(Effect::Error(format!("Failed to stream live audio: {e}")));
                if let Err(e) = self.stop(true) {
                    warn!("Failed to stop live audio job: {e}");
                }
            }
        }
    }

    fn start_live(&mut self, job: JobDescriptor) -> Result<(), CoreError> {
        if !self.is_live() {
            return Err(not_live().into());
        }

        let url = self.config.bridge_url()?;
        let bridge_id = self.bridge.begin(job)?;
        let connection = BridgeConnection::connect(url, bridge_id, self.events.clone());
        self.bridge.attach(connection);

        self.apply(Effect::Bridge(BridgePhase::BridgeConnecting));
        self.apply(Effect::system("Connecting audio bridge..."));
        Ok(())
    }

    fn send_start(&mut self, job: JobDescriptor) -> Result<(), CoreError> {
        self.execution.ensure_idle()?;
        let framed = self.router.frame(Command::StartExecution(job.clone()))?;
        self.send(framed)?;
        let effects = self.execution.request_start(&job)?;
        self.apply_all(effects);
        Ok(())
    }

    fn send(&mut self, framed: Framed) -> Result<(), TransportError> {
        let channel = self.channel.as_ref().ok_or_else(not_live)?;
        channel.send_text(framed.text)?;
        if let Some(mirror) = framed.mirror {
            self.apply(Effect::log(LogKind::Send, mirror));
        }
        Ok(())
    }

    fn on_listing(
        &mut self,
        category: FileCategory,
        select: Option<String>,
        result: Result<Vec<ListedFile>, ListingError>,
    ) {
        match result {
            Ok(files) => {
                debug!("Loaded {} {category} file(s)", files.len());
                let effects = self
                    .context
                    .apply_listing(category, files, select.as_deref());
                self.apply_all(effects);
            }
            Err(e) => {
                warn!("Failed to load {category} files: {e}");
                self.apply(Effect::Error(format!("Failed to load {category} files: {e}")));
            }
        }
    }

    fn on_sfx_listing(&mut self, result: Result<Vec<ListedFile>, ListingError>) {
        match result {
            Ok(files) => {
                debug!("Loaded {} sound effect(s)", files.len());
                let effects = self.context.apply_sfx_listing(files);
                self.apply_all(effects);
            }
            Err(e) => {
                warn!("Failed to load sound effects: {e}");
                self.apply(Effect::Error(format!("Failed to load SFX files: {e}")));
            }
        }
    }

    fn on_upload(&mut self, category: FileCategory, result: Result<UploadReceipt, ListingError>) {
        self.apply(Effect::Loading(None));
        match result {
            Ok(receipt) => {
                let path = receipt.server_path(category, self.listing.files_root());
                info!("Uploaded {} to {path}", receipt.original_filename);
                self.apply(Effect::system(format!(
                    "File uploaded: {}",
                    receipt.original_filename
                )));
                self.apply(Effect::ReloadListing {
                    category,
                    select: Some(path),
                });
            }
            Err(e) => {
                warn!("Upload failed: {e}");
                self.apply(Effect::Error(format!("Upload failed: {e}")));
            }
        }
    }

    fn report_teardown(&mut self, steps: Vec<TeardownStep>) {
        if steps.is_empty() {
            return;
        }
        debug!("Bridge teardown: {steps:?}");
        self.apply(Effect::Bridge(BridgePhase::Closed));
        self.apply(Effect::system("Audio bridge closed"));
    }

    fn schedule_layout(&self, delay: Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::LayoutSettled);
        });
    }

    fn apply_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.apply(effect);
        }
    }

    /// Record what the session itself tracks, then hand the effect on.
    fn apply(&mut self, effect: Effect) {
        match &effect {
            Effect::Log(entry) => self.context.output.push(entry.clone()),
            Effect::Connection(state) => self.context.connection = *state,
            Effect::ScheduleLayout(delay) => self.schedule_layout(*delay),
            Effect::ReloadListing { category, select } => {
                self.reload_listing(*category, select.clone())
            }
            _ => {}
        }
        self.sink.apply(effect);
    }
}

impl<S: EffectSink> EventHandler for Session<S> {
    fn execution_started(&mut self, event: ExecutionStarted) {
        let effects = self.execution.on_started(&event);
        self.apply_all(effects);
    }

    fn execution_stopped(&mut self, event: ExecutionStopped) {
        let steps = self.bridge.teardown();
        self.report_teardown(steps);
        let effects = self.execution.on_stopped(&event);
        self.apply_all(effects);
    }

    fn execution_error(&mut self, rejection: Rejection) {
        let steps = self.bridge.teardown();
        self.report_teardown(steps);
        let effects = self.execution.on_error(&rejection);
        self.apply_all(effects);
    }

    fn output_line(&mut self, line: OutputLine) {
        self.apply(Effect::output(line.render()));
    }

    fn file_reply(&mut self, reply: FileReply) {
        if reply.outcome.is_ok() {
            match (reply.kind, reply.new_name.as_deref()) {
                (FileOpKind::Rename, Some(new_name)) => {
                    let parent = crate::protocol::category::parent_dir(&reply.file_name);
                    let new_path = format!("{parent}/{new_name}");
                    self.context.forms.replace_path(&reply.file_name, &new_path);
                }
                (FileOpKind::Delete, _) => self.context.forms.clear_path(&reply.file_name),
                _ => {}
            }
        }

        let effects = self.files.on_reply(&reply, &mut self.context.selections);
        self.apply_all(effects);
    }

    fn playlist_created(&mut self, event: PlaylistCreated) {
        let effects = self.context.playlist.on_created(&event);
        self.apply_all(effects);
    }

    fn playlist_failed(&mut self, event: PlaylistFailed) {
        let effects = self.context.playlist.on_create_failed(&event);
        self.apply_all(effects);
    }
}

impl<S: EffectSink> Drop for Session<S> {
    fn drop(&mut self) {
        self.detach_channel();
    }
}

#[track_caller]
fn find_module(name: &str) -> Result<&'static ModuleSpec, ValidationError> {
    modules::find(name).ok_or_else(|| ValidationError::UnknownModule {
        module: name.to_string(),
        location: ErrorLocation::here(),
    })
}

#[track_caller]
fn not_live() -> TransportError {
    TransportError::NotLive {
        message: "WebSocket not connected".to_string(),
        location: ErrorLocation::here(),
    }
}
