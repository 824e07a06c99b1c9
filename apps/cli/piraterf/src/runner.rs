//! One CLI invocation: load state, connect, perform the command, wait for the
//! server's answer, save state.

use crate::cli::{Args, Command, ListTarget};
use crate::console::ConsoleSink;
use crate::error::PirateRfError;

use client_core::bridge::{CaptureConstraints, CommandCapture};
use client_core::config::ClientConfig;
use client_core::execution::ExecutionState;
use client_core::modules::{LIVE_AUDIO_MODULE, ModuleForm, ModuleSpec};
use client_core::protocol::FileCategory;
use client_core::protocol::category::sfx_server_path;
use client_core::recording::{Recording, record};
use client_core::session::{Effect, EffectSink, Session, SessionContext, SessionEvent};
use client_core::snapshot::SnapshotStore;

use common::ErrorLocation;

use std::future::pending;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep, sleep_until};

/// Wait used for the stop sent after Ctrl-C.
const STOP_GRACE: Duration = Duration::from_secs(5);

const IDLE_STATUS: &str = "Idle";

type CliSession = Session<ConsoleSink>;

/// What the current command is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Live,
    /// The server confirmed a start.
    Started,
    /// The server reported the job stopped (or failed).
    Stopped,
    FileReply,
    Listing(FileCategory),
    /// The intro/outro effects are listed.
    Sfx,
    Playlist,
    /// Runs until interrupted or a failure.
    Forever,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Done,
    Failed(String),
}

impl Goal {
    /// Judge progress from the session and the effects seen since the goal was set.
    pub fn check<S: EffectSink>(&self, session: &Session<S>, history: &[Effect]) -> Progress {
        if let Some(message) = history.iter().find_map(failure) {
            return Progress::Failed(message);
        }

        let done = match self {
            Goal::Live => session.is_live(),
            Goal::Started => matches!(
                session.execution().state(),
                ExecutionState::Executing(job) if job.confirmed
            ),
            Goal::Stopped => history
                .iter()
                .any(|effect| matches!(effect, Effect::Status(text) if text == IDLE_STATUS)),
            Goal::FileReply => {
                session.files().pending().is_empty()
                    && history.contains(&Effect::Loading(None))
            }
            Goal::Listing(category) => history.iter().any(|effect| {
                matches!(effect, Effect::ListingLoaded { category: loaded, .. } if loaded == category)
            }),
            Goal::Sfx => history
                .iter()
                .any(|effect| matches!(effect, Effect::SfxLoaded { .. })),
            Goal::Playlist => history.contains(&Effect::Loading(None)),
            Goal::Forever => false,
        };

        if done { Progress::Done } else { Progress::Pending }
    }
}

fn failure(effect: &Effect) -> Option<String> {
    match effect {
        Effect::Error(message) => Some(message.clone()),
        Effect::PlaylistError { message, .. } => Some(message.clone()),
        _ => None,
    }
}

/// Options of `start` applied on top of the remembered form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartOptions {
    pub args: Vec<(String, String)>,
    pub timeout: Option<u64>,
    pub play_once: bool,
    pub intro: Option<String>,
    pub outro: Option<String>,
}

/// Write `options` into `form`. Unknown keys are rejected.
#[track_caller]
pub fn apply_start_options(
    spec: &ModuleSpec,
    form: &mut ModuleForm,
    options: &StartOptions,
) -> Result<(), PirateRfError> {
    for (key, value) in &options.args {
        if spec.field(key).is_none() {
            let known: Vec<&str> = spec.fields.iter().map(|field| field.key).collect();
            return Err(PirateRfError::Cli {
                message: format!(
                    "{} has no argument '{key}' (known: {})",
                    spec.name,
                    known.join(", ")
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        form.set(key.clone(), value.clone());
    }

    if let Some(timeout) = options.timeout {
        form.timeout = timeout.to_string();
    }
    if options.play_once {
        form.play_once = true;
    }
    if options.intro.is_some() || options.outro.is_some() {
        form.intro_outro = true;
        form.intro = options.intro.clone().unwrap_or_default();
        form.outro = options.outro.clone().unwrap_or_default();
    }
    Ok(())
}

/// True when starting with `form` and `options` plays an intro or outro.
pub fn wants_sfx(form: &ModuleForm, options: &StartOptions) -> bool {
    options.intro.is_some()
        || options.outro.is_some()
        || (form.intro_outro && (!form.intro.is_empty() || !form.outro.is_empty()))
}

/// Expand bare effect names given on the command line into server paths.
pub fn resolve_sfx(options: &StartOptions, files_root: &str) -> StartOptions {
    let resolve = |name: &Option<String>| {
        name.as_deref()
            .map(|name| sfx_server_path(files_root, name))
    };
    StartOptions {
        intro: resolve(&options.intro),
        outro: resolve(&options.outro),
        ..options.clone()
    }
}

/// Form values for the live audio module.
pub fn live_options(
    frequency: f64,
    modulation: Option<String>,
    gain: Option<f64>,
    sample_rate: Option<u32>,
) -> StartOptions {
    let mut args = vec![("frequency".to_string(), frequency.to_string())];
    if let Some(modulation) = modulation {
        args.push(("modulation".to_string(), modulation.to_ascii_uppercase()));
    }
    if let Some(gain) = gain {
        args.push(("gain".to_string(), gain.to_string()));
    }
    if let Some(sample_rate) = sample_rate {
        args.push(("sampleRate".to_string(), sample_rate.to_string()));
    }
    StartOptions {
        args,
        ..StartOptions::default()
    }
}

/// Resolve config from file, environment and flags.
pub fn resolve_config(args: &Args) -> Result<ClientConfig, PirateRfError> {
    let config_dir = args
        .config_dir
        .clone()
        .unwrap_or_else(ClientConfig::default_dir);
    let mut config = ClientConfig::load(&config_dir)?;
    config.apply_env_overrides()?;

    if let Some(url) = &args.url {
        config.server.base_url = url.clone();
    }
    if args.debug {
        config.ui.debug = true;
    }
    config.validate()?;
    Ok(config)
}

/// Log directory: `--log-dir`, else the platform data dir.
pub fn log_dir(args: &Args) -> PathBuf {
    args.log_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("piraterf")
            .join("logs")
    })
}

pub async fn run(args: Args) -> Result<(), PirateRfError> {
    let config = resolve_config(&args)?;
    let store = SnapshotStore::new(&config.snapshot_dir());
    let capture = Arc::new(CommandCapture::from_config(&config.audio));
    let wait = Duration::from_secs(args.wait_secs);

    info!("Using server {}", config.server.base_url);
    let (mut session, mut events) = Session::new(
        config,
        SessionContext::default(),
        capture,
        ConsoleSink::stdout(),
    )?;
    session.restore(store.load());

    let result = execute(&mut session, &mut events, args.command, wait).await;

    if let Err(e) = store.save(&session.snapshot()) {
        warn!("Failed to save session state: {e}");
    }
    session.shutdown();
    result
}

async fn execute(
    session: &mut CliSession,
    events: &mut UnboundedReceiver<SessionEvent>,
    command: Command,
    wait: Duration,
) -> Result<(), PirateRfError> {
    match command {
        Command::Start {
            module,
            args,
            timeout,
            play_once,
            intro,
            outro,
        } => {
            let options = StartOptions {
                args,
                timeout,
                play_once,
                intro,
                outro,
            };
            start(session, events, &module, &options, wait).await
        }
        Command::Live {
            frequency,
            modulation,
            gain,
            sample_rate,
        } => {
            let options = live_options(frequency, modulation, gain, sample_rate);
            start(session, events, LIVE_AUDIO_MODULE, &options, wait).await
        }
        Command::Stop => {
            connect(session, events, wait).await?;
            session.sink_mut().clear_history();
            session.stop(true)?;
            wait_for(session, events, Goal::Stopped, Some(wait)).await
        }
        Command::Rename { path, new_name } => {
            connect(session, events, wait).await?;
            let category = open_for_edit(session, &path)?;
            session.sink_mut().clear_history();
            session.rename(category, &new_name)?;
            if session.files().pending().is_empty() {
                info!("{path} already has that name");
                return Ok(());
            }
            wait_for(session, events, Goal::FileReply, Some(wait)).await
        }
        Command::Delete { path } => {
            connect(session, events, wait).await?;
            let category = open_for_edit(session, &path)?;
            session.sink_mut().clear_history();
            session.delete(category)?;
            wait_for(session, events, Goal::FileReply, Some(wait)).await
        }
        Command::List {
            target: ListTarget::Files(category),
        } => {
            session.reload_listing(category, None);
            wait_for(session, events, Goal::Listing(category), Some(wait)).await
        }
        Command::List {
            target: ListTarget::Sfx,
        } => {
            session.reload_sfx();
            wait_for(session, events, Goal::Sfx, Some(wait)).await
        }
        Command::Record { seconds, module } => {
            record_and_upload(session, events, seconds, &module, wait).await
        }
        Command::Upload { file, module } => {
            let category = FileCategory::for_upload_module(&module);
            session.upload(file, &module);
            wait_for(session, events, Goal::Listing(category), Some(wait)).await
        }
        Command::Playlist { name, paths } => {
            connect(session, events, wait).await?;
            session.context_mut().playlist.set_name(name);
            for path in paths {
                session.add_to_playlist(path);
            }
            session.sink_mut().clear_history();
            session.submit_playlist()?;
            wait_for(session, events, Goal::Playlist, Some(wait)).await
        }
        Command::Watch => {
            session.connect();
            match wait_for(session, events, Goal::Forever, None).await {
                Err(PirateRfError::Interrupted { .. }) => Ok(()),
                other => other,
            }
        }
    }
}

async fn start(
    session: &mut CliSession,
    events: &mut UnboundedReceiver<SessionEvent>,
    module: &str,
    options: &StartOptions,
    wait: Duration,
) -> Result<(), PirateRfError> {
    let spec = session.select_module(module)?;
    if spec.playback_options && wants_sfx(&session.context().forms.form(spec), options) {
        // Stale saved effects are dropped once the listing arrives.
        session.sink_mut().clear_history();
        session.reload_sfx();
        wait_for(session, events, Goal::Sfx, Some(wait)).await?;
    }
    let options = resolve_sfx(options, &session.config().server.files_root);
    apply_start_options(spec, session.form_mut()?, &options)?;

    connect(session, events, wait).await?;
    session.sink_mut().clear_history();
    session.start()?;
    wait_for(session, events, Goal::Started, Some(wait)).await?;

    if !spec.live_audio {
        return Ok(());
    }

    // Stream until the job ends or the operator interrupts.
    session.sink_mut().clear_history();
    match wait_for(session, events, Goal::Stopped, None).await {
        Err(PirateRfError::Interrupted { .. }) => {
            info!("Interrupted, stopping live audio");
            session.sink_mut().clear_history();
            session.stop(false)?;
            wait_for(session, events, Goal::Stopped, Some(STOP_GRACE)).await
        }
        other => other,
    }
}

/// Record until Ctrl-C or `seconds`, then upload the WAV tagged with `module`.
async fn record_and_upload(
    session: &mut CliSession,
    events: &mut UnboundedReceiver<SessionEvent>,
    seconds: Option<u64>,
    module: &str,
    wait: Duration,
) -> Result<(), PirateRfError> {
    let constraints = CaptureConstraints::from_config(&session.config().audio);
    let stop = async move {
        let limit = async {
            match seconds {
                Some(seconds) => sleep(Duration::from_secs(seconds)).await,
                None => pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Recording stopped"),
            () = limit => info!("Recording time limit reached"),
        }
    };

    let prompt = match seconds {
        Some(seconds) => format!("Recording for {seconds}s..."),
        None => "Recording... press Ctrl-C to stop".to_string(),
    };
    session.sink_mut().apply(Effect::system(prompt));
    let recording = record(session.capture(), constraints, stop).await?;

    let scratch = tempfile::tempdir().map_err(|e| PirateRfError::Recording {
        message: format!("Failed to create a scratch directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let path = scratch.path().join(Recording::filename(unix_secs));
    recording.save(&path)?;

    let category = FileCategory::for_upload_module(module);
    session.sink_mut().clear_history();
    session.upload(path, module);
    // The scratch directory lives until the upload has been answered.
    wait_for(session, events, Goal::Listing(category), Some(wait)).await
}

/// Select `path` in its browser and open the editor on it.
fn open_for_edit(session: &mut CliSession, path: &str) -> Result<FileCategory, PirateRfError> {
    let category = FileCategory::classify(path);
    session.select_file(category, path);
    session.open_editor(category)?;
    Ok(category)
}

async fn connect(
    session: &mut CliSession,
    events: &mut UnboundedReceiver<SessionEvent>,
    wait: Duration,
) -> Result<(), PirateRfError> {
    if session.is_live() {
        return Ok(());
    }
    session.connect();
    wait_for(session, events, Goal::Live, Some(wait)).await
}

/// Feed session events until `goal` is reached, fails, times out or Ctrl-C.
async fn wait_for(
    session: &mut CliSession,
    events: &mut UnboundedReceiver<SessionEvent>,
    goal: Goal,
    limit: Option<Duration>,
) -> Result<(), PirateRfError> {
    let deadline = limit.map(|limit| Instant::now() + limit);
    debug!("Waiting for {goal:?}");

    loop {
        match goal.check(session, session.sink().history()) {
            Progress::Done => return Ok(()),
            Progress::Failed(message) => {
                return Err(PirateRfError::Server {
                    message,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Progress::Pending => {}
        }

        let timeout = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => session.handle(event),
                None => {
                    return Err(PirateRfError::Core {
                        message: "Session event stream ended".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
            _ = tokio::signal::ctrl_c() => {
                return Err(PirateRfError::Interrupted {
                    message: format!("while waiting for {goal:?}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            _ = timeout => {
                return Err(PirateRfError::Timeout {
                    message: format!("no {goal:?} within {:?}", limit.unwrap_or_default()),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
}

