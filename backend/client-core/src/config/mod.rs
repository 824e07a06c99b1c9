use crate::error::config::ConfigError;
use crate::protocol::FileCategory;
use crate::protocol::category::AUDIO_SFX_DIR;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "client.toml";
const CONFIG_VERSION: u32 = 1;
const APP_DIR_NAME: &str = "piraterf";
const UPLOAD_ENDPOINT: &str = "/upload";
const FILES_ENDPOINT: &str = "/files";

pub const ENV_URL: &str = "PIRATERF_URL";
pub const ENV_DEBUG: &str = "PIRATERF_DEBUG";
pub const ENV_SAMPLE_RATE: &str = "PIRATERF_SAMPLE_RATE";

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// How captured audio is chunked before it is converted and sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStrategy {
    /// Small fixed render quanta, lowest latency.
    LowLatency,
    /// Blocks of `block_size` samples.
    #[default]
    Buffered,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_control_path")]
    pub control_path: String,
    #[serde(default = "default_bridge_path")]
    pub bridge_path: String,
    #[serde(default = "default_files_root")]
    pub files_root: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            control_path: default_control_path(),
            bridge_path: default_bridge_path(),
            files_root: default_files_root(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default)]
    pub strategy: CaptureStrategy,
    #[serde(default = "default_capture_command")]
    pub capture_command: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            strategy: CaptureStrategy::default(),
            capture_command: default_capture_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_layout_settle_ms")]
    pub layout_settle_ms: u64,
    #[serde(default = "default_min_output_height")]
    pub min_output_height: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            debug: false,
            layout_settle_ms: default_layout_settle_ms(),
            min_output_height: default_min_output_height(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            audio: AudioConfig::default(),
            ui: UiConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_base_url() -> String {
    crate::PIRATERF_SERVER_BASE_URL.to_string()
}
fn default_control_path() -> String {
    "/ws".to_string()
}
fn default_bridge_path() -> String {
    "/wsunix".to_string()
}
fn default_files_root() -> String {
    "./files".to_string()
}
fn default_reconnect_delay_secs() -> u64 {
    3
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_block_size() -> usize {
    4096
}
fn default_capture_command() -> String {
    "arecord".to_string()
}
fn default_layout_settle_ms() -> u64 {
    100
}
fn default_min_output_height() -> u32 {
    150
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ClientConfig {
    /// Load config from {config_dir}/client.toml.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ClientConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/client.toml via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply `PIRATERF_*` overrides from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, CLI, tests).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.server.base_url = url;
        }

        if let Some(value) = lookup(ENV_DEBUG) {
            self.ui.debug = matches!(value.trim(), "1" | "true" | "yes" | "on");
        }

        if let Some(value) = lookup(ENV_SAMPLE_RATE) {
            self.audio.sample_rate =
                value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::EnvOverride {
                        location: ErrorLocation::from(Location::caller()),
                        variable: ENV_SAMPLE_RATE.to_string(),
                        value: value.clone(),
                        reason: e.to_string(),
                    })?;
        }

        self.validate()
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        let url = &self.server.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid URL format: {url}"),
            });
        }

        if self.server.reconnect_delay_secs == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "reconnect_delay_secs must be at least 1".to_string(),
            });
        }

        if self.audio.sample_rate == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "sample_rate must be positive".to_string(),
            });
        }

        if self.audio.block_size == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "block_size must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.server.reconnect_delay_secs)
    }

    pub fn layout_settle_delay(&self) -> Duration {
        Duration::from_millis(self.ui.layout_settle_ms)
    }

    /// WebSocket URL of the control channel (`http` → `ws`, `https` → `wss`).
    pub fn control_url(&self) -> Result<Url, ConfigError> {
        self.websocket_url(&self.server.control_path)
    }

    /// WebSocket URL of the live audio bridge channel.
    pub fn bridge_url(&self) -> Result<Url, ConfigError> {
        self.websocket_url(&self.server.bridge_path)
    }

    /// HTTP URL of the directory index for a file category.
    pub fn listing_url(&self, category: FileCategory) -> Result<Url, ConfigError> {
        self.http_url(&format!("{FILES_ENDPOINT}/{}/", category.upload_dir()))
    }

    /// HTTP URL of the intro/outro sound effect directory.
    pub fn sfx_listing_url(&self) -> Result<Url, ConfigError> {
        self.http_url(&format!("{FILES_ENDPOINT}/{AUDIO_SFX_DIR}/"))
    }

    pub fn upload_url(&self) -> Result<Url, ConfigError> {
        self.http_url(UPLOAD_ENDPOINT)
    }

    /// Directory the session snapshot is stored in.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
        })
    }

    /// Default config directory (`$XDG_CONFIG_HOME/piraterf` or platform equivalent).
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME)
    }

    fn http_url(&self, path: &str) -> Result<Url, ConfigError> {
        let base = Url::parse(&self.server.base_url).map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid base URL {}: {e}", self.server.base_url),
        })?;

        base.join(path).map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid path {path}: {e}"),
        })
    }

    fn websocket_url(&self, path: &str) -> Result<Url, ConfigError> {
        let mut url = self.http_url(path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };

        url.set_scheme(scheme)
            .map_err(|_| ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Cannot use {scheme} scheme for {url}"),
            })?;

        Ok(url)
    }
}
