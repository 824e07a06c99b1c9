//! Command-line arguments for `piraterf`.

use client_core::modules::DEFAULT_MODULE;
use client_core::protocol::FileCategory;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

/// piraterf - control client for a remote rpitx transmitter
#[derive(Parser, Debug)]
#[command(name = "piraterf", author, version, about, long_about = None)]
pub struct Args {
    /// Server base URL, e.g. http://raspberrypi.local:8080
    ///
    /// Overrides the config file and PIRATERF_URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Directory holding client.toml
    #[arg(long, env = "PIRATERF_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory for piraterf.log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log at debug level and mirror every envelope into the output
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Seconds to wait for the server to answer
    #[arg(long, default_value_t = 30)]
    pub wait_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a module with the remembered form values, overridden by --arg
    Start {
        module: String,

        /// Form value as key=value, repeatable
        #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        args: Vec<(String, String)>,

        /// Seconds before the server stops the job
        #[arg(long)]
        timeout: Option<u64>,

        #[arg(long, default_value_t = false)]
        play_once: bool,

        /// Server path played before the main audio
        #[arg(long)]
        intro: Option<String>,

        /// Server path played after the main audio
        #[arg(long)]
        outro: Option<String>,
    },

    /// Stop whatever is running
    Stop,

    /// Broadcast the local microphone until Ctrl-C
    Live {
        /// Carrier frequency in Hz
        #[arg(long)]
        frequency: f64,

        #[arg(long)]
        modulation: Option<String>,

        #[arg(long)]
        gain: Option<f64>,

        #[arg(long)]
        sample_rate: Option<u32>,
    },

    /// Rename an uploaded file
    Rename { path: String, new_name: String },

    /// Delete an uploaded file
    Delete { path: String },

    /// List uploaded files (audio, image or data) or the intro/outro effects (sfx)
    List { target: ListTarget },

    /// Upload a local file, filed by the module it is meant for
    Upload {
        file: PathBuf,

        #[arg(long, default_value = DEFAULT_MODULE)]
        module: String,
    },

    /// Record the microphone and upload the result as audio
    Record {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        seconds: Option<u64>,

        #[arg(long, default_value = DEFAULT_MODULE)]
        module: String,
    },

    /// Create an audio playlist from server paths
    Playlist {
        name: String,

        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print server traffic until Ctrl-C
    Watch,
}

/// What `list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Files(FileCategory),
    Sfx,
}

impl FromStr for ListTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("sfx") {
            return Ok(ListTarget::Sfx);
        }
        value
            .parse()
            .map(ListTarget::Files)
            .map_err(|e: String| format!("{e} (expected audio, image, data or sfx)"))
    }
}

/// Parse `key=value`. The value may itself contain `=`.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
