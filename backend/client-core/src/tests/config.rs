// Unit tests for ClientConfig load/save, overrides, validation and derived URLs

use crate::config::{CaptureStrategy, ClientConfig, ENV_DEBUG, ENV_SAMPLE_RATE, ENV_URL};
use crate::error::config::ConfigError;
use crate::protocol::FileCategory;

use std::collections::HashMap;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

/// **VALUE**: Verifies a missing config file yields the documented defaults.
///
/// **WHY THIS MATTERS**: First run has no config file and must still connect.
///
/// **BUG THIS CATCHES**: Would catch a missing file being reported as an error.
#[test]
fn given_missing_file_when_load_then_defaults() {
    // GIVEN: An empty directory
    let dir = tempfile::tempdir().unwrap();

    // WHEN: Loading
    let config = ClientConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config.server.base_url, "http://127.0.0.1:8080");
    assert_eq!(config.server.control_path, "/ws");
    assert_eq!(config.server.bridge_path, "/wsunix");
    assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
    assert_eq!(config.audio.sample_rate, 48_000);
    assert_eq!(config.audio.block_size, 4096);
    assert_eq!(config.audio.strategy, CaptureStrategy::Buffered);
    assert_eq!(config.layout_settle_delay(), Duration::from_millis(100));
    assert!(!config.ui.debug);
}

/// **VALUE**: Verifies save then load returns the same values.
///
/// **WHY THIS MATTERS**: Saved settings must survive restarts.
///
/// **BUG THIS CATCHES**: Would catch serde renames that do not round-trip through TOML.
#[test]
fn given_saved_config_when_loaded_then_values_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ClientConfig::default();
    config.server.base_url = "https://pi.local".to_string();
    config.audio.strategy = CaptureStrategy::LowLatency;
    config.ui.debug = true;

    config.save(dir.path()).unwrap();
    let loaded = ClientConfig::load(dir.path()).unwrap();

    assert_eq!(loaded.server.base_url, "https://pi.local");
    assert_eq!(loaded.audio.strategy, CaptureStrategy::LowLatency);
    assert!(loaded.ui.debug);
    assert!(!dir.path().join("client.toml.tmp").exists());
}

/// **VALUE**: Verifies a partial file fills every missing field with its default.
///
/// **WHY THIS MATTERS**: Hand-edited configs usually set one or two keys.
///
/// **BUG THIS CATCHES**: Would catch a field without `#[serde(default)]`.
#[test]
fn given_partial_file_when_load_then_missing_fields_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("client.toml"),
        "[audio]\nsample_rate = 22050\n",
    )
    .unwrap();

    let config = ClientConfig::load(dir.path()).unwrap();

    assert_eq!(config.audio.sample_rate, 22_050);
    assert_eq!(config.audio.block_size, 4096);
    assert_eq!(config.server.control_path, "/ws");
}

/// **VALUE**: Verifies unparseable and invalid files are errors.
///
/// **WHY THIS MATTERS**: A broken config should be reported, not silently replaced.
///
/// **BUG THIS CATCHES**: Would catch validation being skipped on load.
#[test]
fn given_bad_files_when_load_then_parse_or_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");

    std::fs::write(&path, "[server\nbase_url = ").unwrap();
    assert!(matches!(
        ClientConfig::load(dir.path()),
        Err(ConfigError::ParseError { .. })
    ));

    std::fs::write(&path, "[server]\nbase_url = \"ftp://pi\"\n").unwrap();
    assert!(matches!(
        ClientConfig::load(dir.path()),
        Err(ConfigError::ValidationError { .. })
    ));

    std::fs::write(&path, "[server]\nreconnect_delay_secs = 0\n").unwrap();
    assert!(matches!(
        ClientConfig::load(dir.path()),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies environment overrides apply and bad values are reported.
///
/// **WHY THIS MATTERS**: The server URL is usually set per deployment through the environment.
///
/// **BUG THIS CATCHES**: Would catch a bad sample rate silently keeping the old value.
#[test]
fn given_overrides_when_applied_then_fields_updated_or_error() {
    let mut config = ClientConfig::default();
    config
        .apply_overrides_from(lookup(&[
            (ENV_URL, "http://10.0.0.2:8080"),
            (ENV_DEBUG, "true"),
            (ENV_SAMPLE_RATE, "44100"),
        ]))
        .unwrap();

    assert_eq!(config.server.base_url, "http://10.0.0.2:8080");
    assert!(config.ui.debug);
    assert_eq!(config.audio.sample_rate, 44_100);

    let error = config
        .apply_overrides_from(lookup(&[(ENV_SAMPLE_RATE, "loud")]))
        .unwrap_err();
    assert!(matches!(error, ConfigError::EnvOverride { .. }));

    let error = config
        .apply_overrides_from(lookup(&[(ENV_SAMPLE_RATE, "0")]))
        .unwrap_err();
    assert!(matches!(error, ConfigError::ValidationError { .. }));
}

/// **VALUE**: Verifies websocket and HTTP URLs are derived from the base URL.
///
/// **WHY THIS MATTERS**: One base URL configures every endpoint.
///
/// **BUG THIS CATCHES**: Would catch `https` mapping to `ws` instead of `wss`.
#[test]
fn given_base_urls_when_deriving_then_schemes_and_paths_match() {
    let mut config = ClientConfig::default();
    assert_eq!(config.control_url().unwrap().as_str(), "ws://127.0.0.1:8080/ws");
    assert_eq!(
        config.bridge_url().unwrap().as_str(),
        "ws://127.0.0.1:8080/wsunix"
    );
    assert_eq!(
        config.listing_url(FileCategory::Image).unwrap().as_str(),
        "http://127.0.0.1:8080/files/images/uploads/"
    );
    assert_eq!(
        config.sfx_listing_url().unwrap().as_str(),
        "http://127.0.0.1:8080/files/audio/sfx/"
    );
    assert_eq!(
        config.upload_url().unwrap().as_str(),
        "http://127.0.0.1:8080/upload"
    );

    config.server.base_url = "https://pi.example".to_string();
    assert_eq!(config.control_url().unwrap().as_str(), "wss://pi.example/ws");
}
