//! Session snapshot: the persistable part of a [`SessionContext`].
//!
//! Stored as one JSON document under the `piraterf_state` key. Loading never
//! fails: a missing or malformed document, or any malformed field inside it,
//! falls back to the default for that field only.

use crate::error::snapshot::SnapshotError;
use crate::file_ops::Selections;
use crate::modules::{self, DEFAULT_MODULE, FieldKind, ModuleForm, ModuleForms};
use crate::protocol::FileCategory;
use crate::session::SessionContext;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::{Map, Value, json};

pub const SNAPSHOT_KEY: &str = "piraterf_state";

const MODULE_KEY: &str = "modulename";
const SELECTIONS_KEY: &str = "selections";
const TIMEOUT_KEY: &str = "timeout";
const PLAY_ONCE_KEY: &str = "playOnce";
const INTRO_OUTRO_KEY: &str = "introOutroToggled";
const INTRO_KEY: &str = "introSelect";
const OUTRO_KEY: &str = "outroSelect";

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub module: String,
    pub forms: ModuleForms,
    pub selections: Selections,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::capture(&SessionContext::default())
    }
}

impl Snapshot {
    pub fn capture(context: &SessionContext) -> Self {
        Self {
            module: context.module.clone(),
            forms: context.forms.clone(),
            selections: context.selections.clone(),
        }
    }

    /// Restore into `context`. Selections are re-checked when listings load.
    pub fn apply(self, context: &mut SessionContext) {
        context.module = self.module;
        context.forms = self.forms;
        context.selections = self.selections;
    }

    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(MODULE_KEY.to_string(), json!(self.module));

        for spec in modules::CATALOG {
            let form = self.forms.form(spec);
            let mut section = Map::new();
            for (key, value) in &form.values {
                section.insert(key.clone(), json!(value));
            }
            if spec.playback_options || !form.timeout.is_empty() {
                section.insert(TIMEOUT_KEY.to_string(), json!(form.timeout));
            }
            if spec.playback_options {
                section.insert(PLAY_ONCE_KEY.to_string(), json!(form.play_once));
                section.insert(INTRO_OUTRO_KEY.to_string(), json!(form.intro_outro));
                section.insert(INTRO_KEY.to_string(), json!(form.intro));
                section.insert(OUTRO_KEY.to_string(), json!(form.outro));
            }
            root.insert(spec.name.to_string(), Value::Object(section));
        }

        let selections: Map<String, Value> = self
            .selections
            .iter()
            .map(|(category, path)| (category.as_str().to_string(), json!(path)))
            .collect();
        root.insert(SELECTIONS_KEY.to_string(), Value::Object(selections));

        Value::Object(root)
    }

    /// Rebuild from JSON, taking each well-formed field and defaulting the rest.
    pub fn from_value(value: &Value) -> Self {
        let mut snapshot = Snapshot::default();
        let Some(root) = value.as_object() else {
            warn!("Snapshot is not an object, using defaults");
            return snapshot;
        };

        match root.get(MODULE_KEY).and_then(Value::as_str) {
            Some(name) if modules::find(name).is_some() => snapshot.module = name.to_string(),
            Some(name) => warn!("Snapshot names unknown module {name}, using {DEFAULT_MODULE}"),
            None => {}
        }

        for spec in modules::CATALOG {
            if let Some(section) = root.get(spec.name).and_then(Value::as_object) {
                restore_form(snapshot.forms.form_mut(spec), spec, section);
            }
        }

        if let Some(selections) = root.get(SELECTIONS_KEY).and_then(Value::as_object) {
            for category in FileCategory::ALL {
                if let Some(path) = selections.get(category.as_str()).and_then(Value::as_str) {
                    snapshot.selections.set(category, path);
                }
            }
        }

        snapshot
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let envelope = json!({ SNAPSHOT_KEY: self.to_value() });
        serde_json::to_string_pretty(&envelope).map_err(|e| SnapshotError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => match value.get(SNAPSHOT_KEY) {
                Some(state) => Self::from_value(state),
                None => {
                    warn!("Snapshot has no {SNAPSHOT_KEY} key, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Snapshot is not valid JSON ({e}), using defaults");
                Self::default()
            }
        }
    }
}

fn restore_form(form: &mut ModuleForm, spec: &modules::ModuleSpec, section: &Map<String, Value>) {
    for (key, value) in section {
        match key.as_str() {
            TIMEOUT_KEY => {
                if let Some(text) = text_of(value) {
                    form.timeout = text;
                }
            }
            PLAY_ONCE_KEY => {
                if let Some(flag) = value.as_bool() {
                    form.play_once = flag;
                }
            }
            INTRO_OUTRO_KEY => {
                if let Some(flag) = value.as_bool() {
                    form.intro_outro = flag;
                }
            }
            INTRO_KEY => {
                if let Some(text) = value.as_str() {
                    form.intro = text.to_string();
                }
            }
            OUTRO_KEY => {
                if let Some(text) = value.as_str() {
                    form.outro = text.to_string();
                }
            }
            _ => {
                let Some(field) = spec.field(key) else {
                    debug!("Dropping unknown snapshot field {}.{key}", spec.name);
                    continue;
                };
                match (&field.kind, value) {
                    (FieldKind::Flag, Value::Bool(flag)) => form.set_flag(key.clone(), *flag),
                    _ => {
                        // Blank saved values keep the default.
                        if let Some(text) = text_of(value).filter(|text| !text.is_empty()) {
                            form.set(key.clone(), text);
                        }
                    }
                }
            }
        }
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{SNAPSHOT_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Snapshot {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                debug!("Snapshot loaded from {}", self.path.display());
                Snapshot::from_json(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {}, using defaults", self.path.display());
                Snapshot::default()
            }
            Err(e) => {
                warn!("Failed to read snapshot {}: {e}", self.path.display());
                Snapshot::default()
            }
        }
    }

    /// Write via temp file + rename.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let contents = snapshot.to_json()?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| SnapshotError::Write {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).map_err(|e| SnapshotError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| SnapshotError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: self.path.clone(),
            source: e,
        })?;

        info!("Snapshot saved to {}", self.path.display());
        Ok(())
    }
}
