use crate::error::validation::ValidationError;
use crate::file_ops::Selections;
use crate::listing::ListedFile;
use crate::modules::{self, DEFAULT_MODULE, ModuleForms};
use crate::playlist::PlaylistDraft;
use crate::protocol::{FileCategory, JobDescriptor};
use crate::session::effect::{ConnectionState, Effect};
use crate::session::log::OutputLog;

use common::ErrorLocation;

use std::collections::BTreeMap;

use log::debug;

/// All client-side state of one session. The snapshot is derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub module: String,
    pub forms: ModuleForms,
    pub selections: Selections,
    pub playlist: PlaylistDraft,
    pub listings: BTreeMap<FileCategory, Vec<ListedFile>>,
    /// Sound effects, once listed.
    pub sfx: Option<Vec<ListedFile>>,
    pub output: OutputLog,
    pub connection: ConnectionState,
}

impl Default for SessionContext {
    fn default() -> Self {
        let mut forms = ModuleForms::default();
        for spec in modules::CATALOG {
            forms.form_mut(spec);
        }

        Self {
            module: DEFAULT_MODULE.to_string(),
            forms,
            selections: Selections::default(),
            playlist: PlaylistDraft::default(),
            listings: BTreeMap::new(),
            sfx: None,
            output: OutputLog::default(),
            connection: ConnectionState::Connecting,
        }
    }
}

impl SessionContext {
    /// Store a fresh listing and keep the selection pointing at a listed file.
    ///
    /// `preferred` wins when listed; otherwise the current selection is kept if
    /// still listed, else the newest file is chosen.
    pub fn apply_listing(
        &mut self,
        category: FileCategory,
        files: Vec<ListedFile>,
        preferred: Option<&str>,
    ) -> Vec<Effect> {
        let listed = |path: &str| files.iter().any(|file| file.server_path == path);

        let current = self.selections.get(category).map(str::to_string);
        let chosen = preferred
            .filter(|path| listed(*path))
            .map(str::to_string)
            .or_else(|| current.clone().filter(|path| listed(path.as_str())))
            .or_else(|| files.first().map(|file| file.server_path.clone()));

        let mut effects = Vec::new();
        if chosen != current {
            match &chosen {
                Some(path) => self.selections.set(category, path.clone()),
                None => {
                    self.selections.clear(category);
                }
            }
            effects.push(Effect::SelectionChanged {
                category,
                path: chosen,
            });
        }

        effects.insert(
            0,
            Effect::ListingLoaded {
                category,
                files: files.clone(),
            },
        );
        self.listings.insert(category, files);
        effects
    }

    /// Store the sound effect listing and drop intro/outro choices it no longer offers.
    pub fn apply_sfx_listing(&mut self, files: Vec<ListedFile>) -> Vec<Effect> {
        let mut effects = vec![Effect::SfxLoaded {
            files: files.clone(),
        }];
        self.sfx = Some(files);
        effects.extend(self.prune_sfx_choices());
        effects
    }

    /// Blank every intro/outro that is not in the loaded listing.
    ///
    /// Nothing changes before the listing has loaded.
    pub fn prune_sfx_choices(&mut self) -> Vec<Effect> {
        let Some(sfx) = self.sfx.as_ref() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        for spec in modules::CATALOG.iter().filter(|spec| spec.playback_options) {
            let form = self.forms.form_mut(spec);
            for (label, value) in [("intro", &mut form.intro), ("outro", &mut form.outro)] {
                if value.is_empty() || is_listed(sfx, value) {
                    continue;
                }
                debug!("Dropping {} {label} {value}: not listed", spec.name);
                effects.push(Effect::system(format!(
                    "Saved {label} {value} is no longer available"
                )));
                value.clear();
            }
        }
        effects
    }

    /// Intro and outro of `job` must be listed sound effects.
    #[track_caller]
    pub fn check_sfx(&self, job: &JobDescriptor) -> Result<(), ValidationError> {
        for (field, value) in [("intro", &job.intro), ("outro", &job.outro)] {
            let Some(path) = value else {
                continue;
            };

            let message = match &self.sfx {
                None => "sound effects are not loaded".to_string(),
                Some(sfx) if !is_listed(sfx, path) => {
                    format!("'{path}' is not a listed sound effect")
                }
                Some(_) => continue,
            };

            return Err(ValidationError::InvalidField {
                module: job.module_name.clone(),
                field: field.to_string(),
                message,
                location: ErrorLocation::here(),
            });
        }
        Ok(())
    }
}

fn is_listed(files: &[ListedFile], path: &str) -> bool {
    files.iter().any(|file| file.server_path == path)
}
