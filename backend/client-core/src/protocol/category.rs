use const_format::concatcp;
use serde::{Deserialize, Serialize};

const AUDIO_DIR: &str = "audio";
const IMAGES_DIR: &str = "images";
const DATA_DIR: &str = "data";
const UPLOADS_DIR: &str = "uploads";
const SFX_DIR: &str = "sfx";

pub const AUDIO_UPLOADS_DIR: &str = concatcp!(AUDIO_DIR, "/", UPLOADS_DIR);
pub const AUDIO_SFX_DIR: &str = concatcp!(AUDIO_DIR, "/", SFX_DIR);
pub const IMAGES_UPLOADS_DIR: &str = concatcp!(IMAGES_DIR, "/", UPLOADS_DIR);
pub const DATA_UPLOADS_DIR: &str = concatcp!(DATA_DIR, "/", UPLOADS_DIR);

/// Only files with this extension are offered as intro/outro effects.
pub const SFX_EXTENSION: &str = ".wav";

const AUDIO_SEGMENT: &str = concatcp!("/", AUDIO_DIR, "/");
const IMAGES_SEGMENT: &str = concatcp!("/", IMAGES_DIR, "/");
const DATA_SEGMENT: &str = concatcp!("/", DATA_DIR, "/");

/// Which file browser a server path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Audio,
    Image,
    Data,
}

impl FileCategory {
    pub const ALL: [FileCategory; 3] = [FileCategory::Audio, FileCategory::Image, FileCategory::Data];

    /// Classify a server path by the directory segment it contains.
    ///
    /// Image and data segments are checked first; anything else, including SFX
    /// and paths with no known segment, is audio.
    pub fn classify(path: &str) -> FileCategory {
        if path.contains(IMAGES_SEGMENT) {
            FileCategory::Image
        } else if path.contains(DATA_SEGMENT) {
            FileCategory::Data
        } else if path.contains(AUDIO_SEGMENT) {
            FileCategory::Audio
        } else {
            log::debug!("No category segment in {path}, treating as audio");
            FileCategory::Audio
        }
    }

    /// Upload directory relative to the server's files root.
    pub fn upload_dir(self) -> &'static str {
        match self {
            FileCategory::Audio => AUDIO_UPLOADS_DIR,
            FileCategory::Image => IMAGES_UPLOADS_DIR,
            FileCategory::Data => DATA_UPLOADS_DIR,
        }
    }

    /// Full server-side upload directory, e.g. `./files/images/uploads`.
    pub fn server_dir(self, files_root: &str) -> String {
        format!("{}/{}", files_root.trim_end_matches('/'), self.upload_dir())
    }

    /// True when `path` sits directly inside this category's upload directory.
    pub fn is_upload_path(self, path: &str, files_root: &str) -> bool {
        let prefix = format!("{}/", self.server_dir(files_root));
        path.strip_prefix(&prefix)
            .is_some_and(|name| !name.is_empty() && !name.contains('/'))
    }

    /// Module tag sent with uploads into this category.
    pub fn upload_module(self) -> &'static str {
        match self {
            FileCategory::Audio => "pifmrds",
            FileCategory::Image => "spectrumpaint",
            FileCategory::Data => "fsk",
        }
    }

    /// Category an upload tagged with `module` is filed under by the server.
    pub fn for_upload_module(module: &str) -> FileCategory {
        match module {
            "fsk" | "sendiq" => FileCategory::Data,
            "spectrumpaint" | "pisstv" => FileCategory::Image,
            _ => FileCategory::Audio,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Audio => "audio",
            FileCategory::Image => "image",
            FileCategory::Data => "data",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "audio" => Ok(FileCategory::Audio),
            "image" | "images" => Ok(FileCategory::Image),
            "data" => Ok(FileCategory::Data),
            other => Err(format!("unknown file category: {other}")),
        }
    }
}

/// Server-side SFX directory, e.g. `./files/audio/sfx`.
pub fn sfx_server_dir(files_root: &str) -> String {
    format!("{}/{AUDIO_SFX_DIR}", files_root.trim_end_matches('/'))
}

/// Server path of an SFX file. Values that already are paths are kept as given.
pub fn sfx_server_path(files_root: &str, name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{}/{name}", sfx_server_dir(files_root))
    }
}

/// Final path component.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the final path component, without the trailing slash.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}
