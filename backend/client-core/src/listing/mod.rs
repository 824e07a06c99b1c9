//! HTTP side of the file browsers: directory listings and uploads.

use crate::config::ClientConfig;
use crate::error::config::ConfigError;
use crate::error::listing::ListingError;
use crate::protocol::FileCategory;
use crate::protocol::category::{SFX_EXTENSION, file_name, sfx_server_dir};

use common::{ErrorLocation, HttpStatusCode};

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;
use std::time::{Duration, SystemTime};

use log::{debug, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const UPLOAD_FILE_FIELD: &str = "file";
const UPLOAD_MODULE_FIELD: &str = "module";
const UPLOAD_SUCCESS_STATUS: &str = "success";

#[derive(Debug, Clone, Deserialize)]
struct DirectoryEntry {
    name: String,
    #[serde(rename = "isDir", default)]
    is_dir: bool,
    #[serde(default)]
    size: Option<u64>,
    #[serde(rename = "modTime", default)]
    mod_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DirectoryListing {
    Index { entries: Vec<DirectoryEntry> },
    Bare(Vec<DirectoryEntry>),
}

/// A file in a category's upload directory, newest first in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub server_path: String,
    pub size: Option<u64>,
    pub mod_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub status: String,
    pub original_filename: String,
    #[serde(default)]
    pub saved_filename: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl UploadReceipt {
    /// Server path of the stored file inside `category`'s upload directory.
    pub fn server_path(&self, category: FileCategory, files_root: &str) -> String {
        let stored = self
            .path
            .as_deref()
            .or(self.saved_filename.as_deref())
            .unwrap_or(&self.original_filename);
        format!("{}/{}", category.server_dir(files_root), file_name(stored))
    }
}

#[derive(Clone)]
pub struct ListingClient {
    client: Client,
    listing_urls: BTreeMap<FileCategory, Url>,
    sfx_url: Url,
    upload_url: Url,
    files_root: String,
}

impl ListingClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ListingError> {
        let listing_urls = FileCategory::ALL
            .iter()
            .map(|category| Ok((*category, config.listing_url(*category)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()
            .map_err(config_error)?;
        let sfx_url = config.sfx_listing_url().map_err(config_error)?;
        let upload_url = config.upload_url().map_err(config_error)?;

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            client,
            listing_urls,
            sfx_url,
            upload_url,
            files_root: config.server.files_root.clone(),
        })
    }

    pub fn files_root(&self) -> &str {
        &self.files_root
    }

    /// Files (not directories) in a category's upload directory, newest first.
    pub async fn list(&self, category: FileCategory) -> Result<Vec<ListedFile>, ListingError> {
        let url = self.listing_url(category)?;
        debug!("Listing {category} files from {url}");
        let server_dir = category.server_dir(&self.files_root);
        self.fetch(url, &server_dir).await
    }

    /// `.wav` files in the sound effect directory, newest first.
    pub async fn list_sfx(&self) -> Result<Vec<ListedFile>, ListingError> {
        debug!("Listing sound effects from {}", self.sfx_url);
        let server_dir = sfx_server_dir(&self.files_root);
        let mut files = self.fetch(self.sfx_url.clone(), &server_dir).await?;
        files.retain(|file| file.name.ends_with(SFX_EXTENSION));
        Ok(files)
    }

    async fn fetch(&self, url: Url, server_dir: &str) -> Result<Vec<ListedFile>, ListingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Server {
                status: HttpStatusCode::from(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let body = response.text().await?;
        let listing: DirectoryListing = serde_json::from_str(&body)?;
        let entries = match listing {
            DirectoryListing::Index { entries } => entries,
            DirectoryListing::Bare(entries) => entries,
        };

        Ok(newest_first(entries, server_dir))
    }

    /// Upload a local file tagged with `module`; the server picks the directory.
    pub async fn upload(&self, path: &Path, module: &str) -> Result<UploadReceipt, ListingError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ListingError::Io {
                message: format!("{} has no file name", path.display()),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Uploading {name} ({} bytes) for {module}", bytes.len());

        let form = Form::new()
            .part(UPLOAD_FILE_FIELD, Part::bytes(bytes).file_name(name))
            .text(UPLOAD_MODULE_FIELD, module.to_string());

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Server {
                status: HttpStatusCode::from(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let body = response.text().await?;
        let receipt: UploadReceipt = serde_json::from_str(&body)?;
        if receipt.status != UPLOAD_SUCCESS_STATUS {
            return Err(ListingError::UploadRejected {
                message: format!("Upload status: {}", receipt.status),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!("Uploaded {}", receipt.original_filename);
        Ok(receipt)
    }

    fn listing_url(&self, category: FileCategory) -> Result<Url, ListingError> {
        self.listing_urls
            .get(&category)
            .cloned()
            .ok_or_else(|| ListingError::UrlParse {
                message: format!("No listing URL for {category}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Drop directories, map names to server paths and sort newest first.
fn newest_first(entries: Vec<DirectoryEntry>, server_dir: &str) -> Vec<ListedFile> {
    let mut files: Vec<(Option<SystemTime>, ListedFile)> = entries
        .into_iter()
        .filter(|entry| !entry.is_dir)
        .map(|entry| {
            let modified = entry.mod_time.as_deref().and_then(parse_mod_time);
            let file = ListedFile {
                server_path: format!("{server_dir}/{}", entry.name),
                name: entry.name,
                size: entry.size,
                mod_time: entry.mod_time,
            };
            (modified, file)
        })
        .collect();

    files.sort_by(|(a_time, a), (b_time, b)| {
        Reverse(a_time)
            .cmp(&Reverse(b_time))
            .then_with(|| a.name.cmp(&b.name))
    });

    files.into_iter().map(|(_, file)| file).collect()
}

fn parse_mod_time(value: &str) -> Option<SystemTime> {
    humantime::parse_rfc3339_weak(value).ok()
}

fn config_error(error: ConfigError) -> ListingError {
    ListingError::UrlParse {
        message: error.to_string(),
        location: ErrorLocation::here(),
    }
}
