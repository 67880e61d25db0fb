//! Avatar storage: a Gobucket object-storage server when one is configured,
//! otherwise the local `uploads/` directory.

use std::{path::PathBuf, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue},
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::config::Config;

pub const AVATAR_BUCKET: &str = "avatars";

/// Local fallback directory and the URL prefix it is served under.
const LOCAL_AVATAR_DIR: &str = "uploads/avatars";
const LOCAL_AVATAR_URL: &str = "/uploads/avatars";

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("request to object storage failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("object storage rejected the upload ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("object storage returned no uploaded image")]
    EmptyResponse,
    #[error("invalid object storage configuration: {0}")]
    Config(String),
    #[error("could not write image to disk: {0}")]
    Io(#[from] std::io::Error),
}

/// An image to store.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes:     Vec<u8>,
    /// Display name of the uploader, recorded as the image author.
    pub author:    String,
}

impl ImageUpload {
    /// Lower-cased file extension, `"bin"` when there is none.
    pub fn extension(&self) -> String {
        PathBuf::from(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase()
    }
}

// ── Gobucket client ──────────────────────────────────────────

#[derive(Clone)]
pub struct BucketClient {
    client:   Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateImageResponse {
    #[serde(default)]
    uploaded_images: Vec<UploadedImage>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    #[serde(alias = "URL")]
    url: String,
}

impl BucketClient {
    pub fn new(base_url: &str, app_key: &str, client_code: &str) -> Result<Self, BucketError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-App-Key",
            HeaderValue::from_str(app_key).map_err(|e| BucketError::Config(e.to_string()))?,
        );
        headers.insert(
            "X-Client-Code",
            HeaderValue::from_str(client_code).map_err(|e| BucketError::Config(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uploads one image into `bucket` and returns its public URL.
    pub async fn create_image(&self, bucket: &str, upload: &ImageUpload) -> Result<String, BucketError> {
        let endpoint = format!("{}/api/bucket/{}/image", self.base_url, bucket);

        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        let form = Form::new()
            .text("author", upload.author.clone())
            .text("caption", format!("Avatar for {}", upload.author))
            .text("name", format!("avatar-{}", upload.author.replace(' ', "-")))
            .text("dateTime", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string())
            .part("file", part);

        let response = self.client.post(&endpoint).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BucketError::Rejected { status: status.as_u16(), body });
        }

        let parsed: CreateImageResponse = response.json().await?;
        parsed
            .uploaded_images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or(BucketError::EmptyResponse)
    }
}

// ── Storage selection ────────────────────────────────────────

#[derive(Clone)]
pub enum AvatarStorage {
    Bucket(BucketClient),
    Local { dir: PathBuf, url_prefix: String },
}

impl AvatarStorage {
    pub fn from_config(config: &Config) -> Result<Self, BucketError> {
        if config.bucket_enabled() {
            tracing::info!(url = %config.gobucket_url, "Avatar uploads go to object storage");
            let client = BucketClient::new(
                &config.gobucket_url,
                &config.gobucket_app_key,
                &config.gobucket_client_code,
            )?;
            Ok(AvatarStorage::Bucket(client))
        } else {
            Ok(Self::local(LOCAL_AVATAR_DIR, LOCAL_AVATAR_URL))
        }
    }

    pub fn local(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        AvatarStorage::Local {
            dir:        dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Stores an avatar and returns the URL to save on the member.
    pub async fn store_avatar(&self, upload: &ImageUpload) -> Result<String, BucketError> {
        match self {
            AvatarStorage::Bucket(client) => client.create_image(AVATAR_BUCKET, upload).await,
            AvatarStorage::Local { dir, url_prefix } => {
                fs::create_dir_all(dir).await?;
                let filename = format!("{}.{}", Uuid::new_v4(), upload.extension());
                fs::write(dir.join(&filename), &upload.bytes).await?;
                Ok(format!("{url_prefix}/{filename}"))
            }
        }
    }
}
