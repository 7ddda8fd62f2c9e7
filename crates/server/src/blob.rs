//! Object storage for avatars and message images.
//!
//! Callers hand over bytes and a content type and get back a durable URL.
//! Only that URL is persisted; the bytes never touch the database.

use axum::body::Bytes;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::config::{BlobBackend, Config};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store rejected upload with status {0}")]
    Rejected(reqwest::StatusCode),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("blob store misconfigured: {0}")]
    Config(String),
}

pub enum BlobStore {
    Local(LocalBlobStore),
    Http(HttpBlobStore),
}

impl BlobStore {
    pub fn from_config(config: &Config) -> Result<Self, BlobError> {
        match config.blob_backend {
            BlobBackend::Local => Ok(Self::Local(LocalBlobStore::new(
                &config.upload_dir,
                &config.public_url,
            )?)),
            BlobBackend::Http => {
                if config.blob_endpoint.is_empty() || config.blob_bucket.is_empty() {
                    return Err(BlobError::Config(
                        "BLOB_ENDPOINT and BLOB_BUCKET must be set for the http backend".into(),
                    ));
                }
                let public_url = if config.blob_public_url.is_empty() {
                    format!(
                        "{}/{}",
                        config.blob_endpoint.trim_end_matches('/'),
                        config.blob_bucket
                    )
                } else {
                    config.blob_public_url.clone()
                };
                Ok(Self::Http(HttpBlobStore::new(
                    &config.blob_endpoint,
                    &config.blob_bucket,
                    config.blob_token.clone(),
                    &public_url,
                )?))
            }
        }
    }

    /// Store `data` under `key` and return the URL clients should use.
    pub async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, BlobError> {
        check_key(key)?;
        let url = match self {
            Self::Local(store) => store.put(key, data).await?,
            Self::Http(store) => store.put(key, data, content_type).await?,
        };
        tracing::info!(key, backend = self.name(), "stored blob");
        Ok(url)
    }

    pub fn as_local(&self) -> Option<&LocalBlobStore> {
        match self {
            Self::Local(store) => Some(store),
            Self::Http(_) => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Http(_) => "http",
        }
    }
}

pub struct LocalBlobStore {
    root: PathBuf,
    base_url: Url,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>, public_url: &str) -> Result<Self, BlobError> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            base_url: directory_url(&format!("{}/uploads", public_url.trim_end_matches('/')))?,
        })
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<String, BlobError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(self.base_url.join(key)?.to_string())
    }

    /// Open a stored blob for streaming back to a client.
    pub async fn open(&self, key: &str) -> Result<tokio::fs::File, BlobError> {
        check_key(key)?;
        Ok(tokio::fs::File::open(self.root.join(key)).await?)
    }
}

pub struct HttpBlobStore {
    client: reqwest::Client,
    bucket_url: Url,
    token: Option<String>,
    public_url: Url,
}

impl HttpBlobStore {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        token: Option<String>,
        public_url: &str,
    ) -> Result<Self, BlobError> {
        Ok(Self {
            client: reqwest::Client::new(),
            bucket_url: directory_url(&format!("{}/{}", endpoint.trim_end_matches('/'), bucket))?,
            token,
            public_url: directory_url(public_url)?,
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, BlobError> {
        let mut request = self
            .client
            .put(self.bucket_url.join(key)?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(BlobError::Rejected(response.status()));
        }
        Ok(self.public_url.join(key)?.to_string())
    }
}

/// Build a key like `avatars/<owner>/<uuid>.png` from the uploaded filename.
pub fn object_key(prefix: &str, owner: &str, filename: &str) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e)
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!("{}/{}/{}.{}", prefix, owner, uuid::Uuid::new_v4(), ext)
}

/// Content type for serving a locally stored blob, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, e)| e) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Deterministic generated avatar, used for new users and new groups.
pub fn generated_avatar_url(base_url: &str, style: &str, seed: &str) -> String {
    format!("{}/{}/svg?seed={}", base_url.trim_end_matches('/'), style, seed)
}

fn directory_url(raw: &str) -> Result<Url, BlobError> {
    // Url::join replaces the last segment unless the base ends with a slash
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Ok(Url::parse(&with_slash)?)
}

fn check_key(key: &str) -> Result<(), BlobError> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(BlobError::InvalidKey(key.to_string()))
    }
}
