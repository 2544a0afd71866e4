use std::path::PathBuf;

use actix_web::web;
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use thiserror::Error;
use uuid::Uuid;

use crate::helpers::multipart_parsing::MultipartFile;
use crate::models::MediaRef;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage error: {0}")]
    S3(#[from] S3Error),

    #[error("Object storage answered with status {0}")]
    Status(u16),

    #[error("Blocking task failed")]
    Blocking,
}

impl From<actix_web::error::BlockingError> for MediaError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        MediaError::Blocking
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn folder(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub url: String,
    pub storage_id: String,
    /// Seconds, when the backend can tell.
    pub duration: Option<f64>,
}

impl StoredMedia {
    pub fn media_ref(&self) -> MediaRef {
        MediaRef {
            url: self.url.clone(),
            storage_id: self.storage_id.clone(),
        }
    }
}

/// Where uploaded media ends up. Calls are never retried.
#[async_trait(?Send)]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, file: &MultipartFile, kind: MediaKind) -> Result<StoredMedia, MediaError>;
    async fn delete(&self, storage_id: &str, kind: MediaKind) -> Result<(), MediaError>;
}

fn object_key(file: &MultipartFile, kind: MediaKind) -> String {
    format!("{}/{}.{}", kind.folder(), Uuid::new_v4(), file.ext)
}

pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

pub struct S3Storage {
    bucket: Box<Bucket>,
}

impl S3Storage {
    pub fn new(settings: &S3Settings) -> Result<Self, MediaError> {
        let endpoint = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", settings.region));
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint,
        };
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(S3Error::from)?;

        let bucket = Bucket::new(&settings.bucket, region, credentials)?.with_path_style();

        Ok(S3Storage { bucket })
    }
}

#[async_trait(?Send)]
impl MediaStorage for S3Storage {
    async fn upload(&self, file: &MultipartFile, kind: MediaKind) -> Result<StoredMedia, MediaError> {
        let path = file.path.clone();
        let content = web::block(move || std::fs::read(path)).await??;
        let key = object_key(file, kind);

        let response = self
            .bucket
            .put_object_with_content_type(&key, &content, &file.content_type)
            .await?;

        if response.status_code() != 200 {
            return Err(MediaError::Status(response.status_code()));
        }

        tracing::info!(key = %key, bytes = content.len(), "uploaded media to object storage");

        Ok(StoredMedia {
            url: format!("{}/{}", self.bucket.url(), key),
            storage_id: key,
            duration: None,
        })
    }

    async fn delete(&self, storage_id: &str, _kind: MediaKind) -> Result<(), MediaError> {
        self.bucket.delete_object(storage_id).await?;
        Ok(())
    }
}

/// Keeps media on the local filesystem under `root`, served from `public_url`.
pub struct DiskStorage {
    root: PathBuf,
    public_url: String,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        DiskStorage {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait(?Send)]
impl MediaStorage for DiskStorage {
    async fn upload(&self, file: &MultipartFile, kind: MediaKind) -> Result<StoredMedia, MediaError> {
        let key = object_key(file, kind);
        let source = file.path.clone();
        let target = self.root.join(&key);

        web::block(move || {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(source, target)
        })
        .await??;

        Ok(StoredMedia {
            url: format!("{}/{}", self.public_url, key),
            storage_id: key,
            duration: None,
        })
    }

    async fn delete(&self, storage_id: &str, _kind: MediaKind) -> Result<(), MediaError> {
        let target = self.root.join(storage_id);

        match web::block(move || std::fs::remove_file(target)).await? {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn disk_storage_round_trip() {
        let root = std::env::temp_dir().join(format!("media-{}", Uuid::new_v4()));
        let storage = DiskStorage::new(&root, "http://localhost:8000/media/");

        let temp = std::env::temp_dir().join(format!("{}.png", Uuid::new_v4()));
        std::fs::write(&temp, b"not really a png").unwrap();
        let upload = MultipartFile {
            path: temp,
            ext: "png".to_string(),
            content_type: "image/png".to_string(),
            size: 16,
        };

        let stored = storage.upload(&upload, MediaKind::Image).await.unwrap();
        assert!(stored.storage_id.starts_with("images/"));
        assert_eq!(stored.url, format!("http://localhost:8000/media/{}", stored.storage_id));
        assert!(root.join(&stored.storage_id).exists());

        storage.delete(&stored.storage_id, MediaKind::Image).await.unwrap();
        assert!(!root.join(&stored.storage_id).exists());

        storage.delete(&stored.storage_id, MediaKind::Image).await.unwrap();
        let _ = std::fs::remove_dir_all(root);
    }
}
