use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::web;
use futures::TryStreamExt;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// An upload streamed to disk. The temp file is removed when this is dropped.
#[derive(Debug)]
pub struct MultipartFile {
    pub path: PathBuf,
    pub ext: String,
    pub content_type: String,
    pub size: u64,
}

impl Drop for MultipartFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "failed to remove temp upload: {err}");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedMultipart {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, MultipartFile>,
}

impl ParsedMultipart {
    /// A trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<MultipartFile> {
        self.files.remove(name)
    }
}

fn extension_for(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "video/mpeg" => "mpeg",
        "video/mp4" => "mp4",
        "video/mkv" | "video/x-matroska" => "mkv",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => return None,
    };

    Some(ext)
}

/// Content type to serve a stored file with, from its extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "mpeg" => "video/mpeg",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn malformed(err: actix_multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Malformed multipart body: {err}"))
}

fn upload_failed(err: std::io::Error) -> ApiError {
    tracing::error!("failed to buffer upload: {err}");
    ApiError::internal("Failed to store the uploaded file")
}

/// Reads every part of a multipart body. Text parts become fields, a JSON
/// part is merged into the fields, and file parts are streamed into
/// `upload_dir`.
pub async fn attempt_parse_multipart(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> ApiResult<ParsedMultipart> {
    let mut parsed = ParsedMultipart::default();

    while let Some(mut field) = multipart.try_next().await.map_err(malformed)? {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        let is_file = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .is_some();
        let mime = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        if is_file {
            let file = stream_to_disk(&mut field, &mime, upload_dir).await?;
            parsed.files.insert(name, file);
        } else if mime == "application/json" {
            let body = read_text(&mut field).await?;
            let data: serde_json::Value = serde_json::from_str(&body)
                .map_err(|_| ApiError::bad_request("Failed to deserialize JSON"))?;

            if let serde_json::Value::Object(entries) = data {
                for (key, value) in entries {
                    let value = match value {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    };
                    parsed.fields.insert(key, value);
                }
            }
        } else {
            let value = read_text(&mut field).await?;
            parsed.fields.insert(name, value);
        }
    }

    Ok(parsed)
}

async fn read_text(field: &mut Field) -> ApiResult<String> {
    let mut data: Vec<u8> = Vec::new();

    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if data.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(ApiError::bad_request("Form field is too large"));
        }
        data.extend_from_slice(&chunk);
    }

    String::from_utf8(data).map_err(|_| ApiError::bad_request("Form field is not valid UTF-8"))
}

async fn stream_to_disk(field: &mut Field, mime: &str, upload_dir: &Path) -> ApiResult<MultipartFile> {
    let ext = extension_for(mime)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported file type: {mime}")))?;

    let path = upload_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
    let create_path = path.clone();
    let mut file = web::block(move || std::fs::File::create(create_path))
        .await?
        .map_err(upload_failed)?;

    let mut upload = MultipartFile {
        path,
        ext: ext.to_string(),
        content_type: mime.to_string(),
        size: 0,
    };

    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        upload.size += chunk.len() as u64;
        file = web::block(move || file.write_all(&chunk).map(|_| file))
            .await?
            .map_err(upload_failed)?;
    }

    if upload.size == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }

    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mime_types_map_to_extensions() {
        assert_eq!(extension_for("video/mp4"), Some("mp4"));
        assert_eq!(extension_for("image/jpg"), Some("jpeg"));
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn dropping_an_upload_removes_its_temp_file() {
        let path = std::env::temp_dir().join(format!("{}.png", Uuid::new_v4()));
        std::fs::write(&path, b"png").unwrap();

        let upload = MultipartFile {
            path: path.clone(),
            ext: "png".to_string(),
            content_type: "image/png".to_string(),
            size: 3,
        };
        drop(upload);

        assert!(!path.exists());
    }

    #[test]
    fn blank_text_fields_read_as_missing() {
        let mut parsed = ParsedMultipart::default();
        parsed.fields.insert("title".to_string(), "  ".to_string());
        parsed.fields.insert("description".to_string(), " hi ".to_string());

        assert_eq!(parsed.text("title"), None);
        assert_eq!(parsed.text("description"), Some("hi"));
    }
}
