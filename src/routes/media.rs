use std::path::{Component, Path, PathBuf};

use actix_web::{web, HttpResponse};

use crate::errors::{ApiError, ApiResult};
use crate::helpers::multipart_parsing::mime_for_extension;

/// Directory served under `/media` when uploads stay on local disk.
pub struct MediaRoot(pub PathBuf);

pub async fn serve(path: web::Path<String>, root: web::Data<MediaRoot>) -> ApiResult<HttpResponse> {
    let relative = Path::new(path.as_str());
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::bad_request("Invalid media path"));
    }

    let file = root.0.join(relative);
    let content_type = mime_for_extension(
        file.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default(),
    );

    let bytes = web::block(move || std::fs::read(file)).await?;
    match bytes {
        Ok(bytes) => Ok(HttpResponse::Ok().content_type(content_type).body(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("Media not found"))
        }
        Err(err) => {
            tracing::error!("failed to read media: {err}");
            Err(ApiError::internal("Failed to read media"))
        }
    }
}
