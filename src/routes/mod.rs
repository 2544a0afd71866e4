use actix_web::web;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::media::MediaKind;
use crate::helpers::multipart_parsing::MultipartFile;
use crate::query::PageRequest;
use crate::state::AppState;

pub mod comments;
pub mod dashboard;
pub mod healthcheck;
pub mod likes;
pub mod media;
pub mod playlists;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;

/// Mounts every resource; the caller wraps this in the `/api/v1` scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(users::register)
            .service(users::login)
            .service(users::logout)
            .service(users::refresh_token)
            .service(users::change_password)
            .service(users::current_user)
            .service(users::update_details)
            .service(users::update_avatar)
            .service(users::update_cover_image)
            .service(users::channel_profile)
            .service(users::watch_history),
    )
    .service(
        web::scope("/videos")
            .service(videos::list_videos)
            .service(videos::publish_video)
            .service(videos::search)
            .service(videos::categories)
            .service(videos::toggle_publish)
            .service(videos::add_view)
            .service(videos::get_video)
            .service(videos::update_video)
            .service(videos::delete_video),
    )
    .service(
        web::scope("/comments")
            .service(comments::update_comment)
            .service(comments::delete_comment)
            .service(comments::get_comments)
            .service(comments::add_comment),
    )
    .service(
        web::scope("/tweets")
            .service(tweets::create_tweet)
            .service(tweets::list_tweets)
            .service(tweets::search)
            .service(tweets::user_tweets)
            .service(tweets::update_tweet)
            .service(tweets::delete_tweet),
    )
    .service(
        web::scope("/likes")
            .service(likes::toggle_video_like)
            .service(likes::toggle_comment_like)
            .service(likes::toggle_tweet_like)
            .service(likes::liked_videos),
    )
    .service(
        web::scope("/subscriptions")
            .service(subscriptions::toggle_subscription)
            .service(subscriptions::channel_subscribers)
            .service(subscriptions::subscribed_channels),
    )
    .service(
        web::scope("/playlist")
            .service(playlists::create_playlist)
            .service(playlists::current_user_playlists)
            .service(playlists::user_playlists)
            .service(playlists::add_video)
            .service(playlists::remove_video)
            .service(playlists::get_playlist)
            .service(playlists::update_playlist)
            .service(playlists::delete_playlist),
    )
    .service(
        web::scope("/dashboard")
            .service(dashboard::channel_stats)
            .service(dashboard::channel_videos),
    )
    .service(healthcheck::healthcheck);
}

pub fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {what}")))
}

/// Absent or blank means no filter; anything else must be a valid id.
pub fn parse_optional_id(raw: Option<&str>, what: &str) -> ApiResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_id(raw, what).map(Some),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ContentInfo {
    #[validate(length(max = 5000))]
    pub content: String,
}

impl ContentInfo {
    /// The trimmed content, rejecting blank input.
    pub fn checked(&self) -> ApiResult<String> {
        self.validate()?;

        let content = self.content.trim();
        if content.is_empty() {
            return Err(ApiError::bad_request("Content is required"));
        }

        Ok(content.to_string())
    }
}

pub fn require_media(file: &MultipartFile, kind: MediaKind, label: &str) -> ApiResult<()> {
    let prefix = match kind {
        MediaKind::Image => "image/",
        MediaKind::Video => "video/",
    };

    if file.content_type.starts_with(prefix) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("{label} has the wrong file type")))
    }
}

/// Removes stored media that is no longer referenced. Failures are logged only.
pub async fn discard_media(state: &AppState, media: Vec<(String, MediaKind)>) {
    for (storage_id, kind) in media {
        if let Err(err) = state.media.delete(&storage_id, kind).await {
            tracing::warn!(storage_id = %storage_id, "failed to delete media: {err}");
        }
    }
}
