use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::middleware::auth::{AuthUser, Viewer};
use crate::models::{OwnerProfile, Playlist, Video};
use crate::query::{videos_in_order, Enriched, Join};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::store::Store;

#[derive(Deserialize, Validate)]
pub struct PlaylistInfo {
    #[validate(length(max = 100))]
    name: Option<String>,
    #[validate(length(max = 1000))]
    description: Option<String>,
}

impl PlaylistInfo {
    fn name(&self) -> ApiResult<String> {
        self.validate()?;

        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Playlist name is required"))
    }
}

#[post("")]
pub async fn create_playlist(
    data: web::Json<PlaylistInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let name = data.name()?;
    let now = Utc::now();
    let playlist = Playlist {
        id: Uuid::new_v4(),
        name,
        description: data
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        owner_id: user.id,
        videos: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let playlist = state
        .blocking(move |store, _| Ok(store.insert_playlist(&playlist)?))
        .await?;

    Ok(response::created(playlist, "Playlist created successfully"))
}

#[get("/user")]
pub async fn current_user_playlists(
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let user_id = user.id;
    let playlists = state
        .blocking(move |store, _| Ok(store.playlists_by_owner(user_id)?))
        .await?;

    Ok(response::ok(playlists, "Playlists fetched successfully"))
}

#[get("/user/{user_id}")]
pub async fn user_playlists(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let user_id = parse_id(&path, "userId")?;

    let playlists = state
        .blocking(move |store, _| {
            if store.find_user(user_id)?.is_none() {
                return Err(ApiError::not_found("User does not exist"));
            }
            Ok(store.playlists_by_owner(user_id)?)
        })
        .await?;

    Ok(response::ok(playlists, "User playlists fetched successfully"))
}

fn owned_playlist(store: &dyn Store, playlist_id: Uuid, user_id: Uuid) -> ApiResult<Playlist> {
    let playlist = store
        .find_playlist(playlist_id)?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    if playlist.owner_id != user_id {
        return Err(ApiError::forbidden(
            "You do not have permission to modify this playlist",
        ));
    }

    Ok(playlist)
}

#[derive(Deserialize)]
pub struct PlaylistVideoParams {
    video_id: String,
    playlist_id: String,
}

#[patch("/add/{video_id}/{playlist_id}")]
pub async fn add_video(
    path: web::Path<PlaylistVideoParams>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path.video_id, "videoId")?;
    let playlist_id = parse_id(&path.playlist_id, "playlistId")?;
    let user_id = user.id;

    let (playlist, added) = state
        .blocking(move |store, _| {
            let playlist = owned_playlist(store, playlist_id, user_id)?;
            if store.find_video(video_id)?.is_none() {
                return Err(ApiError::not_found("Video not found"));
            }
            if playlist.videos.contains(&video_id) {
                return Ok((playlist, false));
            }

            let playlist = store
                .add_playlist_video(playlist_id, video_id)?
                .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
            Ok((playlist, true))
        })
        .await?;

    let message = if added {
        "Video added to playlist successfully"
    } else {
        "Video already exists in the playlist"
    };

    Ok(response::ok(playlist, message))
}

#[patch("/remove/{video_id}/{playlist_id}")]
pub async fn remove_video(
    path: web::Path<PlaylistVideoParams>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path.video_id, "videoId")?;
    let playlist_id = parse_id(&path.playlist_id, "playlistId")?;
    let user_id = user.id;

    let playlist = state
        .blocking(move |store, _| {
            owned_playlist(store, playlist_id, user_id)?;
            store
                .remove_playlist_video(playlist_id, video_id)?
                .ok_or_else(|| ApiError::not_found("Playlist not found"))
        })
        .await?;

    Ok(response::ok(playlist, "Video removed from playlist successfully"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistDetail {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    description: String,
    owner: Option<OwnerProfile>,
    videos: Vec<Enriched<Video>>,
    total_videos: usize,
    total_views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[get("/{playlist_id}")]
pub async fn get_playlist(
    path: web::Path<String>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let playlist_id = parse_id(&path, "playlistId")?;
    let viewer = viewer.id();

    let detail = state
        .blocking(move |store, _| {
            let playlist = store
                .find_playlist(playlist_id)?
                .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

            let owner = store.public_profiles(&[playlist.owner_id])?.pop();
            let videos = videos_in_order(store, &playlist.videos, viewer, &[Join::Owner])?;

            Ok(PlaylistDetail {
                id: playlist.id,
                name: playlist.name,
                description: playlist.description,
                owner,
                total_videos: videos.len(),
                total_views: videos.iter().map(|video| video.item.views).sum(),
                videos,
                created_at: playlist.created_at,
                updated_at: playlist.updated_at,
            })
        })
        .await?;

    Ok(response::ok(detail, "Playlist fetched successfully"))
}

#[patch("/{playlist_id}")]
pub async fn update_playlist(
    path: web::Path<String>,
    data: web::Json<PlaylistInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let playlist_id = parse_id(&path, "playlistId")?;
    let name = data.name()?;
    let description = data
        .into_inner()
        .description
        .map(|description| description.trim().to_string());
    let user_id = user.id;

    let playlist = state
        .blocking(move |store, _| {
            let current = owned_playlist(store, playlist_id, user_id)?;
            let description = description.unwrap_or(current.description);

            store
                .update_playlist(playlist_id, &name, &description)?
                .ok_or_else(|| ApiError::not_found("Playlist not found"))
        })
        .await?;

    Ok(response::ok(playlist, "Playlist updated successfully"))
}

#[delete("/{playlist_id}")]
pub async fn delete_playlist(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let playlist_id = parse_id(&path, "playlistId")?;
    let user_id = user.id;

    state
        .blocking(move |store, _| {
            owned_playlist(store, playlist_id, user_id)?;
            if !store.delete_playlist(playlist_id)? {
                return Err(ApiError::not_found("Playlist not found"));
            }
            Ok(())
        })
        .await?;

    Ok(response::ok(serde_json::json!({}), "Playlist deleted successfully"))
}
