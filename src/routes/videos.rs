use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::media::{MediaKind, StoredMedia};
use crate::helpers::multipart_parsing::attempt_parse_multipart;
use crate::helpers::response;
use crate::middleware::auth::{AuthUser, Viewer};
use crate::models::{is_video_category, Video, VideoChanges, VIDEO_CATEGORIES};
use crate::query::{search_videos, videos_in_order, ContentQuery, Join, VideoFilter};
use crate::routes::{discard_media, parse_id, parse_optional_id, require_media, PageParams, SearchParams};
use crate::state::AppState;
use crate::store::Store;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    user_id: Option<String>,
    category: Option<String>,
}

#[get("")]
pub async fn list_videos(
    params: web::Query<ListParams>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let params = params.into_inner();
    let owner = parse_optional_id(params.user_id.as_deref(), "userId")?;

    let category = match params.category.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(category) if is_video_category(category) => Some(category.to_string()),
        Some(category) => {
            return Err(ApiError::bad_request(format!("Invalid category: {category}")))
        }
    };

    let query = ContentQuery::<Video>::new(VideoFilter {
        owner,
        category,
        published: Some(true),
        ..VideoFilter::default()
    })
    .viewer(viewer.id())
    .page(
        PageParams {
            page: params.page,
            limit: params.limit,
        }
        .request(),
    );

    let videos = state
        .blocking(move |store, _| Ok(query.paginate(store)?))
        .await?;

    Ok(response::ok(videos, "Videos fetched successfully"))
}

#[derive(Validate)]
struct PublishInfo {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(min = 1, max = 5000))]
    description: String,
}

#[post("")]
pub async fn publish_video(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let mut form = attempt_parse_multipart(payload, &state.upload_dir).await?;

    let info = PublishInfo {
        title: form.text("title").unwrap_or_default().to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
    };
    if info.title.is_empty() || info.description.is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }
    info.validate()?;

    let category = form
        .text("category")
        .ok_or_else(|| ApiError::bad_request("Category is required"))?
        .to_string();
    if !is_video_category(&category) {
        return Err(ApiError::bad_request(format!("Invalid category: {category}")));
    }

    let duration = match form.text("duration") {
        Some(raw) => Some(
            raw.parse::<f64>()
                .ok()
                .filter(|duration| duration.is_finite() && *duration >= 0.0)
                .ok_or_else(|| ApiError::bad_request("Invalid duration"))?,
        ),
        None => None,
    };

    let video_file = form
        .take_file("videoFile")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    require_media(&video_file, MediaKind::Video, "Video file")?;

    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;
    require_media(&thumbnail_file, MediaKind::Image, "Thumbnail")?;

    let video_media = state.media.upload(&video_file, MediaKind::Video).await?;
    let thumbnail = match state.media.upload(&thumbnail_file, MediaKind::Image).await {
        Ok(thumbnail) => thumbnail,
        Err(err) => {
            discard_media(&state, vec![(video_media.storage_id, MediaKind::Video)]).await;
            return Err(err.into());
        }
    };

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4(),
        owner_id: user.id,
        title: info.title,
        description: info.description,
        category,
        video_url: video_media.url.clone(),
        video_storage_id: video_media.storage_id.clone(),
        thumbnail_url: thumbnail.url.clone(),
        thumbnail_storage_id: thumbnail.storage_id.clone(),
        duration: duration.or(video_media.duration).unwrap_or(0.0),
        views: 0,
        is_published: true,
        created_at: now,
        updated_at: now,
    };

    let inserted = state
        .blocking(move |store, _| Ok(store.insert_video(&video)?))
        .await;

    match inserted {
        Ok(video) => {
            tracing::info!(video_id = %video.id, owner = %video.owner_id, "video published");
            Ok(response::created(video, "Video published successfully"))
        }
        Err(err) => {
            discard_media(
                &state,
                vec![
                    (video_media.storage_id, MediaKind::Video),
                    (thumbnail.storage_id, MediaKind::Image),
                ],
            )
            .await;
            Err(err)
        }
    }
}

#[get("/search")]
pub async fn search(
    params: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let text = params.into_inner().q.unwrap_or_default();

    let hits = state
        .blocking(move |store, _| Ok(search_videos(store, &text)?))
        .await?;

    Ok(response::ok(hits, "Search results fetched successfully"))
}

#[get("/categories")]
pub async fn categories() -> ApiResult<HttpResponse> {
    Ok(response::ok(VIDEO_CATEGORIES, "Categories fetched successfully"))
}

#[get("/{video_id}")]
pub async fn get_video(
    path: web::Path<String>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let viewer = viewer.id();

    let video = state
        .blocking(move |store, _| {
            let video = videos_in_order(store, &[video_id], viewer, &[Join::Owner, Join::Likes])?
                .pop()
                .filter(|video| video.item.is_published || Some(video.item.owner_id) == viewer)
                .ok_or_else(|| ApiError::not_found("Video not found"))?;

            if let Some(viewer) = viewer {
                store.record_watch(viewer, video_id)?;
            }

            Ok(video)
        })
        .await?;

    Ok(response::ok(video, "Video fetched successfully"))
}

#[derive(Serialize)]
struct ViewCount {
    views: i64,
}

#[post("/{video_id}/view")]
pub async fn add_view(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let user_id = user.id;

    let (views, message) = state
        .blocking(move |store, _| {
            let video = store
                .find_video(video_id)?
                .ok_or_else(|| ApiError::not_found("Video not found"))?;

            if !video.is_published {
                return Err(ApiError::forbidden("Cannot view an unpublished video"));
            }
            if video.owner_id == user_id {
                return Ok((video.views, "Owner view ignored"));
            }

            let views = store
                .increment_views(video_id)?
                .ok_or_else(|| ApiError::not_found("Video not found"))?;

            Ok((views, "View counted"))
        })
        .await?;

    Ok(response::ok(ViewCount { views }, message))
}

/// Finds the video and checks that `user_id` owns it.
fn owned_video(store: &dyn Store, video_id: Uuid, user_id: Uuid) -> ApiResult<Video> {
    let video = store
        .find_video(video_id)?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if video.owner_id != user_id {
        return Err(ApiError::forbidden(
            "You do not have permission to modify this video",
        ));
    }

    Ok(video)
}

#[patch("/{video_id}")]
pub async fn update_video(
    path: web::Path<String>,
    user: AuthUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let user_id = user.id;
    let mut form = attempt_parse_multipart(payload, &state.upload_dir).await?;

    let info = PublishInfo {
        title: form.text("title").unwrap_or_default().to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
    };
    if info.title.is_empty() || info.description.is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }
    info.validate()?;

    let thumbnail_file = form.take_file("thumbnail");
    if let Some(file) = &thumbnail_file {
        require_media(file, MediaKind::Image, "Thumbnail")?;
    }

    state
        .blocking(move |store, _| owned_video(store, video_id, user_id).map(|_| ()))
        .await?;

    let thumbnail: Option<StoredMedia> = match &thumbnail_file {
        Some(file) => Some(state.media.upload(file, MediaKind::Image).await?),
        None => None,
    };

    let changes = VideoChanges {
        title: Some(info.title),
        description: Some(info.description),
        thumbnail: thumbnail.as_ref().map(StoredMedia::media_ref),
        is_published: None,
    };

    let updated = state
        .blocking(move |store, _| {
            let previous = owned_video(store, video_id, user_id)?;
            let video = store
                .update_video(video_id, &changes)?
                .ok_or_else(|| ApiError::not_found("Video not found"))?;

            Ok((video, previous.thumbnail()))
        })
        .await;

    match updated {
        Ok((video, previous_thumbnail)) => {
            if thumbnail.is_some() {
                discard_media(&state, vec![(previous_thumbnail.storage_id, MediaKind::Image)])
                    .await;
            }
            Ok(response::ok(video, "Video updated successfully"))
        }
        Err(err) => {
            if let Some(thumbnail) = thumbnail {
                discard_media(&state, vec![(thumbnail.storage_id, MediaKind::Image)]).await;
            }
            Err(err)
        }
    }
}

#[delete("/{video_id}")]
pub async fn delete_video(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let user_id = user.id;

    let video = state
        .blocking(move |store, _| {
            let video = owned_video(store, video_id, user_id)?;
            if !store.delete_video(video_id)? {
                return Err(ApiError::not_found("Video not found"));
            }
            Ok(video)
        })
        .await?;

    discard_media(
        &state,
        vec![
            (video.video_storage_id.clone(), MediaKind::Video),
            (video.thumbnail_storage_id.clone(), MediaKind::Image),
        ],
    )
    .await;

    tracing::info!(video_id = %video_id, "video deleted");

    Ok(response::ok(serde_json::json!({}), "Video deleted successfully"))
}

#[patch("/toggle/publish/{video_id}")]
pub async fn toggle_publish(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let user_id = user.id;

    let video = state
        .blocking(move |store, _| {
            let video = owned_video(store, video_id, user_id)?;
            let changes = VideoChanges {
                is_published: Some(!video.is_published),
                ..VideoChanges::default()
            };

            store
                .update_video(video_id, &changes)?
                .ok_or_else(|| ApiError::not_found("Video not found"))
        })
        .await?;

    Ok(response::ok(video, "Video publish status toggled successfully"))
}
