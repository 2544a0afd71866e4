use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::middleware::auth::{AuthUser, Viewer};
use crate::models::Comment;
use crate::query::{CommentFilter, ContentQuery};
use crate::routes::{parse_id, ContentInfo, PageParams};
use crate::state::AppState;
use crate::store::Store;

#[get("/{video_id}")]
pub async fn get_comments(
    path: web::Path<String>,
    params: web::Query<PageParams>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let query = ContentQuery::<Comment>::new(CommentFilter {
        video: Some(video_id),
    })
    .viewer(viewer.id())
    .page(params.request());

    let comments = state
        .blocking(move |store, _| {
            if store.find_video(video_id)?.is_none() {
                return Err(ApiError::not_found("Video not found"));
            }
            Ok(query.paginate(store)?)
        })
        .await?;

    Ok(response::ok(comments, "Comments fetched successfully"))
}

#[post("/{video_id}")]
pub async fn add_comment(
    path: web::Path<String>,
    data: web::Json<ContentInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    let content = data.checked()?;
    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        content,
        owner_id: user.id,
        video_id,
        created_at: now,
        updated_at: now,
    };

    let comment = state
        .blocking(move |store, _| {
            if store.find_video(video_id)?.is_none() {
                return Err(ApiError::not_found("Video not found"));
            }
            Ok(store.insert_comment(&comment)?)
        })
        .await?;

    Ok(response::created(comment, "Comment added successfully"))
}

fn owned_comment(store: &dyn Store, comment_id: Uuid, user_id: Uuid) -> ApiResult<Comment> {
    let comment = store
        .find_comment(comment_id)?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    if comment.owner_id != user_id {
        return Err(ApiError::forbidden(
            "You do not have permission to modify this comment",
        ));
    }

    Ok(comment)
}

#[patch("/c/{comment_id}")]
pub async fn update_comment(
    path: web::Path<String>,
    data: web::Json<ContentInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let comment_id = parse_id(&path, "commentId")?;
    let content = data.checked()?;
    let user_id = user.id;

    let comment = state
        .blocking(move |store, _| {
            owned_comment(store, comment_id, user_id)?;
            store
                .update_comment(comment_id, &content)?
                .ok_or_else(|| ApiError::not_found("Comment not found"))
        })
        .await?;

    Ok(response::ok(comment, "Comment updated successfully"))
}

#[delete("/c/{comment_id}")]
pub async fn delete_comment(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let comment_id = parse_id(&path, "commentId")?;
    let user_id = user.id;

    state
        .blocking(move |store, _| {
            owned_comment(store, comment_id, user_id)?;
            if !store.delete_comment(comment_id)? {
                return Err(ApiError::not_found("Comment not found"));
            }
            Ok(())
        })
        .await?;

    Ok(response::ok(serde_json::json!({}), "Comment deleted successfully"))
}
