use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::middleware::auth::AuthUser;
use crate::models::{Like, LikeTarget};
use crate::query::{videos_in_order, Join};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::store::Store;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeState {
    is_liked: bool,
}

fn target_exists(store: &dyn Store, target: LikeTarget) -> ApiResult<()> {
    let (found, what) = match target {
        LikeTarget::Video(id) => (store.find_video(id)?.is_some(), "Video"),
        LikeTarget::Comment(id) => (store.find_comment(id)?.is_some(), "Comment"),
        LikeTarget::Tweet(id) => (store.find_tweet(id)?.is_some(), "Tweet"),
    };

    if found {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("{what} not found")))
    }
}

/// Removes the user's like on `target` if there is one, adds it otherwise.
/// A concurrent duplicate insert still reports the target as liked.
async fn toggle(state: &AppState, user_id: Uuid, target: LikeTarget) -> ApiResult<HttpResponse> {
    let is_liked = state
        .blocking(move |store, _| {
            target_exists(store, target)?;

            match store.find_like(user_id, target)? {
                Some(like) => {
                    store.delete_like(like.id)?;
                    Ok(false)
                }
                None => {
                    store.insert_like(&Like::new(user_id, target))?;
                    Ok(true)
                }
            }
        })
        .await?;

    let message = if is_liked {
        "Liked successfully"
    } else {
        "Unliked successfully"
    };

    Ok(response::ok(LikeState { is_liked }, message))
}

#[post("/toggle/v/{video_id}")]
pub async fn toggle_video_like(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let video_id = parse_id(&path, "videoId")?;
    toggle(&state, user.id, LikeTarget::Video(video_id)).await
}

#[post("/toggle/c/{comment_id}")]
pub async fn toggle_comment_like(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let comment_id = parse_id(&path, "commentId")?;
    toggle(&state, user.id, LikeTarget::Comment(comment_id)).await
}

#[post("/toggle/t/{tweet_id}")]
pub async fn toggle_tweet_like(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let tweet_id = parse_id(&path, "tweetId")?;
    toggle(&state, user.id, LikeTarget::Tweet(tweet_id)).await
}

#[get("/videos")]
pub async fn liked_videos(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user_id = user.id;

    let videos = state
        .blocking(move |store, _| {
            let ids = store.liked_video_ids(user_id)?;
            Ok(videos_in_order(store, &ids, Some(user_id), &[Join::Owner])?)
        })
        .await?;

    Ok(response::ok(videos, "Liked videos fetched successfully"))
}
