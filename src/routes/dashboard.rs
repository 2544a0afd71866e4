use actix_web::{get, web, HttpResponse};
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::helpers::response;
use crate::middleware::auth::AuthUser;
use crate::models::{ChannelStats, LikeKind, Video};
use crate::query::{ContentQuery, Join, Ordering, Selection, VideoFilter};
use crate::state::AppState;

fn own_videos(owner: Uuid) -> VideoFilter {
    VideoFilter {
        owner: Some(owner),
        ..VideoFilter::default()
    }
}

#[get("/stats")]
pub async fn channel_stats(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user_id = user.id;

    let stats = state
        .blocking(move |store, _| {
            let videos = store
                .select_videos(&Selection {
                    filter: own_videos(user_id),
                    ordering: Ordering::Newest,
                    window: None,
                })?
                .rows;

            let ids: Vec<Uuid> = videos.iter().map(|video| video.id).collect();
            let total_likes: i64 = store
                .like_summaries(LikeKind::Video, &ids, None)?
                .values()
                .map(|summary| summary.count)
                .sum();

            Ok(ChannelStats {
                total_subscribers: store.count_subscribers(user_id)?,
                total_videos: videos.len() as i64,
                total_views: videos.iter().map(|video| video.views).sum(),
                total_likes,
            })
        })
        .await?;

    Ok(response::ok(stats, "Channel stats fetched successfully"))
}

#[get("/videos")]
pub async fn channel_videos(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let query = ContentQuery::<Video>::new(own_videos(user.id))
        .viewer(Some(user.id))
        .joins(&[Join::Likes]);

    let videos = state
        .blocking(move |store, _| Ok(query.fetch(store, None)?))
        .await?;

    Ok(response::ok(videos, "Channel videos fetched successfully"))
}
