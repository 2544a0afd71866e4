use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::middleware::auth::{AuthUser, Viewer};
use crate::models::Tweet;
use crate::query::{search_tweets, ContentQuery, Ordering, TweetFilter};
use crate::routes::{parse_id, parse_optional_id, ContentInfo, PageParams, SearchParams};
use crate::state::AppState;
use crate::store::Store;

#[post("")]
pub async fn create_tweet(
    data: web::Json<ContentInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let content = data.checked()?;
    let now = Utc::now();
    let tweet = Tweet {
        id: Uuid::new_v4(),
        content,
        owner_id: user.id,
        created_at: now,
        updated_at: now,
    };

    let tweet = state
        .blocking(move |store, _| Ok(store.insert_tweet(&tweet)?))
        .await?;

    Ok(response::created(tweet, "Tweet created successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    user_id: Option<String>,
    query: Option<String>,
}

#[get("")]
pub async fn list_tweets(
    params: web::Query<ListParams>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let params = params.into_inner();
    let owner = parse_optional_id(params.user_id.as_deref(), "userId")?;
    let text = params
        .query
        .map(|query| query.trim().to_string())
        .filter(|query| !query.is_empty());
    let ordering = if text.is_some() {
        Ordering::Relevance
    } else {
        Ordering::Newest
    };

    let query = ContentQuery::<Tweet>::new(TweetFilter { owner, text })
        .viewer(viewer.id())
        .ordering(ordering)
        .page(
            PageParams {
                page: params.page,
                limit: params.limit,
            }
            .request(),
        );

    let tweets = state
        .blocking(move |store, _| Ok(query.paginate(store)?))
        .await?;

    Ok(response::ok(tweets, "Tweets fetched successfully"))
}

#[get("/search")]
pub async fn search(
    params: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let text = params.into_inner().q.unwrap_or_default();

    let hits = state
        .blocking(move |store, _| Ok(search_tweets(store, &text)?))
        .await?;

    Ok(response::ok(hits, "Search results fetched successfully"))
}

#[get("/user/{user_id}")]
pub async fn user_tweets(
    path: web::Path<String>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let user_id = parse_id(&path, "userId")?;
    let query = ContentQuery::<Tweet>::new(TweetFilter {
        owner: Some(user_id),
        text: None,
    })
    .viewer(viewer.id());

    let tweets = state
        .blocking(move |store, _| {
            if store.find_user(user_id)?.is_none() {
                return Err(ApiError::not_found("User does not exist"));
            }
            Ok(query.fetch(store, None)?)
        })
        .await?;

    Ok(response::ok(tweets, "User tweets fetched successfully"))
}

fn owned_tweet(store: &dyn Store, tweet_id: Uuid, user_id: Uuid) -> ApiResult<Tweet> {
    let tweet = store
        .find_tweet(tweet_id)?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    if tweet.owner_id != user_id {
        return Err(ApiError::forbidden(
            "You do not have permission to modify this tweet",
        ));
    }

    Ok(tweet)
}

#[patch("/{tweet_id}")]
pub async fn update_tweet(
    path: web::Path<String>,
    data: web::Json<ContentInfo>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let tweet_id = parse_id(&path, "tweetId")?;
    let content = data.checked()?;
    let user_id = user.id;

    let tweet = state
        .blocking(move |store, _| {
            owned_tweet(store, tweet_id, user_id)?;
            store
                .update_tweet(tweet_id, &content)?
                .ok_or_else(|| ApiError::not_found("Tweet not found"))
        })
        .await?;

    Ok(response::ok(tweet, "Tweet updated successfully"))
}

#[delete("/{tweet_id}")]
pub async fn delete_tweet(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let tweet_id = parse_id(&path, "tweetId")?;
    let user_id = user.id;

    state
        .blocking(move |store, _| {
            owned_tweet(store, tweet_id, user_id)?;
            if !store.delete_tweet(tweet_id)? {
                return Err(ApiError::not_found("Tweet not found"));
            }
            Ok(())
        })
        .await?;

    Ok(response::ok(serde_json::json!({}), "Tweet deleted successfully"))
}
