use std::collections::HashMap;

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::middleware::auth::AuthUser;
use crate::models::{OwnerProfile, Subscription};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::store::{Store, StoreResult};

#[derive(Serialize)]
struct SubscriptionState {
    subscribed: bool,
}

#[post("/c/{channel_id}")]
pub async fn toggle_subscription(
    path: web::Path<String>,
    user: AuthUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let channel_id = parse_id(&path, "channelId")?;
    let subscriber_id = user.id;

    if channel_id == subscriber_id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }

    let subscribed = state
        .blocking(move |store, _| {
            if store.find_user(channel_id)?.is_none() {
                return Err(ApiError::not_found("Channel does not exist"));
            }

            match store.find_subscription(subscriber_id, channel_id)? {
                Some(subscription) => {
                    store.delete_subscription(subscription.id)?;
                    Ok(false)
                }
                None => {
                    store.insert_subscription(&Subscription {
                        id: Uuid::new_v4(),
                        subscriber_id,
                        channel_id,
                        created_at: Utc::now(),
                    })?;
                    Ok(true)
                }
            }
        })
        .await?;

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };

    Ok(response::ok(SubscriptionState { subscribed }, message))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Subscriber {
    #[serde(rename = "_id")]
    id: Uuid,
    subscriber: Option<OwnerProfile>,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribedChannel {
    #[serde(rename = "_id")]
    id: Uuid,
    channel: Option<OwnerProfile>,
    created_at: DateTime<Utc>,
}

fn profiles(store: &dyn Store, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, OwnerProfile>> {
    Ok(store
        .public_profiles(ids)?
        .into_iter()
        .map(|profile| (profile.id, profile))
        .collect())
}

#[get("/c/{channel_id}")]
pub async fn channel_subscribers(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let channel_id = parse_id(&path, "channelId")?;

    let subscribers = state
        .blocking(move |store, _| {
            if store.find_user(channel_id)?.is_none() {
                return Err(ApiError::not_found("Channel does not exist"));
            }

            let subscriptions = store.subscribers_of(channel_id)?;
            let ids: Vec<Uuid> = subscriptions.iter().map(|s| s.subscriber_id).collect();
            let mut profiles = profiles(store, &ids)?;

            Ok(subscriptions
                .into_iter()
                .map(|s| Subscriber {
                    id: s.id,
                    subscriber: profiles.remove(&s.subscriber_id),
                    created_at: s.created_at,
                })
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(response::ok(subscribers, "Subscribers fetched successfully"))
}

#[get("/u/{subscriber_id}")]
pub async fn subscribed_channels(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let subscriber_id = parse_id(&path, "subscriberId")?;

    let channels = state
        .blocking(move |store, _| {
            if store.find_user(subscriber_id)?.is_none() {
                return Err(ApiError::not_found("User does not exist"));
            }

            let subscriptions = store.subscriptions_of(subscriber_id)?;
            let ids: Vec<Uuid> = subscriptions.iter().map(|s| s.channel_id).collect();
            let mut profiles = profiles(store, &ids)?;

            Ok(subscriptions
                .into_iter()
                .map(|s| SubscribedChannel {
                    id: s.id,
                    channel: profiles.remove(&s.channel_id),
                    created_at: s.created_at,
                })
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(response::ok(channels, "Subscribed channels fetched successfully"))
}
