use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{comments, likes, playlists, subscriptions, tweets, videos};

pub const VIDEO_CATEGORIES: [&str; 16] = [
    "Music",
    "Gaming",
    "Education",
    "Sports",
    "News",
    "Entertainment",
    "Technology",
    "Comedy",
    "Film & Animation",
    "Science & Tech",
    "Travel & Events",
    "Howto & Style",
    "People & Blogs",
    "Pets & Animals",
    "Autos & Vehicles",
    "Other",
];

pub fn is_video_category(candidate: &str) -> bool {
    VIDEO_CATEGORIES.contains(&candidate)
}

/// A file held by the media store: its public URL and the id used to delete it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    #[serde(skip_serializing)]
    pub storage_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub avatar: MediaRef,
    pub cover_image: Option<MediaRef>,
    pub watch_history: Vec<Uuid>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> OwnerProfile {
        OwnerProfile {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: ProfileAvatar {
                url: self.avatar.url.clone(),
            },
        }
    }
}

/// Fields a user may change about their own account.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.username.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileAvatar {
    pub url: String,
}

/// The public face of a user, as joined onto content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: ProfileAvatar,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: MediaRef,
    pub cover_image: Option<MediaRef>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = videos)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(rename = "videoFile")]
    pub video_url: String,
    #[serde(skip_serializing)]
    pub video_storage_id: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(skip_serializing)]
    pub thumbnail_storage_id: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn video_file(&self) -> MediaRef {
        MediaRef {
            url: self.video_url.clone(),
            storage_id: self.video_storage_id.clone(),
        }
    }

    pub fn thumbnail(&self) -> MediaRef {
        MediaRef {
            url: self.thumbnail_url.clone(),
            storage_id: self.thumbnail_storage_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<MediaRef>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = comments)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub owner_id: Uuid,
    pub video_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = tweets)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeKind {
    Video,
    Comment,
    Tweet,
}

/// What a like points at. Exactly one target per like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Video(Uuid),
    Comment(Uuid),
    Tweet(Uuid),
}

impl LikeTarget {
    pub fn kind(&self) -> LikeKind {
        match self {
            LikeTarget::Video(_) => LikeKind::Video,
            LikeTarget::Comment(_) => LikeKind::Comment,
            LikeTarget::Tweet(_) => LikeKind::Tweet,
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => id,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = likes)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub liked_by: Uuid,
    #[serde(rename = "video", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<Uuid>,
    #[serde(rename = "comment", skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<Uuid>,
    #[serde(rename = "tweet", skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(liked_by: Uuid, target: LikeTarget) -> Self {
        let mut like = Like {
            id: Uuid::new_v4(),
            liked_by,
            video_id: None,
            comment_id: None,
            tweet_id: None,
            created_at: Utc::now(),
        };

        match target {
            LikeTarget::Video(id) => like.video_id = Some(id),
            LikeTarget::Comment(id) => like.comment_id = Some(id),
            LikeTarget::Tweet(id) => like.tweet_id = Some(id),
        }

        like
    }

    pub fn target(&self) -> Option<LikeTarget> {
        match (self.video_id, self.comment_id, self.tweet_id) {
            (Some(id), None, None) => Some(LikeTarget::Video(id)),
            (None, Some(id), None) => Some(LikeTarget::Comment(id)),
            (None, None, Some(id)) => Some(LikeTarget::Tweet(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = subscriptions)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "subscriber")]
    pub subscriber_id: Uuid,
    #[serde(rename = "channel")]
    pub channel_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = playlists)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub videos: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_subscribers: i64,
    pub total_videos: i64,
    pub total_views: i64,
    pub total_likes: i64,
}
