use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, LikeKind, LikeTarget, Like, MediaRef, OwnerProfile, Playlist, Subscription, Tweet,
    User, UserChanges, Video, VideoChanges,
};
use crate::query::{CommentFilter, Selection, Slice, TweetFilter, VideoFilter};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.constraint_name().unwrap_or("unique").to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Like count for one piece of content, and whether the viewer is among the likers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeSummary {
    pub count: i64,
    pub liked: bool,
}

/// Persistence seam. Everything is synchronous; callers run it on the blocking pool.
pub trait Store: Send + Sync {
    fn ping(&self) -> StoreResult<()>;

    fn insert_user(&self, user: &User) -> StoreResult<User>;
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// First user whose email or username matches either given value.
    fn find_user_by_identity(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>>;
    fn update_user_details(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>>;
    fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;
    fn set_avatar(&self, id: Uuid, avatar: &MediaRef) -> StoreResult<Option<User>>;
    fn set_cover_image(&self, id: Uuid, cover_image: &MediaRef) -> StoreResult<Option<User>>;
    fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()>;
    /// Replaces the stored refresh token only if it still equals `presented`.
    fn rotate_refresh_token(&self, id: Uuid, presented: &str, next: &str) -> StoreResult<bool>;
    /// Moves `video_id` to the front of the user's watch history.
    fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> StoreResult<()>;
    fn public_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<OwnerProfile>>;

    fn insert_video(&self, video: &Video) -> StoreResult<Video>;
    fn find_video(&self, id: Uuid) -> StoreResult<Option<Video>>;
    fn update_video(&self, id: Uuid, changes: &VideoChanges) -> StoreResult<Option<Video>>;
    fn increment_views(&self, id: Uuid) -> StoreResult<Option<i64>>;
    /// Deletes the video with its comments and likes, and strips it from
    /// watch histories and playlists.
    fn delete_video(&self, id: Uuid) -> StoreResult<bool>;
    fn select_videos(&self, selection: &Selection<VideoFilter>) -> StoreResult<Slice<Video>>;

    fn insert_comment(&self, comment: &Comment) -> StoreResult<Comment>;
    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>>;
    fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;
    fn select_comments(&self, selection: &Selection<CommentFilter>) -> StoreResult<Slice<Comment>>;

    fn insert_tweet(&self, tweet: &Tweet) -> StoreResult<Tweet>;
    fn find_tweet(&self, id: Uuid) -> StoreResult<Option<Tweet>>;
    fn update_tweet(&self, id: Uuid, content: &str) -> StoreResult<Option<Tweet>>;
    fn delete_tweet(&self, id: Uuid) -> StoreResult<bool>;
    fn select_tweets(&self, selection: &Selection<TweetFilter>) -> StoreResult<Slice<Tweet>>;

    fn find_like(&self, liked_by: Uuid, target: LikeTarget) -> StoreResult<Option<Like>>;
    /// Returns false when an identical like already existed.
    fn insert_like(&self, like: &Like) -> StoreResult<bool>;
    fn delete_like(&self, id: Uuid) -> StoreResult<bool>;
    fn like_summaries(
        &self,
        kind: LikeKind,
        ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<HashMap<Uuid, LikeSummary>>;
    /// Videos liked by the user, most recently liked first.
    fn liked_video_ids(&self, liked_by: Uuid) -> StoreResult<Vec<Uuid>>;

    fn find_subscription(&self, subscriber: Uuid, channel: Uuid) -> StoreResult<Option<Subscription>>;
    /// Returns false when the pair was already subscribed.
    fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<bool>;
    fn delete_subscription(&self, id: Uuid) -> StoreResult<bool>;
    fn subscribers_of(&self, channel: Uuid) -> StoreResult<Vec<Subscription>>;
    fn subscriptions_of(&self, subscriber: Uuid) -> StoreResult<Vec<Subscription>>;
    fn count_subscribers(&self, channel: Uuid) -> StoreResult<i64>;
    fn count_subscriptions(&self, subscriber: Uuid) -> StoreResult<i64>;

    fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<Playlist>;
    fn find_playlist(&self, id: Uuid) -> StoreResult<Option<Playlist>>;
    fn update_playlist(&self, id: Uuid, name: &str, description: &str) -> StoreResult<Option<Playlist>>;
    fn delete_playlist(&self, id: Uuid) -> StoreResult<bool>;
    /// Appends the video unless it is already present.
    fn add_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>>;
    fn remove_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>>;
    fn playlists_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Playlist>>;
}
