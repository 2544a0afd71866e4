use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Comment, Like, LikeKind, LikeTarget, MediaRef, OwnerProfile, Playlist, Subscription, Tweet, User,
    UserChanges, Video, VideoChanges,
};
use crate::query::{CommentFilter, Ordering, Selection, Slice, TweetFilter, VideoFilter, Window};

use super::{LikeSummary, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    videos: Vec<Video>,
    comments: Vec<Comment>,
    tweets: Vec<Tweet>,
    likes: Vec<Like>,
    subscriptions: Vec<Subscription>,
    playlists: Vec<Playlist>,
}

/// Process-local store. Rows live in insertion order; every method holds the
/// lock for its whole body, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Every query term must occur in the document; the score is the number of hits.
fn relevance(query: &[String], document: &str) -> Option<usize> {
    if query.is_empty() {
        return None;
    }

    let words = terms(document);
    let mut score = 0;

    for term in query {
        let hits = words.iter().filter(|word| *word == term).count();
        if hits == 0 {
            return None;
        }
        score += hits;
    }

    Some(score)
}

/// Orders matched rows (given in insertion order with their relevance) and applies the window.
fn arrange<T: Clone>(
    matched: Vec<(usize, &T)>,
    ordering: Ordering,
    window: Option<Window>,
    created_at: fn(&T) -> DateTime<Utc>,
) -> Slice<T> {
    let mut ranked: Vec<(usize, usize, &T)> = matched
        .into_iter()
        .enumerate()
        .map(|(seq, (score, row))| (seq, score, row))
        .collect();

    ranked.sort_by(|a, b| {
        let newest = created_at(b.2)
            .cmp(&created_at(a.2))
            .then(b.0.cmp(&a.0));

        match ordering {
            Ordering::Relevance => b.1.cmp(&a.1).then(newest),
            Ordering::Newest => newest,
        }
    });

    let total = ranked.len() as i64;
    let (offset, limit) = window
        .map(|w| (w.offset.max(0) as usize, w.limit.max(0) as usize))
        .unwrap_or((0, usize::MAX));

    Slice {
        rows: ranked
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, _, row)| row.clone())
            .collect(),
        total,
    }
}

fn unique_user_fields(
    users: &[User],
    exclude: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for user in users.iter().filter(|user| Some(user.id) != exclude) {
        if username.is_some_and(|name| user.username == name) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }
        if email.is_some_and(|email| user.email == email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
    }

    Ok(())
}

impl Store for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    fn insert_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.write()?;
        unique_user_fields(&tables.users, None, Some(&user.username), Some(&user.email))?;
        tables.users.push(user.clone());
        Ok(user.clone())
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|user| user.id == id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    fn find_user_by_identity(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|user| {
                email.is_some_and(|email| user.email == email)
                    || username.is_some_and(|name| user.username == name)
            })
            .cloned())
    }

    fn update_user_details(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        unique_user_fields(
            &tables.users,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        )?;

        let Some(user) = tables.users.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };

        if let Some(full_name) = &changes.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(user) = tables.users.iter_mut().find(|user| user.id == id) {
            user.password = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    fn set_avatar(&self, id: Uuid, avatar: &MediaRef) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        Ok(tables.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.avatar = avatar.clone();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    fn set_cover_image(&self, id: Uuid, cover_image: &MediaRef) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        Ok(tables.users.iter_mut().find(|user| user.id == id).map(|user| {
            user.cover_image = Some(cover_image.clone());
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(user) = tables.users.iter_mut().find(|user| user.id == id) {
            user.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }

    fn rotate_refresh_token(&self, id: Uuid, presented: &str, next: &str) -> StoreResult<bool> {
        let mut tables = self.write()?;
        match tables.users.iter_mut().find(|user| user.id == id) {
            Some(user) if user.refresh_token.as_deref() == Some(presented) => {
                user.refresh_token = Some(next.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(user) = tables.users.iter_mut().find(|user| user.id == user_id) {
            user.watch_history.retain(|id| *id != video_id);
            user.watch_history.insert(0, video_id);
        }
        Ok(())
    }

    fn public_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<OwnerProfile>> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|user| ids.contains(&user.id))
            .map(User::profile)
            .collect())
    }

    fn insert_video(&self, video: &Video) -> StoreResult<Video> {
        self.write()?.videos.push(video.clone());
        Ok(video.clone())
    }

    fn find_video(&self, id: Uuid) -> StoreResult<Option<Video>> {
        Ok(self.read()?.videos.iter().find(|video| video.id == id).cloned())
    }

    fn update_video(&self, id: Uuid, changes: &VideoChanges) -> StoreResult<Option<Video>> {
        let mut tables = self.write()?;
        let Some(video) = tables.videos.iter_mut().find(|video| video.id == id) else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            video.title = title.clone();
        }
        if let Some(description) = &changes.description {
            video.description = description.clone();
        }
        if let Some(thumbnail) = &changes.thumbnail {
            video.thumbnail_url = thumbnail.url.clone();
            video.thumbnail_storage_id = thumbnail.storage_id.clone();
        }
        if let Some(is_published) = changes.is_published {
            video.is_published = is_published;
        }
        video.updated_at = Utc::now();

        Ok(Some(video.clone()))
    }

    fn increment_views(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let mut tables = self.write()?;
        Ok(tables.videos.iter_mut().find(|video| video.id == id).map(|video| {
            video.views += 1;
            video.views
        }))
    }

    fn delete_video(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.videos.len();
        tables.videos.retain(|video| video.id != id);
        if tables.videos.len() == before {
            return Ok(false);
        }

        let comment_ids: HashSet<Uuid> = tables
            .comments
            .iter()
            .filter(|comment| comment.video_id == id)
            .map(|comment| comment.id)
            .collect();

        tables.comments.retain(|comment| comment.video_id != id);
        tables.likes.retain(|like| {
            like.video_id != Some(id)
                && !like.comment_id.is_some_and(|comment| comment_ids.contains(&comment))
        });

        for user in tables.users.iter_mut() {
            user.watch_history.retain(|video| *video != id);
        }
        for playlist in tables.playlists.iter_mut() {
            playlist.videos.retain(|video| *video != id);
        }

        Ok(true)
    }

    fn select_videos(&self, selection: &Selection<VideoFilter>) -> StoreResult<Slice<Video>> {
        let tables = self.read()?;
        let filter = &selection.filter;
        let query = filter.text.as_deref().map(terms);

        let matched: Vec<(usize, &Video)> = tables
            .videos
            .iter()
            .filter(|video| filter.owner.map_or(true, |owner| video.owner_id == owner))
            .filter(|video| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |category| video.category == category)
            })
            .filter(|video| filter.published.map_or(true, |p| video.is_published == p))
            .filter(|video| filter.ids.as_ref().map_or(true, |ids| ids.contains(&video.id)))
            .filter_map(|video| match &query {
                Some(query) => {
                    let document = format!("{} {}", video.title, video.description);
                    relevance(query, &document).map(|score| (score, video))
                }
                None => Some((0, video)),
            })
            .collect();

        Ok(arrange(matched, selection.ordering, selection.window, |v: &Video| v.created_at))
    }

    fn insert_comment(&self, comment: &Comment) -> StoreResult<Comment> {
        self.write()?.comments.push(comment.clone());
        Ok(comment.clone())
    }

    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.read()?.comments.iter().find(|c| c.id == id).cloned())
    }

    fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        let mut tables = self.write()?;
        Ok(tables.comments.iter_mut().find(|c| c.id == id).map(|comment| {
            comment.content = content.to_string();
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.comments.len();
        tables.comments.retain(|comment| comment.id != id);
        if tables.comments.len() == before {
            return Ok(false);
        }

        tables.likes.retain(|like| like.comment_id != Some(id));
        Ok(true)
    }

    fn select_comments(&self, selection: &Selection<CommentFilter>) -> StoreResult<Slice<Comment>> {
        let tables = self.read()?;
        let matched: Vec<(usize, &Comment)> = tables
            .comments
            .iter()
            .filter(|comment| {
                selection
                    .filter
                    .video
                    .map_or(true, |video| comment.video_id == video)
            })
            .map(|comment| (0, comment))
            .collect();

        Ok(arrange(matched, selection.ordering, selection.window, |c: &Comment| c.created_at))
    }

    fn insert_tweet(&self, tweet: &Tweet) -> StoreResult<Tweet> {
        self.write()?.tweets.push(tweet.clone());
        Ok(tweet.clone())
    }

    fn find_tweet(&self, id: Uuid) -> StoreResult<Option<Tweet>> {
        Ok(self.read()?.tweets.iter().find(|t| t.id == id).cloned())
    }

    fn update_tweet(&self, id: Uuid, content: &str) -> StoreResult<Option<Tweet>> {
        let mut tables = self.write()?;
        Ok(tables.tweets.iter_mut().find(|t| t.id == id).map(|tweet| {
            tweet.content = content.to_string();
            tweet.updated_at = Utc::now();
            tweet.clone()
        }))
    }

    fn delete_tweet(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.tweets.len();
        tables.tweets.retain(|tweet| tweet.id != id);
        if tables.tweets.len() == before {
            return Ok(false);
        }

        tables.likes.retain(|like| like.tweet_id != Some(id));
        Ok(true)
    }

    fn select_tweets(&self, selection: &Selection<TweetFilter>) -> StoreResult<Slice<Tweet>> {
        let tables = self.read()?;
        let filter = &selection.filter;
        let query = filter.text.as_deref().map(terms);

        let matched: Vec<(usize, &Tweet)> = tables
            .tweets
            .iter()
            .filter(|tweet| filter.owner.map_or(true, |owner| tweet.owner_id == owner))
            .filter_map(|tweet| match &query {
                Some(query) => relevance(query, &tweet.content).map(|score| (score, tweet)),
                None => Some((0, tweet)),
            })
            .collect();

        Ok(arrange(matched, selection.ordering, selection.window, |t: &Tweet| t.created_at))
    }

    fn find_like(&self, liked_by: Uuid, target: LikeTarget) -> StoreResult<Option<Like>> {
        Ok(self
            .read()?
            .likes
            .iter()
            .find(|like| like.liked_by == liked_by && like.target() == Some(target))
            .cloned())
    }

    fn insert_like(&self, like: &Like) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let exists = tables
            .likes
            .iter()
            .any(|row| row.liked_by == like.liked_by && row.target() == like.target());

        if exists {
            return Ok(false);
        }

        tables.likes.push(like.clone());
        Ok(true)
    }

    fn delete_like(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.likes.len();
        tables.likes.retain(|like| like.id != id);
        Ok(tables.likes.len() != before)
    }

    fn like_summaries(
        &self,
        kind: LikeKind,
        ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<HashMap<Uuid, LikeSummary>> {
        let tables = self.read()?;
        let mut summaries: HashMap<Uuid, LikeSummary> = HashMap::new();

        for like in &tables.likes {
            let Some(target) = like.target() else { continue };
            if target.kind() != kind || !ids.contains(&target.id()) {
                continue;
            }

            let summary = summaries.entry(target.id()).or_default();
            summary.count += 1;
            if viewer == Some(like.liked_by) {
                summary.liked = true;
            }
        }

        Ok(summaries)
    }

    fn liked_video_ids(&self, liked_by: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.read()?;
        let matched: Vec<(usize, &Like)> = tables
            .likes
            .iter()
            .filter(|like| like.liked_by == liked_by && like.video_id.is_some())
            .map(|like| (0, like))
            .collect();

        Ok(arrange(matched, Ordering::Newest, None, |l: &Like| l.created_at)
            .rows
            .into_iter()
            .filter_map(|like| like.video_id)
            .collect())
    }

    fn find_subscription(&self, subscriber: Uuid, channel: Uuid) -> StoreResult<Option<Subscription>> {
        Ok(self
            .read()?
            .subscriptions
            .iter()
            .find(|s| s.subscriber_id == subscriber && s.channel_id == channel)
            .cloned())
    }

    fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let exists = tables.subscriptions.iter().any(|s| {
            s.subscriber_id == subscription.subscriber_id && s.channel_id == subscription.channel_id
        });

        if exists {
            return Ok(false);
        }

        tables.subscriptions.push(subscription.clone());
        Ok(true)
    }

    fn delete_subscription(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.subscriptions.len();
        tables.subscriptions.retain(|s| s.id != id);
        Ok(tables.subscriptions.len() != before)
    }

    fn subscribers_of(&self, channel: Uuid) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .read()?
            .subscriptions
            .iter()
            .filter(|s| s.channel_id == channel)
            .cloned()
            .collect())
    }

    fn subscriptions_of(&self, subscriber: Uuid) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .read()?
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == subscriber)
            .cloned()
            .collect())
    }

    fn count_subscribers(&self, channel: Uuid) -> StoreResult<i64> {
        Ok(self.subscribers_of(channel)?.len() as i64)
    }

    fn count_subscriptions(&self, subscriber: Uuid) -> StoreResult<i64> {
        Ok(self.subscriptions_of(subscriber)?.len() as i64)
    }

    fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<Playlist> {
        self.write()?.playlists.push(playlist.clone());
        Ok(playlist.clone())
    }

    fn find_playlist(&self, id: Uuid) -> StoreResult<Option<Playlist>> {
        Ok(self.read()?.playlists.iter().find(|p| p.id == id).cloned())
    }

    fn update_playlist(&self, id: Uuid, name: &str, description: &str) -> StoreResult<Option<Playlist>> {
        let mut tables = self.write()?;
        Ok(tables.playlists.iter_mut().find(|p| p.id == id).map(|playlist| {
            playlist.name = name.to_string();
            playlist.description = description.to_string();
            playlist.updated_at = Utc::now();
            playlist.clone()
        }))
    }

    fn delete_playlist(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.playlists.len();
        tables.playlists.retain(|p| p.id != id);
        Ok(tables.playlists.len() != before)
    }

    fn add_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>> {
        let mut tables = self.write()?;
        Ok(tables.playlists.iter_mut().find(|p| p.id == id).map(|playlist| {
            if !playlist.videos.contains(&video_id) {
                playlist.videos.push(video_id);
                playlist.updated_at = Utc::now();
            }
            playlist.clone()
        }))
    }

    fn remove_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>> {
        let mut tables = self.write()?;
        Ok(tables.playlists.iter_mut().find(|p| p.id == id).map(|playlist| {
            playlist.videos.retain(|video| *video != video_id);
            playlist.updated_at = Utc::now();
            playlist.clone()
        }))
    }

    fn playlists_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Playlist>> {
        Ok(self
            .read()?
            .playlists
            .iter()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect())
    }
}
