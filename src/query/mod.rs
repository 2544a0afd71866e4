//! Viewer-relative reads over videos, tweets and comments.
//!
//! A [`ContentQuery`] describes what to read (filters, ordering, window) and
//! which joins to compute. The store only narrows, orders and windows rows;
//! owner profiles and like counts are joined here, once, for every store.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Comment, LikeKind, OwnerProfile, Tweet, Video};
use crate::store::{Store, StoreResult};

pub mod pagination;

pub use pagination::{PageRequest, Paginated};

pub const SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    /// Newest first by creation time.
    #[default]
    Newest,
    /// Best full-text match first; only meaningful with a text filter.
    Relevance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct Selection<F> {
    pub filter: F,
    pub ordering: Ordering,
    pub window: Option<Window>,
}

/// One window of rows plus the number of rows matching before windowing.
#[derive(Debug)]
pub struct Slice<T> {
    pub rows: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub owner: Option<Uuid>,
    pub category: Option<String>,
    pub published: Option<bool>,
    pub ids: Option<Vec<Uuid>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TweetFilter {
    pub owner: Option<Uuid>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub video: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    Owner,
    Likes,
}

/// Content joined with its owner's public profile and like data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enriched<T> {
    #[serde(flatten)]
    pub item: T,
    pub owner: Option<OwnerProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
}

pub trait Content: Sized {
    type Filter: Clone;

    const LIKE_KIND: LikeKind;

    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
    fn select(store: &dyn Store, selection: &Selection<Self::Filter>) -> StoreResult<Slice<Self>>;
}

impl Content for Video {
    type Filter = VideoFilter;

    const LIKE_KIND: LikeKind = LikeKind::Video;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn select(store: &dyn Store, selection: &Selection<VideoFilter>) -> StoreResult<Slice<Self>> {
        store.select_videos(selection)
    }
}

impl Content for Tweet {
    type Filter = TweetFilter;

    const LIKE_KIND: LikeKind = LikeKind::Tweet;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn select(store: &dyn Store, selection: &Selection<TweetFilter>) -> StoreResult<Slice<Self>> {
        store.select_tweets(selection)
    }
}

impl Content for Comment {
    type Filter = CommentFilter;

    const LIKE_KIND: LikeKind = LikeKind::Comment;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn select(store: &dyn Store, selection: &Selection<CommentFilter>) -> StoreResult<Slice<Self>> {
        store.select_comments(selection)
    }
}

pub struct ContentQuery<T: Content> {
    selection: Selection<T::Filter>,
    joins: Vec<Join>,
    viewer: Option<Uuid>,
    page: PageRequest,
}

impl<T: Content> ContentQuery<T> {
    pub fn new(filter: T::Filter) -> Self {
        ContentQuery {
            selection: Selection {
                filter,
                ordering: Ordering::Newest,
                window: None,
            },
            joins: vec![Join::Owner, Join::Likes],
            viewer: None,
            page: PageRequest::default(),
        }
    }

    pub fn viewer(mut self, viewer: Option<Uuid>) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn ordering(mut self, ordering: Ordering) -> Self {
        self.selection.ordering = ordering;
        self
    }

    pub fn joins(mut self, joins: &[Join]) -> Self {
        self.joins = joins.to_vec();
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    /// Reads every matching row, or the first `limit` of them.
    pub fn fetch(&self, store: &dyn Store, limit: Option<i64>) -> StoreResult<Vec<Enriched<T>>> {
        let selection = Selection {
            filter: self.selection.filter.clone(),
            ordering: self.selection.ordering,
            window: limit.map(|limit| Window { offset: 0, limit }),
        };

        let slice = T::select(store, &selection)?;
        self.enrich(store, slice.rows)
    }

    pub fn paginate(&self, store: &dyn Store) -> StoreResult<Paginated<Enriched<T>>> {
        let selection = Selection {
            filter: self.selection.filter.clone(),
            ordering: self.selection.ordering,
            window: Some(self.page.window()),
        };

        let slice = T::select(store, &selection)?;
        let docs = self.enrich(store, slice.rows)?;

        Ok(Paginated::new(docs, slice.total, self.page))
    }

    fn enrich(&self, store: &dyn Store, rows: Vec<T>) -> StoreResult<Vec<Enriched<T>>> {
        let owners: HashMap<Uuid, OwnerProfile> = if self.joins.contains(&Join::Owner) {
            let mut owner_ids: Vec<Uuid> = rows.iter().map(|row| row.owner_id()).collect();
            owner_ids.sort();
            owner_ids.dedup();

            store
                .public_profiles(&owner_ids)?
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect()
        } else {
            HashMap::new()
        };

        let likes = if self.joins.contains(&Join::Likes) {
            let ids: Vec<Uuid> = rows.iter().map(|row| row.id()).collect();
            Some(store.like_summaries(T::LIKE_KIND, &ids, self.viewer)?)
        } else {
            None
        };

        Ok(rows
            .into_iter()
            .map(|item| {
                let owner = owners.get(&item.owner_id()).cloned();
                let summary = likes
                    .as_ref()
                    .map(|likes| likes.get(&item.id()).copied().unwrap_or_default());

                Enriched {
                    owner,
                    likes_count: summary.map(|s| s.count),
                    is_liked: summary.map(|s| s.liked && self.viewer.is_some()),
                    item,
                }
            })
            .collect())
    }
}

/// Joined videos for an explicit id list, in the list's order. Ids with no
/// matching video are skipped.
pub fn videos_in_order(
    store: &dyn Store,
    ids: &[Uuid],
    viewer: Option<Uuid>,
    joins: &[Join],
) -> StoreResult<Vec<Enriched<Video>>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let filter = VideoFilter {
        ids: Some(ids.to_vec()),
        ..VideoFilter::default()
    };

    let mut by_id: HashMap<Uuid, Enriched<Video>> = ContentQuery::<Video>::new(filter)
        .viewer(viewer)
        .joins(joins)
        .fetch(store, None)?
        .into_iter()
        .map(|video| (video.item.id, video))
        .collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchHit {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetSearchHit {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub url: String,
}

pub fn search_videos(store: &dyn Store, text: &str) -> StoreResult<Vec<VideoSearchHit>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let selection = Selection {
        filter: VideoFilter {
            published: Some(true),
            text: Some(text.to_string()),
            ..VideoFilter::default()
        },
        ordering: Ordering::Relevance,
        window: Some(Window {
            offset: 0,
            limit: SEARCH_LIMIT,
        }),
    };

    Ok(store
        .select_videos(&selection)?
        .rows
        .into_iter()
        .map(|video| VideoSearchHit {
            url: format!("/videos/{}", video.id),
            id: video.id,
            title: video.title,
            description: video.description,
        })
        .collect())
}

pub fn search_tweets(store: &dyn Store, text: &str) -> StoreResult<Vec<TweetSearchHit>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let selection = Selection {
        filter: TweetFilter {
            owner: None,
            text: Some(text.to_string()),
        },
        ordering: Ordering::Relevance,
        window: Some(Window {
            offset: 0,
            limit: SEARCH_LIMIT,
        }),
    };

    Ok(store
        .select_tweets(&selection)?
        .rows
        .into_iter()
        .map(|tweet| TweetSearchHit {
            url: format!("/tweets/{}", tweet.id),
            id: tweet.id,
            content: tweet.content,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::{Like, LikeTarget, MediaRef, User};
    use crate::store::MemoryStore;

    fn user(store: &MemoryStore, name: &str) -> User {
        let now = Utc::now();
        store
            .insert_user(&User {
                id: Uuid::new_v4(),
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password: "hash".to_string(),
                full_name: name.to_string(),
                avatar: MediaRef {
                    url: format!("http://media/{name}.png"),
                    storage_id: format!("{name}.png"),
                },
                cover_image: None,
                watch_history: Vec::new(),
                refresh_token: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap()
    }

    fn tweet(store: &MemoryStore, owner: Uuid, content: &str, age_minutes: i64) -> Tweet {
        let at = Utc::now() - Duration::minutes(age_minutes);
        store
            .insert_tweet(&Tweet {
                id: Uuid::new_v4(),
                content: content.to_string(),
                owner_id: owner,
                created_at: at,
                updated_at: at,
            })
            .unwrap()
    }

    #[test]
    fn tweets_carry_owner_and_viewer_likes() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        let post = tweet(&store, alice.id, "hello", 0);

        store
            .insert_like(&Like::new(bob.id, LikeTarget::Tweet(post.id)))
            .unwrap();

        let as_bob = ContentQuery::<Tweet>::new(TweetFilter::default())
            .viewer(Some(bob.id))
            .paginate(&store)
            .unwrap();
        let doc = &as_bob.docs[0];
        assert_eq!(doc.likes_count, Some(1));
        assert_eq!(doc.is_liked, Some(true));
        assert_eq!(doc.owner.as_ref().map(|o| o.username.as_str()), Some("alice"));

        let anonymous = ContentQuery::<Tweet>::new(TweetFilter::default())
            .fetch(&store, None)
            .unwrap();
        assert_eq!(anonymous[0].likes_count, Some(1));
        assert_eq!(anonymous[0].is_liked, Some(false));
    }

    #[test]
    fn unliked_content_reports_zero() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice");
        tweet(&store, alice.id, "quiet", 0);

        let docs = ContentQuery::<Tweet>::new(TweetFilter::default())
            .viewer(Some(alice.id))
            .fetch(&store, None)
            .unwrap();

        assert_eq!(docs[0].likes_count, Some(0));
        assert_eq!(docs[0].is_liked, Some(false));
    }

    #[test]
    fn second_page_of_twelve() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice");
        for n in 0..12 {
            tweet(&store, alice.id, &format!("post {n}"), n);
        }

        let page = ContentQuery::<Tweet>::new(TweetFilter {
            owner: Some(alice.id),
            text: None,
        })
        .page(PageRequest::new(2, 5))
        .paginate(&store)
        .unwrap();

        assert_eq!(page.docs.len(), 5);
        assert_eq!(page.total_docs, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.docs[0].item.content, "post 5");
    }

    #[test]
    fn owner_only_join_omits_like_fields() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice");
        tweet(&store, alice.id, "hello", 0);

        let docs = ContentQuery::<Tweet>::new(TweetFilter::default())
            .joins(&[Join::Owner])
            .fetch(&store, None)
            .unwrap();
        let json = serde_json::to_value(&docs[0]).unwrap();

        assert!(json.get("likesCount").is_none());
        assert_eq!(json["owner"]["username"], "alice");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn blank_search_returns_nothing() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice");
        tweet(&store, alice.id, "rust", 0);

        assert!(search_tweets(&store, "   ").unwrap().is_empty());

        let hits = search_tweets(&store, "rust").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, format!("/tweets/{}", hits[0].id));
    }
}
