use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::{Bool, Float, Text, Uuid as SqlUuid};
use uuid::Uuid;

use crate::models::{
    Comment, Like, LikeKind, LikeTarget, MediaRef, OwnerProfile, Playlist, ProfileAvatar,
    Subscription, Tweet, User, UserChanges, Video, VideoChanges,
};
use crate::query::{CommentFilter, Ordering, Selection, Slice, TweetFilter, VideoFilter};
use crate::schema::{comments, likes, playlists, subscriptions, tweets, users, videos};

use super::{LikeSummary, Store, StoreError, StoreResult};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

const VIDEO_DOCUMENT: &str = "to_tsvector('english', title || ' ' || description)";
const TWEET_DOCUMENT: &str = "to_tsvector('english', content)";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(database_url: &str, max_size: u32) -> StoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(max_size).build(manager)?;

        Ok(PgStore { pool })
    }

    fn conn(&self) -> StoreResult<PgPooled> {
        Ok(self.pool.get()?)
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Pg))]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password: String,
    full_name: String,
    avatar_url: String,
    avatar_storage_id: String,
    cover_image_url: Option<String>,
    cover_image_storage_id: Option<String>,
    watch_history: Vec<Uuid>,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let cover_image = match (record.cover_image_url, record.cover_image_storage_id) {
            (Some(url), Some(storage_id)) => Some(MediaRef { url, storage_id }),
            _ => None,
        };

        User {
            id: record.id,
            username: record.username,
            email: record.email,
            password: record.password,
            full_name: record.full_name,
            avatar: MediaRef {
                url: record.avatar_url,
                storage_id: record.avatar_storage_id,
            },
            cover_image,
            watch_history: record.watch_history,
            refresh_token: record.refresh_token,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        UserRecord {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar.url.clone(),
            avatar_storage_id: user.avatar.storage_id.clone(),
            cover_image_url: user.cover_image.as_ref().map(|c| c.url.clone()),
            cover_image_storage_id: user.cover_image.as_ref().map(|c| c.storage_id.clone()),
            watch_history: user.watch_history.clone(),
            refresh_token: user.refresh_token.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct UserDetailsChangeset<'a> {
    full_name: Option<&'a str>,
    username: Option<&'a str>,
    email: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = videos)]
struct VideoChangeset<'a> {
    title: Option<&'a str>,
    description: Option<&'a str>,
    thumbnail_url: Option<&'a str>,
    thumbnail_storage_id: Option<&'a str>,
    is_published: Option<bool>,
    updated_at: DateTime<Utc>,
}

fn video_query(filter: &VideoFilter) -> videos::BoxedQuery<'static, Pg> {
    let mut query = videos::table.into_boxed();

    if let Some(owner) = filter.owner {
        query = query.filter(videos::owner_id.eq(owner));
    }
    if let Some(category) = filter.category.clone() {
        query = query.filter(videos::category.eq(category));
    }
    if let Some(published) = filter.published {
        query = query.filter(videos::is_published.eq(published));
    }
    if let Some(ids) = filter.ids.clone() {
        query = query.filter(videos::id.eq_any(ids));
    }
    if let Some(text) = filter.text.clone() {
        query = query.filter(
            sql::<Bool>(&format!("{VIDEO_DOCUMENT} @@ plainto_tsquery('english', "))
                .bind::<Text, _>(text)
                .sql(")"),
        );
    }

    query
}

fn tweet_query(filter: &TweetFilter) -> tweets::BoxedQuery<'static, Pg> {
    let mut query = tweets::table.into_boxed();

    if let Some(owner) = filter.owner {
        query = query.filter(tweets::owner_id.eq(owner));
    }
    if let Some(text) = filter.text.clone() {
        query = query.filter(
            sql::<Bool>(&format!("{TWEET_DOCUMENT} @@ plainto_tsquery('english', "))
                .bind::<Text, _>(text)
                .sql(")"),
        );
    }

    query
}

fn comment_query(filter: &CommentFilter) -> comments::BoxedQuery<'static, Pg> {
    let mut query = comments::table.into_boxed();

    if let Some(video) = filter.video {
        query = query.filter(comments::video_id.eq(video));
    }

    query
}

/// Counts likes per target and collects the targets the viewer liked.
macro_rules! like_summaries_for {
    ($conn:expr, $column:ident, $ids:expr, $viewer:expr) => {{
        let counts: Vec<(Option<Uuid>, i64)> = likes::table
            .filter(likes::$column.eq_any($ids.to_vec()))
            .group_by(likes::$column)
            .select((likes::$column, count_star()))
            .load($conn)?;

        let liked: Vec<Option<Uuid>> = match $viewer {
            Some(viewer) => likes::table
                .filter(likes::$column.eq_any($ids.to_vec()))
                .filter(likes::liked_by.eq(viewer))
                .select(likes::$column)
                .load($conn)?,
            None => Vec::new(),
        };

        let mut summaries: HashMap<Uuid, LikeSummary> = HashMap::new();
        for (target, count) in counts {
            if let Some(target) = target {
                summaries.entry(target).or_default().count = count;
            }
        }
        for target in liked.into_iter().flatten() {
            summaries.entry(target).or_default().liked = true;
        }

        summaries
    }};
}

impl Store for PgStore {
    fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn insert_user(&self, user: &User) -> StoreResult<User> {
        let mut conn = self.conn()?;
        let record = diesel::insert_into(users::table)
            .values(UserRecord::from(user))
            .returning(UserRecord::as_returning())
            .get_result(&mut conn)?;

        Ok(record.into())
    }

    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let record = users::table
            .find(id)
            .select(UserRecord::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(record.map(User::from))
    }

    fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let record = users::table
            .filter(users::username.eq(username))
            .select(UserRecord::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(record.map(User::from))
    }

    fn find_user_by_identity(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let query = users::table.select(UserRecord::as_select()).into_boxed();
        let query = match (email, username) {
            (Some(email), Some(username)) => {
                query.filter(users::email.eq(email).or(users::username.eq(username)))
            }
            (Some(email), None) => query.filter(users::email.eq(email)),
            (None, Some(username)) => query.filter(users::username.eq(username)),
            (None, None) => return Ok(None),
        };

        let mut conn = self.conn()?;
        let record = query.first(&mut conn).optional()?;

        Ok(record.map(User::from))
    }

    fn update_user_details(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let changeset = UserDetailsChangeset {
            full_name: changes.full_name.as_deref(),
            username: changes.username.as_deref(),
            email: changes.email.as_deref(),
            updated_at: Utc::now(),
        };

        let record = diesel::update(users::table.find(id))
            .set(&changeset)
            .returning(UserRecord::as_returning())
            .get_result(&mut conn)
            .optional()?;

        Ok(record.map(User::from))
    }

    fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set((
                users::password.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    fn set_avatar(&self, id: Uuid, avatar: &MediaRef) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let record = diesel::update(users::table.find(id))
            .set((
                users::avatar_url.eq(&avatar.url),
                users::avatar_storage_id.eq(&avatar.storage_id),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(UserRecord::as_returning())
            .get_result(&mut conn)
            .optional()?;

        Ok(record.map(User::from))
    }

    fn set_cover_image(&self, id: Uuid, cover_image: &MediaRef) -> StoreResult<Option<User>> {
        let mut conn = self.conn()?;
        let record = diesel::update(users::table.find(id))
            .set((
                users::cover_image_url.eq(Some(cover_image.url.as_str())),
                users::cover_image_storage_id.eq(Some(cover_image.storage_id.as_str())),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(UserRecord::as_returning())
            .get_result(&mut conn)
            .optional()?;

        Ok(record.map(User::from))
    }

    fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(users::table.find(id))
            .set(users::refresh_token.eq(token))
            .execute(&mut conn)?;

        Ok(())
    }

    fn rotate_refresh_token(&self, id: Uuid, presented: &str, next: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            users::table
                .filter(users::id.eq(id))
                .filter(users::refresh_token.eq(presented)),
        )
        .set(users::refresh_token.eq(Some(next)))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query(
            "UPDATE users SET watch_history = array_prepend($1, array_remove(watch_history, $1)) \
             WHERE id = $2",
        )
        .bind::<SqlUuid, _>(video_id)
        .bind::<SqlUuid, _>(user_id)
        .execute(&mut conn)?;

        Ok(())
    }

    fn public_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<OwnerProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn()?;
        let rows: Vec<(Uuid, String, String, String)> = users::table
            .filter(users::id.eq_any(ids.to_vec()))
            .select((users::id, users::username, users::full_name, users::avatar_url))
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(id, username, full_name, avatar_url)| OwnerProfile {
                id,
                username,
                full_name,
                avatar: ProfileAvatar { url: avatar_url },
            })
            .collect())
    }

    fn insert_video(&self, video: &Video) -> StoreResult<Video> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(videos::table)
            .values(video)
            .returning(Video::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_video(&self, id: Uuid) -> StoreResult<Option<Video>> {
        let mut conn = self.conn()?;
        Ok(videos::table
            .find(id)
            .select(Video::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_video(&self, id: Uuid, changes: &VideoChanges) -> StoreResult<Option<Video>> {
        let mut conn = self.conn()?;
        let changeset = VideoChangeset {
            title: changes.title.as_deref(),
            description: changes.description.as_deref(),
            thumbnail_url: changes.thumbnail.as_ref().map(|t| t.url.as_str()),
            thumbnail_storage_id: changes.thumbnail.as_ref().map(|t| t.storage_id.as_str()),
            is_published: changes.is_published,
            updated_at: Utc::now(),
        };

        Ok(diesel::update(videos::table.find(id))
            .set(&changeset)
            .returning(Video::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn increment_views(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(videos::table.find(id))
            .set(videos::views.eq(videos::views + 1_i64))
            .returning(videos::views)
            .get_result::<i64>(&mut conn)
            .optional()?)
    }

    fn delete_video(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            let comment_ids: Vec<Uuid> = comments::table
                .filter(comments::video_id.eq(id))
                .select(comments::id)
                .load(conn)?;

            diesel::delete(
                likes::table.filter(
                    likes::video_id
                        .eq(id)
                        .or(likes::comment_id.eq_any(comment_ids)),
                ),
            )
            .execute(conn)?;

            diesel::delete(comments::table.filter(comments::video_id.eq(id))).execute(conn)?;

            diesel::sql_query(
                "UPDATE users SET watch_history = array_remove(watch_history, $1) \
                 WHERE $1 = ANY(watch_history)",
            )
            .bind::<SqlUuid, _>(id)
            .execute(conn)?;

            diesel::sql_query(
                "UPDATE playlists SET videos = array_remove(videos, $1) WHERE $1 = ANY(videos)",
            )
            .bind::<SqlUuid, _>(id)
            .execute(conn)?;

            let deleted = diesel::delete(videos::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
    }

    fn select_videos(&self, selection: &Selection<VideoFilter>) -> StoreResult<Slice<Video>> {
        let mut conn = self.conn()?;
        let total: i64 = video_query(&selection.filter)
            .count()
            .get_result(&mut conn)?;

        let mut query = video_query(&selection.filter);
        query = match (selection.ordering, selection.filter.text.clone()) {
            (Ordering::Relevance, Some(text)) => query
                .order(
                    sql::<Float>(&format!(
                        "ts_rank({VIDEO_DOCUMENT}, plainto_tsquery('english', "
                    ))
                    .bind::<Text, _>(text)
                    .sql("))")
                    .desc(),
                )
                .then_order_by(videos::created_at.desc()),
            _ => query.order((videos::created_at.desc(), videos::id.desc())),
        };
        if let Some(window) = selection.window {
            query = query.offset(window.offset).limit(window.limit);
        }

        let rows = query.select(Video::as_select()).load(&mut conn)?;
        Ok(Slice { rows, total })
    }

    fn insert_comment(&self, comment: &Comment) -> StoreResult<Comment> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(comments::table)
            .values(comment)
            .returning(Comment::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let mut conn = self.conn()?;
        Ok(comments::table
            .find(id)
            .select(Comment::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(comments::table.find(id))
            .set((
                comments::content.eq(content),
                comments::updated_at.eq(Utc::now()),
            ))
            .returning(Comment::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            diesel::delete(likes::table.filter(likes::comment_id.eq(id))).execute(conn)?;
            let deleted = diesel::delete(comments::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
    }

    fn select_comments(&self, selection: &Selection<CommentFilter>) -> StoreResult<Slice<Comment>> {
        let mut conn = self.conn()?;
        let total: i64 = comment_query(&selection.filter)
            .count()
            .get_result(&mut conn)?;

        let mut query =
            comment_query(&selection.filter).order((comments::created_at.desc(), comments::id.desc()));
        if let Some(window) = selection.window {
            query = query.offset(window.offset).limit(window.limit);
        }

        let rows = query.select(Comment::as_select()).load(&mut conn)?;
        Ok(Slice { rows, total })
    }

    fn insert_tweet(&self, tweet: &Tweet) -> StoreResult<Tweet> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(tweets::table)
            .values(tweet)
            .returning(Tweet::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_tweet(&self, id: Uuid) -> StoreResult<Option<Tweet>> {
        let mut conn = self.conn()?;
        Ok(tweets::table
            .find(id)
            .select(Tweet::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_tweet(&self, id: Uuid, content: &str) -> StoreResult<Option<Tweet>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(tweets::table.find(id))
            .set((tweets::content.eq(content), tweets::updated_at.eq(Utc::now())))
            .returning(Tweet::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn delete_tweet(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        conn.transaction::<_, StoreError, _>(|conn| {
            diesel::delete(likes::table.filter(likes::tweet_id.eq(id))).execute(conn)?;
            let deleted = diesel::delete(tweets::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
    }

    fn select_tweets(&self, selection: &Selection<TweetFilter>) -> StoreResult<Slice<Tweet>> {
        let mut conn = self.conn()?;
        let total: i64 = tweet_query(&selection.filter)
            .count()
            .get_result(&mut conn)?;

        let mut query = tweet_query(&selection.filter);
        query = match (selection.ordering, selection.filter.text.clone()) {
            (Ordering::Relevance, Some(text)) => query
                .order(
                    sql::<Float>(&format!(
                        "ts_rank({TWEET_DOCUMENT}, plainto_tsquery('english', "
                    ))
                    .bind::<Text, _>(text)
                    .sql("))")
                    .desc(),
                )
                .then_order_by(tweets::created_at.desc()),
            _ => query.order((tweets::created_at.desc(), tweets::id.desc())),
        };
        if let Some(window) = selection.window {
            query = query.offset(window.offset).limit(window.limit);
        }

        let rows = query.select(Tweet::as_select()).load(&mut conn)?;
        Ok(Slice { rows, total })
    }

    fn find_like(&self, liked_by: Uuid, target: LikeTarget) -> StoreResult<Option<Like>> {
        let query = likes::table
            .filter(likes::liked_by.eq(liked_by))
            .select(Like::as_select())
            .into_boxed();
        let query = match target {
            LikeTarget::Video(id) => query.filter(likes::video_id.eq(id)),
            LikeTarget::Comment(id) => query.filter(likes::comment_id.eq(id)),
            LikeTarget::Tweet(id) => query.filter(likes::tweet_id.eq(id)),
        };

        let mut conn = self.conn()?;
        Ok(query.first(&mut conn).optional()?)
    }

    fn insert_like(&self, like: &Like) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(likes::table)
            .values(like)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    fn delete_like(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(likes::table.find(id)).execute(&mut conn)? > 0)
    }

    fn like_summaries(
        &self,
        kind: LikeKind,
        ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<HashMap<Uuid, LikeSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn()?;
        let conn = &mut conn;

        Ok(match kind {
            LikeKind::Video => like_summaries_for!(conn, video_id, ids, viewer),
            LikeKind::Comment => like_summaries_for!(conn, comment_id, ids, viewer),
            LikeKind::Tweet => like_summaries_for!(conn, tweet_id, ids, viewer),
        })
    }

    fn liked_video_ids(&self, liked_by: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn()?;
        let ids: Vec<Option<Uuid>> = likes::table
            .filter(likes::liked_by.eq(liked_by))
            .filter(likes::video_id.is_not_null())
            .order((likes::created_at.desc(), likes::id.desc()))
            .select(likes::video_id)
            .load(&mut conn)?;

        Ok(ids.into_iter().flatten().collect())
    }

    fn find_subscription(&self, subscriber: Uuid, channel: Uuid) -> StoreResult<Option<Subscription>> {
        let mut conn = self.conn()?;
        Ok(subscriptions::table
            .filter(subscriptions::subscriber_id.eq(subscriber))
            .filter(subscriptions::channel_id.eq(channel))
            .select(Subscription::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(subscriptions::table)
            .values(subscription)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    fn delete_subscription(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(subscriptions::table.find(id)).execute(&mut conn)? > 0)
    }

    fn subscribers_of(&self, channel: Uuid) -> StoreResult<Vec<Subscription>> {
        let mut conn = self.conn()?;
        Ok(subscriptions::table
            .filter(subscriptions::channel_id.eq(channel))
            .order(subscriptions::created_at.asc())
            .select(Subscription::as_select())
            .load(&mut conn)?)
    }

    fn subscriptions_of(&self, subscriber: Uuid) -> StoreResult<Vec<Subscription>> {
        let mut conn = self.conn()?;
        Ok(subscriptions::table
            .filter(subscriptions::subscriber_id.eq(subscriber))
            .order(subscriptions::created_at.asc())
            .select(Subscription::as_select())
            .load(&mut conn)?)
    }

    fn count_subscribers(&self, channel: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(subscriptions::table
            .filter(subscriptions::channel_id.eq(channel))
            .count()
            .get_result(&mut conn)?)
    }

    fn count_subscriptions(&self, subscriber: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        Ok(subscriptions::table
            .filter(subscriptions::subscriber_id.eq(subscriber))
            .count()
            .get_result(&mut conn)?)
    }

    fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<Playlist> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(playlists::table)
            .values(playlist)
            .returning(Playlist::as_returning())
            .get_result(&mut conn)?)
    }

    fn find_playlist(&self, id: Uuid) -> StoreResult<Option<Playlist>> {
        let mut conn = self.conn()?;
        Ok(playlists::table
            .find(id)
            .select(Playlist::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_playlist(&self, id: Uuid, name: &str, description: &str) -> StoreResult<Option<Playlist>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(playlists::table.find(id))
            .set((
                playlists::name.eq(name),
                playlists::description.eq(description),
                playlists::updated_at.eq(Utc::now()),
            ))
            .returning(Playlist::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn delete_playlist(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(playlists::table.find(id)).execute(&mut conn)? > 0)
    }

    fn add_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>> {
        let mut conn = self.conn()?;
        diesel::sql_query(
            "UPDATE playlists SET videos = array_append(videos, $1), updated_at = now() \
             WHERE id = $2 AND NOT ($1 = ANY(videos))",
        )
        .bind::<SqlUuid, _>(video_id)
        .bind::<SqlUuid, _>(id)
        .execute(&mut conn)?;

        Ok(playlists::table
            .find(id)
            .select(Playlist::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn remove_playlist_video(&self, id: Uuid, video_id: Uuid) -> StoreResult<Option<Playlist>> {
        let mut conn = self.conn()?;
        diesel::sql_query(
            "UPDATE playlists SET videos = array_remove(videos, $1), updated_at = now() \
             WHERE id = $2",
        )
        .bind::<SqlUuid, _>(video_id)
        .bind::<SqlUuid, _>(id)
        .execute(&mut conn)?;

        Ok(playlists::table
            .find(id)
            .select(Playlist::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn playlists_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Playlist>> {
        let mut conn = self.conn()?;
        Ok(playlists::table
            .filter(playlists::owner_id.eq(owner))
            .order(playlists::created_at.asc())
            .select(Playlist::as_select())
            .load(&mut conn)?)
    }
}

/// Needs `DATABASE_URL` pointing at a database with the `migrations/` schema applied.
#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a migrated database");
        PgStore::connect(&url, 2).unwrap()
    }

    fn user(store: &PgStore, name: &str) -> User {
        let now = Utc::now();
        let name = format!("{name}{}", &Uuid::new_v4().simple().to_string()[..8]);
        store
            .insert_user(&User {
                id: Uuid::new_v4(),
                username: name.clone(),
                email: format!("{name}@example.com"),
                password: "hash".to_string(),
                full_name: name.to_uppercase(),
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

    fn video(store: &PgStore, owner: Uuid, title: &str) -> Video {
        let now = Utc::now();
        store
            .insert_video(&Video {
                id: Uuid::new_v4(),
                owner_id: owner,
                title: title.to_string(),
                description: format!("all about {title}"),
                category: "Music".to_string(),
                video_url: "http://media/v.mp4".to_string(),
                video_storage_id: "v.mp4".to_string(),
                thumbnail_url: "http://media/t.png".to_string(),
                thumbnail_storage_id: "t.png".to_string(),
                duration: 12.5,
                views: 0,
                is_published: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap()
    }

    #[test]
    #[ignore = "needs a migrated postgres at DATABASE_URL"]
    fn rotation_is_conditional_on_the_presented_token() {
        let store = store();
        let alice = user(&store, "alice");
        store.set_refresh_token(alice.id, Some("first")).unwrap();

        assert!(!store.rotate_refresh_token(alice.id, "stale", "second").unwrap());
        assert!(store.rotate_refresh_token(alice.id, "first", "second").unwrap());
        assert!(!store.rotate_refresh_token(alice.id, "first", "third").unwrap());

        let stored = store.find_user(alice.id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("second"));
    }

    #[test]
    #[ignore = "needs a migrated postgres at DATABASE_URL"]
    fn record_watch_moves_the_video_to_the_front() {
        let store = store();
        let alice = user(&store, "alice");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        store.record_watch(alice.id, a).unwrap();
        store.record_watch(alice.id, b).unwrap();
        store.record_watch(alice.id, a).unwrap();

        let stored = store.find_user(alice.id).unwrap().unwrap();
        assert_eq!(stored.watch_history, vec![a, b]);
    }

    #[test]
    #[ignore = "needs a migrated postgres at DATABASE_URL"]
    fn delete_video_cascades_in_one_transaction() {
        let store = store();
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        let clip = video(&store, alice.id, "clip");
        let keeper = video(&store, alice.id, "keeper");

        let now = Utc::now();
        let comment = store
            .insert_comment(&Comment {
                id: Uuid::new_v4(),
                content: "nice".to_string(),
                owner_id: bob.id,
                video_id: clip.id,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store.insert_like(&Like::new(bob.id, LikeTarget::Video(clip.id))).unwrap();
        store.insert_like(&Like::new(alice.id, LikeTarget::Comment(comment.id))).unwrap();
        store.record_watch(bob.id, keeper.id).unwrap();
        store.record_watch(bob.id, clip.id).unwrap();

        let playlist = store
            .insert_playlist(&Playlist {
                id: Uuid::new_v4(),
                name: "mix".to_string(),
                description: String::new(),
                owner_id: bob.id,
                videos: vec![clip.id, keeper.id],
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        assert!(store.delete_video(clip.id).unwrap());

        assert!(store.find_video(clip.id).unwrap().is_none());
        assert!(store.find_like(bob.id, LikeTarget::Video(clip.id)).unwrap().is_none());
        assert!(store.find_like(alice.id, LikeTarget::Comment(comment.id)).unwrap().is_none());
        assert!(store.find_comment(comment.id).unwrap().is_none());
        assert_eq!(store.find_user(bob.id).unwrap().unwrap().watch_history, vec![keeper.id]);
        assert_eq!(store.find_playlist(playlist.id).unwrap().unwrap().videos, vec![keeper.id]);
        assert!(!store.delete_video(clip.id).unwrap());
    }
}
