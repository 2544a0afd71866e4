diesel::table! {
    comments (id) {
        id -> Uuid,
        content -> Varchar,
        owner_id -> Uuid,
        video_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    likes (id) {
        id -> Uuid,
        liked_by -> Uuid,
        video_id -> Nullable<Uuid>,
        comment_id -> Nullable<Uuid>,
        tweet_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    playlists (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Varchar,
        owner_id -> Uuid,
        videos -> Array<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    subscriptions (id) {
        id -> Uuid,
        subscriber_id -> Uuid,
        channel_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tweets (id) {
        id -> Uuid,
        content -> Varchar,
        owner_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        password -> Varchar,
        full_name -> Varchar,
        avatar_url -> Varchar,
        avatar_storage_id -> Varchar,
        cover_image_url -> Nullable<Varchar>,
        cover_image_storage_id -> Nullable<Varchar>,
        watch_history -> Array<Uuid>,
        refresh_token -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    videos (id) {
        id -> Uuid,
        owner_id -> Uuid,
        title -> Varchar,
        description -> Varchar,
        category -> Varchar,
        video_url -> Varchar,
        video_storage_id -> Varchar,
        thumbnail_url -> Varchar,
        thumbnail_storage_id -> Varchar,
        duration -> Float8,
        views -> Int8,
        is_published -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(comments -> videos (video_id));
diesel::joinable!(likes -> users (liked_by));
diesel::joinable!(playlists -> users (owner_id));
diesel::joinable!(tweets -> users (owner_id));
diesel::joinable!(videos -> users (owner_id));

diesel::allow_tables_to_appear_in_same_query!(
    comments,
    likes,
    playlists,
    subscriptions,
    tweets,
    users,
    videos,
);
