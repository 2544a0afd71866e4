use actix_multipart::Multipart;
use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::media::{MediaKind, StoredMedia};
use crate::helpers::multipart_parsing::{attempt_parse_multipart, MultipartFile};
use crate::helpers::response::{self, ApiResponse};
use crate::helpers::tokens::TokenPair;
use crate::middleware::auth::{AuthUser, Viewer, ACCESS_COOKIE};
use crate::models::{ChannelProfile, User, UserChanges};
use crate::query::{videos_in_order, Join};
use crate::routes::{discard_media, require_media};
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(true)
        .path("/")
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

fn with_session<T: Serialize>(tokens: &TokenPair, data: T, message: &str) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .cookie(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()))
        .json(ApiResponse::new(StatusCode::OK, data, message))
}

fn has_whitespace(value: &str) -> bool {
    value.chars().any(char::is_whitespace)
}

#[derive(Validate)]
struct RegisterInfo {
    #[validate(length(min = 1, max = 100))]
    full_name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 1, max = 50))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
}

#[post("/register")]
pub async fn register(payload: Multipart, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let mut form = attempt_parse_multipart(payload, &state.upload_dir).await?;

    let info = RegisterInfo {
        full_name: form.text("fullName").unwrap_or_default().to_string(),
        email: form.text("email").unwrap_or_default().to_lowercase(),
        username: form.text("username").unwrap_or_default().to_lowercase(),
        password: form.fields.get("password").cloned().unwrap_or_default(),
    };

    if [&info.full_name, &info.email, &info.username, &info.password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if has_whitespace(&info.username) {
        return Err(ApiError::bad_request("Username cannot contain spaces"));
    }
    info.validate()?;

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    require_media(&avatar_file, MediaKind::Image, "Avatar")?;

    let cover_file = form.take_file("coverImage");
    if let Some(file) = &cover_file {
        require_media(file, MediaKind::Image, "Cover image")?;
    }

    let (email, username) = (info.email.clone(), info.username.clone());
    let taken = state
        .blocking(move |store, _| {
            Ok(store
                .find_user_by_identity(Some(&email), Some(&username))?
                .is_some())
        })
        .await?;
    if taken {
        return Err(ApiError::Conflict(
            "User with this email or username already exists".to_string(),
        ));
    }

    let avatar = state.media.upload(&avatar_file, MediaKind::Image).await?;
    let cover_image = match &cover_file {
        Some(file) => match state.media.upload(file, MediaKind::Image).await {
            Ok(stored) => Some(stored),
            Err(err) => {
                discard_media(&state, vec![(avatar.storage_id.clone(), MediaKind::Image)]).await;
                return Err(err.into());
            }
        },
        None => None,
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: info.username,
        email: info.email,
        password: String::new(),
        full_name: info.full_name,
        avatar: avatar.media_ref(),
        cover_image: cover_image.as_ref().map(StoredMedia::media_ref),
        watch_history: Vec::new(),
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };
    let password = info.password;

    let created = state
        .blocking(move |store, sessions| {
            let user = User {
                password: sessions.hash_password(&password)?,
                ..user
            };
            Ok(store.insert_user(&user)?)
        })
        .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(response::created(user, "User registered successfully"))
        }
        Err(err) => {
            let mut uploaded = vec![(avatar.storage_id, MediaKind::Image)];
            if let Some(cover_image) = cover_image {
                uploaded.push((cover_image.storage_id, MediaKind::Image));
            }
            discard_media(&state, uploaded).await;
            Err(err)
        }
    }
}

#[derive(Deserialize)]
pub struct LoginInfo {
    email: Option<String>,
    username: Option<String>,
    password: String,
}

#[derive(Serialize)]
struct LoginData {
    user: User,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[post("/login")]
pub async fn login(data: web::Json<LoginInfo>, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let LoginInfo {
        email,
        username,
        password,
    } = data.into_inner();

    let outcome = state
        .blocking(move |store, sessions| {
            sessions.login(store, email.as_deref(), username.as_deref(), &password)
        })
        .await?;

    let tokens = outcome.tokens.clone();
    let data = LoginData {
        user: outcome.user,
        tokens: outcome.tokens,
    };

    Ok(with_session(&tokens, data, "User logged in successfully"))
}

#[post("/logout")]
pub async fn logout(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user_id = user.id;
    state
        .blocking(move |store, sessions| sessions.logout(store, user_id))
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(ApiResponse::new(
            StatusCode::OK,
            serde_json::json!({}),
            "User logged out successfully",
        )))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshInfo {
    refresh_token: Option<String>,
}

#[post("/refresh-token")]
pub async fn refresh_token(
    req: HttpRequest,
    data: Option<web::Json<RefreshInfo>>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let presented = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| data.and_then(|data| data.into_inner().refresh_token))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let tokens = state
        .blocking(move |store, sessions| sessions.refresh(store, &presented))
        .await?;

    Ok(with_session(&tokens, tokens.clone(), "Access token refreshed"))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInfo {
    #[validate(length(min = 1))]
    old_password: String,
    #[validate(length(min = 1))]
    new_password: String,
}

#[post("/change-password")]
pub async fn change_password(
    user: AuthUser,
    data: web::Json<ChangePasswordInfo>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    data.validate()?;

    let user_id = user.id;
    let ChangePasswordInfo {
        old_password,
        new_password,
    } = data.into_inner();

    state
        .blocking(move |store, sessions| {
            sessions.change_password(store, user_id, &old_password, &new_password)
        })
        .await?;

    Ok(response::ok(serde_json::json!({}), "Password changed successfully"))
}

#[get("/current-user")]
pub async fn current_user(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user_id = user.id;
    let user = state
        .blocking(move |store, _| {
            store
                .find_user(user_id)?
                .ok_or_else(|| ApiError::not_found("User does not exist"))
        })
        .await?;

    Ok(response::ok(user, "Current user fetched successfully"))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetailsInfo {
    #[validate(length(min = 1, max = 100))]
    full_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    username: Option<String>,
    #[validate(email)]
    email: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[patch("/update-details")]
pub async fn update_details(
    user: AuthUser,
    data: web::Json<UpdateDetailsInfo>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let data = data.into_inner();
    let data = UpdateDetailsInfo {
        full_name: present(data.full_name),
        username: present(data.username).map(|username| username.to_lowercase()),
        email: present(data.email).map(|email| email.to_lowercase()),
    };

    if data.username.as_deref().is_some_and(has_whitespace) {
        return Err(ApiError::bad_request("Username cannot contain spaces"));
    }
    data.validate()?;

    let changes = UserChanges {
        full_name: data.full_name,
        username: data.username,
        email: data.email,
    };
    if changes.is_empty() {
        return Err(ApiError::bad_request(
            "At least one field (fullName, username, or email) must be provided to update",
        ));
    }

    let user_id = user.id;
    let user = state
        .blocking(move |store, _| {
            store
                .update_user_details(user_id, &changes)?
                .ok_or_else(|| ApiError::not_found("User does not exist"))
        })
        .await?;

    Ok(response::ok(user, "Account details updated successfully"))
}

#[derive(Debug, Clone, Copy)]
enum ProfileImage {
    Avatar,
    CoverImage,
}

/// Stores the new image, points the user at it and drops the old one.
async fn replace_profile_image(
    state: &AppState,
    user_id: Uuid,
    file: MultipartFile,
    slot: ProfileImage,
) -> ApiResult<User> {
    let stored = state.media.upload(&file, MediaKind::Image).await?;
    let media = stored.media_ref();

    let result = state
        .blocking(move |store, _| {
            let previous = store
                .find_user(user_id)?
                .ok_or_else(|| ApiError::not_found("User does not exist"))?;

            let updated = match slot {
                ProfileImage::Avatar => store.set_avatar(user_id, &media)?,
                ProfileImage::CoverImage => store.set_cover_image(user_id, &media)?,
            }
            .ok_or_else(|| ApiError::not_found("User does not exist"))?;

            let replaced = match slot {
                ProfileImage::Avatar => Some(previous.avatar),
                ProfileImage::CoverImage => previous.cover_image,
            };

            Ok((updated, replaced))
        })
        .await;

    match result {
        Ok((user, replaced)) => {
            if let Some(replaced) = replaced {
                discard_media(state, vec![(replaced.storage_id, MediaKind::Image)]).await;
            }
            Ok(user)
        }
        Err(err) => {
            discard_media(state, vec![(stored.storage_id, MediaKind::Image)]).await;
            Err(err)
        }
    }
}

#[patch("/avatar-update")]
pub async fn update_avatar(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let mut form = attempt_parse_multipart(payload, &state.upload_dir).await?;
    let file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;
    require_media(&file, MediaKind::Image, "Avatar")?;

    let user = replace_profile_image(&state, user.id, file, ProfileImage::Avatar).await?;

    Ok(response::ok(user, "Avatar image updated successfully"))
}

#[patch("/coverImage-update")]
pub async fn update_cover_image(
    user: AuthUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let mut form = attempt_parse_multipart(payload, &state.upload_dir).await?;
    let file = form
        .take_file("coverImage")
        .ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;
    require_media(&file, MediaKind::Image, "Cover image")?;

    let user = replace_profile_image(&state, user.id, file, ProfileImage::CoverImage).await?;

    Ok(response::ok(user, "Cover image updated successfully"))
}

#[derive(Deserialize)]
pub struct ChannelParams {
    username: String,
}

#[get("/c/{username}")]
pub async fn channel_profile(
    params: web::Path<ChannelParams>,
    viewer: Viewer,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let username = params.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is missing"));
    }
    let viewer = viewer.id();

    let channel = state
        .blocking(move |store, _| {
            let user = store
                .find_user_by_username(&username)?
                .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

            let is_subscribed = match viewer {
                Some(viewer) => store.find_subscription(viewer, user.id)?.is_some(),
                None => false,
            };

            Ok(ChannelProfile {
                id: user.id,
                subscribers_count: store.count_subscribers(user.id)?,
                channels_subscribed_to_count: store.count_subscriptions(user.id)?,
                is_subscribed,
                username: user.username,
                full_name: user.full_name,
                email: user.email,
                avatar: user.avatar,
                cover_image: user.cover_image,
            })
        })
        .await?;

    Ok(response::ok(channel, "User channel fetched successfully"))
}

#[get("/history")]
pub async fn watch_history(user: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user_id = user.id;
    let videos = state
        .blocking(move |store, _| {
            let user = store
                .find_user(user_id)?
                .ok_or_else(|| ApiError::not_found("User does not exist"))?;

            Ok(videos_in_order(
                store,
                &user.watch_history,
                Some(user_id),
                &[Join::Owner],
            )?)
        })
        .await?;

    Ok(response::ok(videos, "Watch history fetched successfully"))
}
