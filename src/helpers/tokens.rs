use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::Serialize;
use uuid::Uuid;

use crate::claims::user::{RefreshClaim, UserClaim};
use crate::errors::{ApiError, ApiResult};
use crate::models::User;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    /// Seconds.
    pub access_ttl: i64,
    pub refresh_secret: String,
    /// Seconds.
    pub refresh_ttl: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Issues, checks and rotates session tokens. Each user holds at most one
/// live refresh token; minting a new one retires the old.
pub struct SessionManager {
    settings: TokenSettings,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl SessionManager {
    pub fn new(settings: TokenSettings) -> Self {
        SessionManager {
            access_encoding: EncodingKey::from_secret(settings.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_secret.as_bytes()),
            settings,
        }
    }

    pub fn access_ttl(&self) -> i64 {
        self.settings.access_ttl
    }

    pub fn hash_password(&self, password: &str) -> ApiResult<String> {
        hash(password, self.settings.bcrypt_cost).map_err(|err| {
            tracing::error!("password hashing failed: {err}");
            ApiError::internal("Sorry, something went wrong on our end. Please try again.")
        })
    }

    pub fn login(
        &self,
        store: &dyn Store,
        email: Option<&str>,
        username: Option<&str>,
        password: &str,
    ) -> ApiResult<LoginOutcome> {
        let email = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
        let username = username
            .map(|u| u.trim().to_lowercase())
            .filter(|u| !u.is_empty());

        if email.is_none() && username.is_none() {
            return Err(ApiError::bad_request("username or email is required"));
        }

        let mut user = store
            .find_user_by_identity(email.as_deref(), username.as_deref())?
            .ok_or_else(|| ApiError::not_found("User does not exist"))?;

        if !verify(password, &user.password).unwrap_or(false) {
            return Err(ApiError::unauthorized("Invalid user credentials"));
        }

        let tokens = self.issue(&user)?;
        store.set_refresh_token(user.id, Some(&tokens.refresh_token))?;
        user.refresh_token = Some(tokens.refresh_token.clone());

        tracing::info!(user_id = %user.id, "user logged in");

        Ok(LoginOutcome { user, tokens })
    }

    pub fn verify(&self, token: &str) -> ApiResult<UserClaim> {
        decode::<UserClaim>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("rejected access token: {err}");
                ApiError::unauthorized("Invalid access token")
            })
    }

    /// Exchanges a live refresh token for a new pair. A token that was
    /// already rotated away, even by a concurrent request, is rejected.
    pub fn refresh(&self, store: &dyn Store, token: &str) -> ApiResult<TokenPair> {
        let claim = decode::<RefreshClaim>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

        let user = store
            .find_user(claim.id)?
            .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

        if user.refresh_token.as_deref() != Some(token) {
            return Err(ApiError::unauthorized("Refresh token is expired or used"));
        }

        let tokens = self.issue(&user)?;
        if !store.rotate_refresh_token(user.id, token, &tokens.refresh_token)? {
            return Err(ApiError::unauthorized("Refresh token is expired or used"));
        }

        Ok(tokens)
    }

    pub fn logout(&self, store: &dyn Store, user_id: Uuid) -> ApiResult<()> {
        store.set_refresh_token(user_id, None)?;
        Ok(())
    }

    pub fn change_password(
        &self,
        store: &dyn Store,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        let user = store
            .find_user(user_id)?
            .ok_or_else(|| ApiError::not_found("User does not exist"))?;

        if !verify(old_password, &user.password).unwrap_or(false) {
            return Err(ApiError::bad_request("Invalid old password"));
        }
        if old_password == new_password {
            return Err(ApiError::bad_request("New password must differ from the old one"));
        }

        let password_hash = self.hash_password(new_password)?;
        store.set_password(user_id, &password_hash)?;

        Ok(())
    }

    fn issue(&self, user: &User) -> ApiResult<TokenPair> {
        let now = Utc::now().timestamp();

        let user_claim = UserClaim {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            iat: now,
            exp: now + self.settings.access_ttl,
        };

        let jti: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();

        let refresh_claim = RefreshClaim {
            id: user.id,
            jti,
            iat: now,
            exp: now + self.settings.refresh_ttl,
        };

        let access_token = encode(&Header::default(), &user_claim, &self.access_encoding);
        let refresh_token = encode(&Header::default(), &refresh_claim, &self.refresh_encoding);

        match (access_token, refresh_token) {
            (Ok(access_token), Ok(refresh_token)) => Ok(TokenPair {
                access_token,
                refresh_token,
            }),
            _ => Err(ApiError::internal("Couldn't generate a JWT token. Sorry :(")),
        }
    }
}
