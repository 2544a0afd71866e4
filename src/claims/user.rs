use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token payload. Carries enough identity for handlers to skip a user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaim {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Refresh token payload. `jti` makes every minted token distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaim {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}
