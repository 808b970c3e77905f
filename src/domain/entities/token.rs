use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use super::user::UserProfile;

/// Lifetime of an identity token. Fixed policy, not configuration.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

/// Lifetime of a refresh token. Fixed policy, not configuration.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(3);

/// Claims of the short-lived identity token (RS256).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityClaims {
    pub user: UserProfile,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the refresh token (HS256).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub sub: Uuid,
    /// Token ID, unique per issued refresh token.
    pub jti: Uuid,
    /// Family ID, shared by every token rotated from the same login.
    pub fam: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Result of an issuance. A transfer object; nothing stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the refresh token expires.
    pub refresh_expires_in: i64,
}
