use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::jwt::ClaimsCodec,
    domain::entities::{
        refresh_family::FamilyRecord,
        token::{ACCESS_TOKEN_TTL, IdentityClaims, REFRESH_TOKEN_TTL, RefreshClaims, TokenPair},
        user::UserProfile,
    },
};

/// Lineage tracking for refresh tokens.
///
/// Implementations must make `record_rotation` an atomic compare-and-set per family:
/// two callers presenting the same expected head can never both succeed. Mutation of
/// one family must not block mutation of another.
#[async_trait]
pub trait RefreshFamilyStore: Send + Sync {
    async fn create_family(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()>;

    /// Family whose current head is `token_id`. Superseded token IDs are not indexed.
    async fn family_of(&self, token_id: Uuid) -> AppResult<Option<Uuid>>;

    async fn get(&self, family_id: Uuid) -> AppResult<Option<FamilyRecord>>;

    /// Replaces the family head with `new_token_id` if and only if the head is still
    /// `expected_current_token_id`. Fails with `RotationConflict` otherwise,
    /// `FamilyRevoked` for a revoked family and `FamilyNotFound` for an unknown one.
    async fn record_rotation(
        &self,
        family_id: Uuid,
        expected_current_token_id: Uuid,
        new_token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()>;

    /// Marks the family revoked. Idempotent and permanent.
    async fn revoke_family(&self, family_id: Uuid) -> AppResult<()>;
}

/// Source of public user profiles. Never returns credential material.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_profile(&self, uid: Uuid) -> AppResult<Option<UserProfile>>;
}

#[derive(Clone)]
pub struct TokenUseCases {
    codec: ClaimsCodec,
    families: Arc<dyn RefreshFamilyStore>,
    users: Arc<dyn UserDirectory>,
}

impl TokenUseCases {
    pub fn new(
        codec: ClaimsCodec,
        families: Arc<dyn RefreshFamilyStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            codec,
            families,
            users,
        }
    }

    /// Issues an identity token and a refresh token for `user`.
    ///
    /// Without `previous_refresh_token_id` a new family is started (fresh login).
    /// With it, the new refresh token joins the previous token's family and becomes
    /// its head, provided the previous token is still the head.
    #[instrument(skip(self, user), fields(uid = %user.uid))]
    pub async fn issue(
        &self,
        user: &UserProfile,
        previous_refresh_token_id: Option<Uuid>,
    ) -> AppResult<TokenPair> {
        let lineage = match previous_refresh_token_id {
            None => None,
            Some(previous) => {
                let family_id = self
                    .families
                    .family_of(previous)
                    .await?
                    .ok_or(AppError::FamilyNotFound)?;
                Some((family_id, previous))
            }
        };
        self.issue_into(user, lineage).await
    }

    /// Signs a pair and records it: a new family for `None`, otherwise a rotation of
    /// `(family_id, previous head)`.
    async fn issue_into(
        &self,
        user: &UserProfile,
        lineage: Option<(Uuid, Uuid)>,
    ) -> AppResult<TokenPair> {
        let now = self.codec.now();
        let iat = now.unix_timestamp();

        let access_token = self.codec.encode_identity(&IdentityClaims {
            user: user.clone(),
            iat,
            exp: (now + ACCESS_TOKEN_TTL).unix_timestamp(),
        })?;

        let family_id = lineage.map_or_else(Uuid::new_v4, |(family_id, _)| family_id);

        let token_id = Uuid::new_v4();
        let refresh_token = self.codec.encode_refresh(&RefreshClaims {
            sub: user.uid,
            jti: token_id,
            fam: family_id,
            iat,
            exp: (now + REFRESH_TOKEN_TTL).unix_timestamp(),
        })?;

        match lineage {
            None => {
                self.families
                    .create_family(family_id, user.uid, token_id, now)
                    .await?;
                info!(%family_id, "Started refresh token family");
            }
            Some((_, previous)) => {
                self.families
                    .record_rotation(family_id, previous, token_id, now)
                    .await?;
            }
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_in: REFRESH_TOKEN_TTL.whole_seconds(),
        })
    }

    /// Stateless check of an identity token. Does not touch the family store.
    pub fn verify_identity(&self, token: &str) -> AppResult<IdentityClaims> {
        self.codec.decode_identity(token)
    }

    /// Stateless check of a refresh token. Family state is only consulted by `rotate`.
    pub fn verify_refresh(&self, token: &str) -> AppResult<RefreshClaims> {
        self.codec.decode_refresh(token)
    }

    /// Current profile of the principal named by an identity token.
    pub async fn current_user(&self, identity_token: &str) -> AppResult<UserProfile> {
        let claims = self.verify_identity(identity_token)?;
        self.users
            .get_profile(claims.user.uid)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Exchanges the head refresh token of a family for a new token pair.
    ///
    /// Presenting any token other than the current head revokes the whole family, as
    /// does losing a concurrent rotation race on the same head.
    #[instrument(skip(self, presented))]
    pub async fn rotate(&self, presented: &str) -> AppResult<TokenPair> {
        let claims = self.verify_refresh(presented)?;

        let record = self
            .families
            .get(claims.fam)
            .await?
            .ok_or(AppError::FamilyNotFound)?;
        if record.revoked {
            warn!(family_id = %claims.fam, "Refresh token presented for revoked family");
            return Err(AppError::FamilyRevoked);
        }
        if !record.is_head(claims.jti) || record.user_id != claims.sub {
            warn!(
                family_id = %claims.fam,
                token_id = %claims.jti,
                "Refresh token reuse detected, revoking family"
            );
            self.families.revoke_family(claims.fam).await?;
            return Err(AppError::FamilyRevoked);
        }

        let user = self
            .users
            .get_profile(claims.sub)
            .await?
            .ok_or(AppError::NotFound)?;

        match self.issue_into(&user, Some((claims.fam, claims.jti))).await {
            Err(AppError::RotationConflict) => {
                warn!(
                    family_id = %claims.fam,
                    "Concurrent rotation of the same refresh token, revoking family"
                );
                self.families.revoke_family(claims.fam).await?;
                Err(AppError::RotationConflict)
            }
            result => result,
        }
    }

    /// Signs out: revokes the family of a valid refresh token.
    #[instrument(skip(self, presented))]
    pub async fn revoke(&self, presented: &str) -> AppResult<()> {
        let claims = self.verify_refresh(presented)?;
        self.families.revoke_family(claims.fam).await?;
        info!(family_id = %claims.fam, "Revoked refresh token family");
        Ok(())
    }
}
