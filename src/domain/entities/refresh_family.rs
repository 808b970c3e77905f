use time::OffsetDateTime;
use uuid::Uuid;

/// Lineage of refresh tokens descended from one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRecord {
    pub family_id: Uuid,
    pub user_id: Uuid,
    /// The only token of this family that may still be rotated.
    pub current_token_id: Uuid,
    /// One-way: once set, nothing clears it.
    pub revoked: bool,
    pub created_at: OffsetDateTime,
    pub rotated_at: Option<OffsetDateTime>,
}

impl FamilyRecord {
    pub fn new(family_id: Uuid, user_id: Uuid, token_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            family_id,
            user_id,
            current_token_id: token_id,
            revoked: false,
            created_at: now,
            rotated_at: None,
        }
    }

    pub fn is_head(&self, token_id: Uuid) -> bool {
        !self.revoked && self.current_token_id == token_id
    }
}
