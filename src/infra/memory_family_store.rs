use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{clock::Clock, jwt::CLOCK_SKEW_LEEWAY},
    domain::entities::{refresh_family::FamilyRecord, token::REFRESH_TOKEN_TTL},
    use_cases::tokens::RefreshFamilyStore,
};

const INDEX_SHARDS: usize = 16;

/// Process-local family store.
///
/// Records live in an arena keyed by family ID, each behind its own mutex, so
/// rotations of unrelated families never contend. The arena lock is only taken
/// to look up, insert or prune records. The head index is sharded by token ID and
/// is never locked while a family mutex is held.
pub struct InMemoryRefreshFamilyStore {
    families: RwLock<HashMap<Uuid, Arc<Mutex<FamilyRecord>>>>,
    heads: Vec<RwLock<HashMap<Uuid, Uuid>>>,
}

impl Default for InMemoryRefreshFamilyStore {
    fn default() -> Self {
        Self {
            families: RwLock::default(),
            heads: (0..INDEX_SHARDS).map(|_| RwLock::default()).collect(),
        }
    }
}

impl InMemoryRefreshFamilyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops live families whose head has expired at `now`. Every token of such a
    /// family is expired too, so none of them can reach the store again. Revoked
    /// families are kept.
    pub fn prune_expired(&self, now: OffsetDateTime) -> usize {
        let horizon = REFRESH_TOKEN_TTL + CLOCK_SKEW_LEEWAY;
        let mut expired_heads = Vec::new();
        {
            let mut families = self
                .families
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            families.retain(|_, entry| {
                let record = entry.lock().unwrap_or_else(PoisonError::into_inner);
                let issued_at = record.rotated_at.unwrap_or(record.created_at);
                let expired = !record.revoked && now >= issued_at + horizon;
                if expired {
                    expired_heads.push(record.current_token_id);
                }
                !expired
            });
        }
        for head in &expired_heads {
            self.unindex(*head);
        }
        expired_heads.len()
    }

    fn entry(&self, family_id: Uuid) -> Option<Arc<Mutex<FamilyRecord>>> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&family_id)
            .cloned()
    }

    fn shard(&self, token_id: Uuid) -> &RwLock<HashMap<Uuid, Uuid>> {
        &self.heads[token_id.as_bytes()[15] as usize % INDEX_SHARDS]
    }

    fn index(&self, token_id: Uuid, family_id: Uuid) {
        self.shard(token_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token_id, family_id);
    }

    fn unindex(&self, token_id: Uuid) {
        self.shard(token_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token_id);
    }
}

#[async_trait]
impl RefreshFamilyStore for InMemoryRefreshFamilyStore {
    async fn create_family(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let record = FamilyRecord::new(family_id, user_id, token_id, now);
        {
            let mut families = self
                .families
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if families.contains_key(&family_id) {
                return Err(AppError::Internal(format!(
                    "refresh family {family_id} already exists"
                )));
            }
            families.insert(family_id, Arc::new(Mutex::new(record)));
        }
        self.index(token_id, family_id);
        Ok(())
    }

    async fn family_of(&self, token_id: Uuid) -> AppResult<Option<Uuid>> {
        Ok(self
            .shard(token_id)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token_id)
            .copied())
    }

    async fn get(&self, family_id: Uuid) -> AppResult<Option<FamilyRecord>> {
        Ok(self
            .entry(family_id)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).clone()))
    }

    async fn record_rotation(
        &self,
        family_id: Uuid,
        expected_current_token_id: Uuid,
        new_token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let entry = self.entry(family_id).ok_or(AppError::FamilyNotFound)?;

        // Indexed before the swap so the new head resolves as soon as it is visible.
        self.index(new_token_id, family_id);

        let swapped = {
            let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
            if record.revoked {
                Err(AppError::FamilyRevoked)
            } else if record.current_token_id != expected_current_token_id {
                Err(AppError::RotationConflict)
            } else {
                record.current_token_id = new_token_id;
                record.rotated_at = Some(now);
                Ok(())
            }
        };

        match &swapped {
            Ok(()) => self.unindex(expected_current_token_id),
            Err(_) => self.unindex(new_token_id),
        }
        swapped
    }

    async fn revoke_family(&self, family_id: Uuid) -> AppResult<()> {
        if let Some(entry) = self.entry(family_id) {
            entry.lock().unwrap_or_else(PoisonError::into_inner).revoked = true;
        }
        Ok(())
    }
}

/// Periodically prunes expired families. Runs until the task is dropped.
pub async fn run_family_pruning_loop(
    store: Arc<InMemoryRefreshFamilyStore>,
    clock: Arc<dyn Clock>,
    every: std::time::Duration,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let pruned = store.prune_expired(clock.now());
        if pruned > 0 {
            info!(pruned, remaining = store.len(), "Pruned expired refresh token families");
        }
    }
}
