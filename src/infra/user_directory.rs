use std::{
    collections::HashMap,
    path::Path,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::user::UserProfile,
    use_cases::tokens::UserDirectory,
};

/// User directory held in memory, optionally seeded from a JSON file of profiles.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserProfile>) -> Self {
        let map = users.into_iter().map(|u| (u.uid, u)).collect();
        Self {
            users: RwLock::new(map),
        }
    }

    /// Loads a JSON array of profiles. Unknown fields (e.g. a password hash) make
    /// the file invalid rather than being dropped silently.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!("cannot read user directory {}: {e}", path.display()))
        })?;
        let users: Vec<UserProfile> = serde_json::from_str(&raw).map_err(|e| {
            AppError::InvalidInput(format!("invalid user directory {}: {e}", path.display()))
        })?;
        Ok(Self::with_users(users))
    }

    pub fn insert(&self, user: UserProfile) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.uid, user);
    }

    pub fn len(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_profile(&self, uid: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&uid)
            .cloned())
    }
}
