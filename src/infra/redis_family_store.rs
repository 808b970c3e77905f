use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::ConnectionManager};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::jwt::CLOCK_SKEW_LEEWAY,
    domain::entities::{refresh_family::FamilyRecord, token::REFRESH_TOKEN_TTL},
    use_cases::tokens::RefreshFamilyStore,
};

// KEYS: family, head index. ARGV: user id, head, created at, ttl, family id.
const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
redis.call('HSET', KEYS[1], 'user_id', ARGV[1], 'current', ARGV[2], 'revoked', '0', 'created_at', ARGV[3])
redis.call('EXPIRE', KEYS[1], ARGV[4])
redis.call('SET', KEYS[2], ARGV[5], 'EX', ARGV[4])
return 1
"#;

// KEYS: family, new head index, superseded head index.
// ARGV: expected head, new head, ttl, now, family id.
const ROTATE_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'current')
if not current then return 'missing' end
if redis.call('HGET', KEYS[1], 'revoked') == '1' then return 'revoked' end
if current ~= ARGV[1] then return 'conflict' end
redis.call('HSET', KEYS[1], 'current', ARGV[2], 'rotated_at', ARGV[4])
redis.call('EXPIRE', KEYS[1], ARGV[3])
redis.call('SET', KEYS[2], ARGV[5], 'EX', ARGV[3])
redis.call('DEL', KEYS[3])
return 'ok'
"#;

// Revoked families outlive their TTL so late replays keep failing.
const REVOKE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
redis.call('HSET', KEYS[1], 'revoked', '1')
redis.call('PERSIST', KEYS[1])
return 1
"#;

/// Family store shared between service instances through Redis.
///
/// A family is a hash at `refresh_family:{id}`; its current head maps back to it at
/// `refresh_token:{id}`. Creation and rotation each run as one server-side script,
/// which is the per-family critical section.
pub struct RedisRefreshFamilyStore {
    manager: ConnectionManager,
    create: Script,
    rotate: Script,
    revoke: Script,
    ttl_secs: u64,
}

impl RedisRefreshFamilyStore {
    pub async fn new(redis_url: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            AppError::Store(format!(
                "Redis connection failed (check redis password/URL): {e}"
            ))
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            AppError::Store(format!(
                "Redis auth/connection failed (check redis password/URL): {e}"
            ))
        })?;

        Ok(Self {
            manager,
            create: Script::new(CREATE_SCRIPT),
            rotate: Script::new(ROTATE_SCRIPT),
            revoke: Script::new(REVOKE_SCRIPT),
            ttl_secs: family_ttl_secs(),
        })
    }

    fn family_key(family_id: Uuid) -> String {
        format!("refresh_family:{family_id}")
    }

    fn token_key(token_id: Uuid) -> String {
        format!("refresh_token:{token_id}")
    }
}

/// Active families expire with their newest token.
fn family_ttl_secs() -> u64 {
    (REFRESH_TOKEN_TTL + CLOCK_SKEW_LEEWAY).whole_seconds() as u64
}

fn rotation_outcome(reply: &str) -> AppResult<()> {
    match reply {
        "ok" => Ok(()),
        "conflict" => Err(AppError::RotationConflict),
        "revoked" => Err(AppError::FamilyRevoked),
        "missing" => Err(AppError::FamilyNotFound),
        other => Err(AppError::Store(format!("unexpected rotation reply: {other}"))),
    }
}

fn parse_uuid(field: &str, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Store(format!("corrupt {field}: {e}")))
}

fn parse_timestamp(field: &str, raw: &str) -> AppResult<OffsetDateTime> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| AppError::Store(format!("corrupt {field}: {raw}")))
}

fn record_from_hash(family_id: Uuid, hash: &HashMap<String, String>) -> AppResult<FamilyRecord> {
    let field = |name: &str| {
        hash.get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::Store(format!("family {family_id} is missing {name}")))
    };

    Ok(FamilyRecord {
        family_id,
        user_id: parse_uuid("user_id", field("user_id")?)?,
        current_token_id: parse_uuid("current", field("current")?)?,
        revoked: field("revoked")? == "1",
        created_at: parse_timestamp("created_at", field("created_at")?)?,
        rotated_at: hash
            .get("rotated_at")
            .map(|raw| parse_timestamp("rotated_at", raw))
            .transpose()?,
    })
}

#[async_trait]
impl RefreshFamilyStore for RedisRefreshFamilyStore {
    async fn create_family(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let created: i64 = self
            .create
            .key(Self::family_key(family_id))
            .key(Self::token_key(token_id))
            .arg(user_id.to_string())
            .arg(token_id.to_string())
            .arg(now.unix_timestamp())
            .arg(self.ttl_secs)
            .arg(family_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        if created == 0 {
            return Err(AppError::Internal(format!(
                "refresh family {family_id} already exists"
            )));
        }
        Ok(())
    }

    async fn family_of(&self, token_id: Uuid) -> AppResult<Option<Uuid>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::token_key(token_id)).await?;
        raw.map(|value| parse_uuid("family id", &value)).transpose()
    }

    async fn get(&self, family_id: Uuid) -> AppResult<Option<FamilyRecord>> {
        let mut conn = self.manager.clone();
        let hash: HashMap<String, String> = conn.hgetall(Self::family_key(family_id)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        record_from_hash(family_id, &hash).map(Some)
    }

    async fn record_rotation(
        &self,
        family_id: Uuid,
        expected_current_token_id: Uuid,
        new_token_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let reply: String = self
            .rotate
            .key(Self::family_key(family_id))
            .key(Self::token_key(new_token_id))
            .key(Self::token_key(expected_current_token_id))
            .arg(expected_current_token_id.to_string())
            .arg(new_token_id.to_string())
            .arg(self.ttl_secs)
            .arg(now.unix_timestamp())
            .arg(family_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        rotation_outcome(&reply)
    }

    async fn revoke_family(&self, family_id: Uuid) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: i64 = self
            .revoke
            .key(Self::family_key(family_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            RedisRefreshFamilyStore::family_key(id),
            "refresh_family:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            RedisRefreshFamilyStore::token_key(id),
            "refresh_token:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn ttl_covers_a_full_refresh_lifetime() {
        assert_eq!(family_ttl_secs(), 259_205);
    }

    #[test]
    fn rotation_replies_map_to_errors() {
        assert!(rotation_outcome("ok").is_ok());
        assert!(matches!(
            rotation_outcome("conflict"),
            Err(AppError::RotationConflict)
        ));
        assert!(matches!(
            rotation_outcome("revoked"),
            Err(AppError::FamilyRevoked)
        ));
        assert!(matches!(
            rotation_outcome("missing"),
            Err(AppError::FamilyNotFound)
        ));
        assert!(matches!(rotation_outcome("??"), Err(AppError::Store(_))));
    }

    #[test]
    fn record_parses_from_hash() {
        let family_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let head = Uuid::new_v4();
        let hash: HashMap<String, String> = [
            ("user_id", user_id.to_string()),
            ("current", head.to_string()),
            ("revoked", "1".to_string()),
            ("created_at", "100".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let record = record_from_hash(family_id, &hash).unwrap();
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.current_token_id, head);
        assert!(record.revoked);
        assert_eq!(record.created_at.unix_timestamp(), 100);
        assert!(record.rotated_at.is_none());
    }

    #[test]
    fn corrupt_hash_is_a_store_error() {
        let mut hash = HashMap::new();
        hash.insert("user_id".to_string(), "not-a-uuid".to_string());
        assert!(matches!(
            record_from_hash(Uuid::new_v4(), &hash),
            Err(AppError::Store(_))
        ));
    }

    // Against a live server. Keys are fresh UUIDs, so a shared instance is fine.
    mod live {
        use std::sync::Arc;

        use super::*;

        async fn connect() -> RedisRefreshFamilyStore {
            let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
            RedisRefreshFamilyStore::new(&url).await.unwrap()
        }

        fn at(secs: i64) -> OffsetDateTime {
            OffsetDateTime::from_unix_timestamp(secs).unwrap()
        }

        #[tokio::test]
        #[ignore] // Only run with REDIS_URL set
        async fn create_and_lookup() {
            let store = connect().await;
            let (family, user, token) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
            store.create_family(family, user, token, at(1_000)).await.unwrap();

            assert_eq!(store.family_of(token).await.unwrap(), Some(family));
            let record = store.get(family).await.unwrap().unwrap();
            assert_eq!(record.user_id, user);
            assert_eq!(record.current_token_id, token);
            assert_eq!(record.created_at, at(1_000));
            assert!(!record.revoked);
            assert!(record.rotated_at.is_none());

            assert!(matches!(
                store
                    .create_family(family, Uuid::new_v4(), Uuid::new_v4(), at(1_000))
                    .await,
                Err(AppError::Internal(_))
            ));
            let record = store.get(family).await.unwrap().unwrap();
            assert_eq!(record.user_id, user);
        }

        #[tokio::test]
        #[ignore] // Only run with REDIS_URL set
        async fn rotation_is_compare_and_set() {
            let store = connect().await;
            let family = Uuid::new_v4();
            let (t0, t1, t2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
            store
                .create_family(family, Uuid::new_v4(), t0, at(0))
                .await
                .unwrap();

            store.record_rotation(family, t0, t1, at(5)).await.unwrap();
            assert!(matches!(
                store.record_rotation(family, t0, t2, at(6)).await,
                Err(AppError::RotationConflict)
            ));

            let record = store.get(family).await.unwrap().unwrap();
            assert_eq!(record.current_token_id, t1);
            assert_eq!(record.rotated_at, Some(at(5)));
            assert_eq!(store.family_of(t1).await.unwrap(), Some(family));
            assert_eq!(store.family_of(t0).await.unwrap(), None);
            assert_eq!(store.family_of(t2).await.unwrap(), None);
        }

        #[tokio::test]
        #[ignore] // Only run with REDIS_URL set
        async fn revocation_is_permanent() {
            let store = connect().await;
            let (family, t0) = (Uuid::new_v4(), Uuid::new_v4());
            store
                .create_family(family, Uuid::new_v4(), t0, at(0))
                .await
                .unwrap();

            store.revoke_family(family).await.unwrap();
            store.revoke_family(family).await.unwrap();
            assert!(matches!(
                store.record_rotation(family, t0, Uuid::new_v4(), at(1)).await,
                Err(AppError::FamilyRevoked)
            ));
            assert!(store.get(family).await.unwrap().unwrap().revoked);

            let mut conn = store.manager.clone();
            let ttl: i64 = conn
                .ttl(RedisRefreshFamilyStore::family_key(family))
                .await
                .unwrap();
            assert_eq!(ttl, -1);
        }

        #[tokio::test]
        #[ignore] // Only run with REDIS_URL set
        async fn unknown_family() {
            let store = connect().await;
            assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
            assert!(store.revoke_family(Uuid::new_v4()).await.is_ok());
            assert!(matches!(
                store
                    .record_rotation(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), at(0))
                    .await,
                Err(AppError::FamilyNotFound)
            ));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        #[ignore] // Only run with REDIS_URL set
        async fn concurrent_swaps_on_one_head_have_one_winner() {
            let store = Arc::new(connect().await);
            let (family, t0) = (Uuid::new_v4(), Uuid::new_v4());
            store
                .create_family(family, Uuid::new_v4(), t0, at(0))
                .await
                .unwrap();

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let next = Uuid::new_v4();
                        store
                            .record_rotation(family, t0, next, at(1))
                            .await
                            .map(|()| next)
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(next) => winners.push(next),
                    Err(AppError::RotationConflict) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            assert_eq!(winners.len(), 1);
            let record = store.get(family).await.unwrap().unwrap();
            assert_eq!(record.current_token_id, winners[0]);
        }
    }
}
