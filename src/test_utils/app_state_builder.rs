//! Builders for use-case and HTTP-level tests.
//!
//! `TestTokens` wires `TokenUseCases` to in-memory stores and a `FixedClock`, and keeps
//! handles on all of them so tests can inspect or mutate state directly.
//! `TestAppStateBuilder` wraps the same wiring in an `AppState`.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use axum::http::HeaderValue;

use crate::{
    adapters::http::app_state::AppState,
    application::{jwt::ClaimsCodec, keys::KeyMaterial},
    domain::entities::user::UserProfile,
    infra::{
        config::AppConfig, memory_family_store::InMemoryRefreshFamilyStore,
        user_directory::InMemoryUserDirectory,
    },
    test_utils::{FixedClock, create_test_user, test_key_material, test_refresh_secret},
    use_cases::tokens::TokenUseCases,
};

pub struct TestTokens {
    pub use_cases: TokenUseCases,
    pub families: Arc<InMemoryRefreshFamilyStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub clock: Arc<FixedClock>,
}

impl TestTokens {
    /// Full key material, clock frozen at `secs` since the epoch.
    pub fn at_unix(secs: i64) -> Self {
        Self::with_keys(test_key_material(), FixedClock::at_unix(secs))
    }

    /// No key material loaded at all.
    pub fn without_keys(clock: FixedClock) -> Self {
        Self::with_keys(KeyMaterial::empty(), clock)
    }

    pub fn with_keys(keys: KeyMaterial, clock: FixedClock) -> Self {
        let clock = Arc::new(clock);
        let families = Arc::new(InMemoryRefreshFamilyStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let codec = ClaimsCodec::new(Arc::new(keys), clock.clone());
        let use_cases = TokenUseCases::new(codec, families.clone(), users.clone());
        Self {
            use_cases,
            families,
            users,
            clock,
        }
    }

    /// Creates a user with default fields and registers it in the directory.
    pub fn seed_user(&self) -> UserProfile {
        let user = create_test_user(|_| {});
        self.users.insert(user.clone());
        user
    }
}

pub struct TestAppStateBuilder {
    prefix: String,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            prefix: "/api/account".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Returns the state plus the `TestTokens` sharing its stores and clock.
    pub fn build(self) -> (AppState, TestTokens) {
        let tokens = TestTokens::at_unix(0);
        let config = AppConfig {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            account_api_url: self.prefix,
            identity_private_key_file: PathBuf::from("fixtures/identity_private_test.pem"),
            identity_public_key_file: PathBuf::from("fixtures/identity_public_test.pem"),
            refresh_secret: test_refresh_secret(),
            redis_url: None,
            user_directory_file: None,
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
        };
        let app_state = AppState {
            config: Arc::new(config),
            token_use_cases: Arc::new(tokens.use_cases.clone()),
        };
        (app_state, tokens)
    }
}
