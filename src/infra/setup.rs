use crate::{
    adapters::http::app_state::AppState,
    application::{
        clock::{Clock, SystemClock},
        jwt::ClaimsCodec,
        keys::KeyMaterial,
    },
    infra::{
        config::AppConfig,
        memory_family_store::{InMemoryRefreshFamilyStore, run_family_pruning_loop},
        redis_family_store::RedisRefreshFamilyStore, user_directory::InMemoryUserDirectory,
    },
    use_cases::tokens::{RefreshFamilyStore, TokenUseCases, UserDirectory},
};
use anyhow::Context;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FAMILY_PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let keys = load_key_material(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let codec = ClaimsCodec::new(Arc::new(keys), clock.clone());

    let families: Arc<dyn RefreshFamilyStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisRefreshFamilyStore::new(url).await?),
        None => {
            warn!("REDIS_URL not set, refresh token families are kept in memory");
            let store = Arc::new(InMemoryRefreshFamilyStore::new());
            tokio::spawn(run_family_pruning_loop(
                store.clone(),
                clock,
                FAMILY_PRUNE_INTERVAL,
            ));
            store
        }
    };

    let users = match &config.user_directory_file {
        Some(path) => InMemoryUserDirectory::from_json_file(path)?,
        None => InMemoryUserDirectory::new(),
    };
    if users.is_empty() {
        warn!("User directory is empty, every rotation will fail with NOT_FOUND");
    } else {
        info!(users = users.len(), "Loaded user directory");
    }
    let users: Arc<dyn UserDirectory> = Arc::new(users);

    let token_use_cases = TokenUseCases::new(codec, families, users);

    Ok(AppState {
        config: Arc::new(config),
        token_use_cases: Arc::new(token_use_cases),
    })
}

fn load_key_material(config: &AppConfig) -> anyhow::Result<KeyMaterial> {
    let private_pem = std::fs::read(&config.identity_private_key_file).with_context(|| {
        format!(
            "cannot read identity private key {}",
            config.identity_private_key_file.display()
        )
    })?;
    let public_pem = std::fs::read(&config.identity_public_key_file).with_context(|| {
        format!(
            "cannot read identity public key {}",
            config.identity_public_key_file.display()
        )
    })?;

    let keys = KeyMaterial::from_pem(&private_pem, &public_pem, &config.refresh_secret)
        .context("signing key material could not be loaded")?;
    info!("Loaded token signing keys");
    Ok(keys)
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "token_service=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs); console only if the file cannot be created.
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
