use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Prefix the account routes are nested under (e.g. "/api/account").
    pub account_api_url: String,
    pub identity_private_key_file: PathBuf,
    pub identity_public_key_file: PathBuf,
    pub refresh_secret: SecretString,
    /// Shared family store. When unset, families live in process memory and do not
    /// survive a restart.
    pub redis_url: Option<String>,
    /// JSON array of user profiles loaded into the in-memory directory.
    pub user_directory_file: Option<PathBuf>,
    pub cors_origin: HeaderValue,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
        );
        let account_api_url: String =
            get_env_default("ACCOUNT_API_URL", "/api/account".to_string());

        let identity_private_key_file: PathBuf = get_env("IDENTITY_PRIVATE_KEY_FILE");
        let identity_public_key_file: PathBuf = get_env("IDENTITY_PUBLIC_KEY_FILE");
        let refresh_secret = SecretString::new(get_env::<String>("REFRESH_SECRET").into());

        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let user_directory_file = std::env::var("USER_DIRECTORY_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let cors_origin: HeaderValue = get_env_default(
            "CORS_ORIGIN",
            HeaderValue::from_static("http://localhost:3000"),
        );

        Self {
            bind_addr,
            account_api_url: normalize_prefix(&account_api_url),
            identity_private_key_file,
            identity_public_key_file,
            refresh_secret,
            redis_url,
            user_directory_file,
            cors_origin,
        }
    }
}

/// axum only nests under paths that start with '/' and have no trailing slash.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
