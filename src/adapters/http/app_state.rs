use std::sync::Arc;

use crate::{infra::config::AppConfig, use_cases::tokens::TokenUseCases};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_use_cases: Arc<TokenUseCases>,
}
