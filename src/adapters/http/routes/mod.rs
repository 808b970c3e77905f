pub mod account;
pub mod health;

use axum::Router;

use crate::adapters::http::app_state::AppState;

/// Account routes; nested under the configured prefix by `create_app`.
pub fn router() -> Router<AppState> {
    account::router()
}
