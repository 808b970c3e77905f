//! Test utilities.
//!
//! This module provides:
//! - Test data factories and a controllable clock
//! - RSA and HMAC key fixtures
//! - Builders wiring `TokenUseCases` and `AppState` to in-memory stores

mod app_state_builder;
mod factories;
mod keys;

pub use app_state_builder::*;
pub use factories::*;
pub use keys::*;
