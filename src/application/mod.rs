pub mod app_error;
pub mod clock;
pub mod jwt;
pub mod keys;
pub mod use_cases;
