pub mod app;
pub mod config;
pub mod memory_family_store;
pub mod redis_family_store;
pub mod setup;
pub mod user_directory;
