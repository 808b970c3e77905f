pub mod refresh_family;
pub mod token;
pub mod user;
