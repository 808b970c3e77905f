//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::sync::Mutex;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{application::clock::Clock, domain::entities::user::UserProfile};

/// Create a test user profile with sensible defaults.
pub fn create_test_user(overrides: impl FnOnce(&mut UserProfile)) -> UserProfile {
    let mut user = UserProfile {
        uid: Uuid::new_v4(),
        email: "bob@bob.com".to_string(),
        name: "Bob".to_string(),
        image_url: String::new(),
        website: String::new(),
    };
    overrides(&mut user);
    user
}

/// Clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn at_unix(secs: i64) -> Self {
        Self {
            now: Mutex::new(unix(secs)),
        }
    }

    pub fn set_unix(&self, secs: i64) {
        *self.now.lock().unwrap() = unix(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

fn unix(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(secs).expect("timestamp in range")
}
