use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of a principal, as embedded in identity tokens.
///
/// Carries no credential fields; identity token payloads are built only from this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserProfile {
    pub uid: Uuid,
    pub email: String,
    pub name: String,
    pub image_url: String,
    pub website: String,
}
