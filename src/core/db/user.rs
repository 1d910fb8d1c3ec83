use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const GUEST_USER_NAME: &str = "Guest User";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_image_url: Option<String>,
}

/// The profile of whoever is using the app. A guest profile is created on
/// first access.
pub trait UserRepository {
    fn get_current_user(&self) -> impl Future<Output = anyhow::Result<User>>;
    fn update_profile(&self, update: &ProfileUpdate) -> impl Future<Output = anyhow::Result<User>>;
    fn update_last_login(&self) -> impl Future<Output = anyhow::Result<User>>;
    /// Forget the current profile. Stored records are kept.
    fn clear_user_data(&self) -> impl Future<Output = anyhow::Result<()>>;
}
