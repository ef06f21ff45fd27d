use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;

/// A full user row. It carries the password hash and is deliberately not
/// serializable; [`UserView`] is the only outward projection.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// What the API shows about a user: login payloads, `/check-auth`, profiles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial profile update; `None` fields stay untouched.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<i64, ApiError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    async fn find_view(&self, id: i64) -> Result<Option<UserView>, ApiError>;

    async fn update(&self, id: i64, changes: UserChanges) -> Result<bool, ApiError>;

    /// Removes the account and everything it owns (tasks first, then
    /// folders, then the user) as one atomic step.
    async fn delete(&self, id: i64) -> Result<bool, ApiError>;
}
