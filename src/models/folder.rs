use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;

/// A folder grouping a user's tasks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Every operation is keyed by `(id, user_id)`: a folder that exists but
/// belongs to someone else behaves exactly like one that does not exist.
#[async_trait]
pub trait FolderStore: Send + Sync {
    async fn create(&self, user_id: i64, name: &str) -> Result<Folder, ApiError>;

    /// The user's folders, newest first.
    async fn list(&self, user_id: i64) -> Result<Vec<Folder>, ApiError>;

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Folder>, ApiError>;

    async fn rename(&self, id: i64, user_id: i64, name: &str) -> Result<bool, ApiError>;

    /// Removes the folder and every task inside it as one atomic step.
    /// `false` means there was nothing owned by this user to remove.
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError>;

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError>;
}
