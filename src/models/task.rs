use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// A task as returned by the API. `folder_name` is joined in from the owning
/// folder at read time and is `null` for unassigned tasks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub folder_id: Option<i64>,
    pub user_id: i64,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder_name: Option<String>,
}

/// A validated task ready for insertion.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub folder_id: Option<i64>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
}

/// A partial update. The outer `Option` is field presence; the inner one (on
/// nullable columns) distinguishes "set to null" from "set to a value".
#[derive(Debug, Default, Clone)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub folder_id: Option<Option<i64>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.folder_id.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

/// Like folders, every operation is keyed by `(id, user_id)`; foreign tasks
/// are indistinguishable from missing ones.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task, ApiError>;

    /// The user's tasks, newest first, optionally narrowed to one folder
    /// and/or one status. The status filter is matched as text; an unknown
    /// status simply matches nothing.
    async fn list(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
        status: Option<&str>,
    ) -> Result<Vec<Task>, ApiError>;

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Task>, ApiError>;

    /// Applies the changes and bumps `updated_at`. `false` means no owned row
    /// matched.
    async fn update(&self, id: i64, user_id: i64, changes: TaskChanges) -> Result<bool, ApiError>;

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError>;

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError>;
}
