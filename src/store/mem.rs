//!
//! # In-Memory Store
//!
//! [`MemStore`] keeps users, folders, and tasks in one mutex-guarded state
//! and implements the same traits as the Postgres backend, with the same
//! ownership and ordering semantics. The integration suites run the whole
//! HTTP stack against it; it also serves throwaway single-node deployments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::ApiError;
use crate::models::folder::{Folder, FolderStore};
use crate::models::task::{NewTask, Task, TaskChanges, TaskStore};
use crate::models::user::{NewUser, User, UserChanges, UserStore, UserView};
use crate::validation::UniqueProbe;

#[derive(Default)]
struct State {
    users: HashMap<i64, User>,
    folders: HashMap<i64, Folder>,
    tasks: HashMap<i64, Task>,
    id_seq: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.id_seq += 1;
        self.id_seq
    }

    fn folder_name(&self, folder_id: Option<i64>) -> Option<String> {
        folder_id
            .and_then(|id| self.folders.get(&id))
            .map(|f| f.name.clone())
    }

    /// Read-time join: stored tasks never carry a folder name.
    fn with_folder_name(&self, task: &Task) -> Task {
        let mut task = task.clone();
        task.folder_name = self.folder_name(task.folder_id);
        task
    }
}

#[derive(Default)]
pub struct MemStore {
    state: Mutex<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mem store lock poisoned")
    }
}

#[async_trait]
impl UserStore for MemStore {
    async fn create(&self, user: NewUser) -> Result<i64, ApiError> {
        let mut state = self.locked();
        // mirrors the unique index on users.email
        if state.users.values().any(|u| u.email == user.email) {
            return Err(ApiError::DatabaseError(format!(
                "duplicate key on users.email: {}",
                user.email
            )));
        }
        let id = state.next_id();
        state.users.insert(
            id,
            User {
                id,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let state = self.locked();
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_view(&self, id: i64) -> Result<Option<UserView>, ApiError> {
        let state = self.locked();
        Ok(state.users.get(&id).map(UserView::from))
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<bool, ApiError> {
        let mut state = self.locked();
        match state.users.get_mut(&id) {
            Some(user) => {
                if let Some(username) = changes.username {
                    user.username = username;
                }
                if let Some(email) = changes.email {
                    user.email = email;
                }
                if let Some(hash) = changes.password_hash {
                    user.password_hash = hash;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, ApiError> {
        let mut state = self.locked();
        let existed = state.users.remove(&id).is_some();
        if existed {
            state.tasks.retain(|_, t| t.user_id != id);
            state.folders.retain(|_, f| f.user_id != id);
        }
        Ok(existed)
    }
}

#[async_trait]
impl FolderStore for MemStore {
    async fn create(&self, user_id: i64, name: &str) -> Result<Folder, ApiError> {
        let mut state = self.locked();
        let id = state.next_id();
        let folder = Folder {
            id,
            name: name.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        state.folders.insert(id, folder.clone());
        Ok(folder)
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Folder>, ApiError> {
        let state = self.locked();
        let mut folders: Vec<Folder> = state
            .folders
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(folders)
    }

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Folder>, ApiError> {
        let state = self.locked();
        Ok(state
            .folders
            .get(&id)
            .filter(|f| f.user_id == user_id)
            .cloned())
    }

    async fn rename(&self, id: i64, user_id: i64, name: &str) -> Result<bool, ApiError> {
        let mut state = self.locked();
        match state.folders.get_mut(&id) {
            Some(folder) if folder.user_id == user_id => {
                folder.name = name.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let mut state = self.locked();
        let owned = state
            .folders
            .get(&id)
            .map(|f| f.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        state
            .tasks
            .retain(|_, t| !(t.folder_id == Some(id) && t.user_id == user_id));
        state.folders.remove(&id);
        Ok(true)
    }

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let state = self.locked();
        Ok(state
            .folders
            .get(&id)
            .map(|f| f.user_id == user_id)
            .unwrap_or(false))
    }
}

#[async_trait]
impl TaskStore for MemStore {
    async fn create(&self, task: NewTask) -> Result<Task, ApiError> {
        let mut state = self.locked();
        let id = state.next_id();
        let now = Utc::now();
        let stored = Task {
            id,
            title: task.title,
            description: task.description,
            folder_id: task.folder_id,
            user_id: task.user_id,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
            folder_name: None,
        };
        let out = state.with_folder_name(&stored);
        state.tasks.insert(id, stored);
        Ok(out)
    }

    async fn list(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
        status: Option<&str>,
    ) -> Result<Vec<Task>, ApiError> {
        let state = self.locked();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| folder_id.map_or(true, |fid| t.folder_id == Some(fid)))
            .filter(|t| status.map_or(true, |s| t.status.as_str() == s))
            .map(|t| state.with_folder_name(t))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Task>, ApiError> {
        let state = self.locked();
        Ok(state
            .tasks
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .map(|t| state.with_folder_name(t)))
    }

    async fn update(&self, id: i64, user_id: i64, changes: TaskChanges) -> Result<bool, ApiError> {
        let mut state = self.locked();
        match state.tasks.get_mut(&id) {
            Some(task) if task.user_id == user_id => {
                if let Some(title) = changes.title {
                    task.title = title;
                }
                if let Some(description) = changes.description {
                    task.description = description;
                }
                if let Some(folder_id) = changes.folder_id {
                    task.folder_id = folder_id;
                }
                if let Some(status) = changes.status {
                    task.status = status;
                }
                if let Some(priority) = changes.priority {
                    task.priority = priority;
                }
                if let Some(due_date) = changes.due_date {
                    task.due_date = due_date;
                }
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let mut state = self.locked();
        let owned = state
            .tasks
            .get(&id)
            .map(|t| t.user_id == user_id)
            .unwrap_or(false);
        if owned {
            state.tasks.remove(&id);
        }
        Ok(owned)
    }

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let state = self.locked();
        Ok(state
            .tasks
            .get(&id)
            .map(|t| t.user_id == user_id)
            .unwrap_or(false))
    }
}

#[async_trait]
impl UniqueProbe for MemStore {
    async fn exists(
        &self,
        table: &str,
        column: &str,
        value: &str,
        except_id: Option<i64>,
    ) -> Result<bool, ApiError> {
        let state = self.locked();
        match (table, column) {
            ("users", "email") => Ok(state
                .users
                .values()
                .any(|u| u.email == value && Some(u.id) != except_id)),
            ("users", "username") => Ok(state
                .users
                .values()
                .any(|u| u.username == value && Some(u.id) != except_id)),
            _ => Err(ApiError::ServerError(format!(
                "no unique probe for {}.{}",
                table, column
            ))),
        }
    }
}
