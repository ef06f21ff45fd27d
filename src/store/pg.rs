//!
//! # Postgres Store
//!
//! [`PgStore`] implements every store trait plus the validator's unique
//! probe over one connection pool. Queries are built at runtime so the crate
//! compiles without a live database; the two cascading deletes (folder,
//! account) run inside transactions.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::error::ApiError;
use crate::models::folder::{Folder, FolderStore};
use crate::models::task::{NewTask, Task, TaskChanges, TaskStore};
use crate::models::user::{NewUser, User, UserChanges, UserStore, UserView};
use crate::validation::UniqueProbe;

/// Columns every task read selects, with the folder name joined in.
const SELECT_TASK: &str = "SELECT t.id, t.title, t.description, t.folder_id, t.user_id, \
     t.status, t.priority, t.due_date, t.created_at, t.updated_at, f.name AS folder_name \
     FROM tasks t LEFT JOIN folders f ON t.folder_id = f.id";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> Result<i64, ApiError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_view(&self, id: i64) -> Result<Option<UserView>, ApiError> {
        let view = sqlx::query_as::<_, UserView>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(view)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<bool, ApiError> {
        if changes.is_empty() {
            return Ok(false);
        }

        // SET list and binds must stay in the same order
        let mut sets: Vec<String> = Vec::new();
        let mut param = 0;
        if changes.username.is_some() {
            param += 1;
            sets.push(format!("username = ${}", param));
        }
        if changes.email.is_some() {
            param += 1;
            sets.push(format!("email = ${}", param));
        }
        if changes.password_hash.is_some() {
            param += 1;
            sets.push(format!("password_hash = ${}", param));
        }

        let sql = format!(
            "UPDATE users SET {} WHERE id = ${}",
            sets.join(", "),
            param + 1
        );

        let mut query = sqlx::query(&sql);
        if let Some(username) = &changes.username {
            query = query.bind(username);
        }
        if let Some(email) = &changes.email {
            query = query.bind(email);
        }
        if let Some(hash) = &changes.password_hash {
            query = query.bind(hash);
        }

        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM folders WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl FolderStore for PgStore {
    async fn create(&self, user_id: i64, name: &str) -> Result<Folder, ApiError> {
        let folder = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (name, user_id) VALUES ($1, $2) \
             RETURNING id, name, user_id, created_at",
        )
        .bind(name)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(folder)
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Folder>, ApiError> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, user_id, created_at FROM folders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(folders)
    }

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Folder>, ApiError> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, user_id, created_at FROM folders WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(folder)
    }

    async fn rename(&self, id: i64, user_id: i64, name: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("UPDATE folders SET name = $1 WHERE id = $2 AND user_id = $3")
            .bind(name)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tasks WHERE folder_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create(&self, task: NewTask) -> Result<Task, ApiError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tasks (user_id, title, description, folder_id, status, priority, due_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.folder_id)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .fetch_one(&self.pool)
        .await?;

        TaskStore::find(self, id, task.user_id).await?.ok_or_else(|| {
            ApiError::DatabaseError(format!("task {} vanished between insert and re-select", id))
        })
    }

    async fn list(
        &self,
        user_id: i64,
        folder_id: Option<i64>,
        status: Option<&str>,
    ) -> Result<Vec<Task>, ApiError> {
        let mut sql = format!("{} WHERE t.user_id = $1", SELECT_TASK);
        let mut param = 1;
        if folder_id.is_some() {
            param += 1;
            sql.push_str(&format!(" AND t.folder_id = ${}", param));
        }
        if status.is_some() {
            // compared as text so an unknown status matches nothing instead
            // of failing the enum cast
            param += 1;
            sql.push_str(&format!(" AND t.status::text = ${}", param));
        }
        sql.push_str(" ORDER BY t.created_at DESC, t.id DESC");

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(user_id);
        if let Some(folder_id) = folder_id {
            query = query.bind(folder_id);
        }
        if let Some(status) = status {
            query = query.bind(status);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn find(&self, id: i64, user_id: i64) -> Result<Option<Task>, ApiError> {
        let sql = format!("{} WHERE t.id = $1 AND t.user_id = $2", SELECT_TASK);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update(&self, id: i64, user_id: i64, changes: TaskChanges) -> Result<bool, ApiError> {
        if changes.is_empty() {
            return Ok(false);
        }

        let mut sets: Vec<String> = Vec::new();
        let mut param = 0;
        if changes.title.is_some() {
            param += 1;
            sets.push(format!("title = ${}", param));
        }
        if changes.description.is_some() {
            param += 1;
            sets.push(format!("description = ${}", param));
        }
        if changes.folder_id.is_some() {
            param += 1;
            sets.push(format!("folder_id = ${}", param));
        }
        if changes.status.is_some() {
            param += 1;
            sets.push(format!("status = ${}", param));
        }
        if changes.priority.is_some() {
            param += 1;
            sets.push(format!("priority = ${}", param));
        }
        if changes.due_date.is_some() {
            param += 1;
            sets.push(format!("due_date = ${}", param));
        }
        sets.push("updated_at = NOW()".to_string());

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ${} AND user_id = ${}",
            sets.join(", "),
            param + 1,
            param + 2
        );

        let mut query = sqlx::query(&sql);
        if let Some(title) = &changes.title {
            query = query.bind(title);
        }
        if let Some(description) = &changes.description {
            query = query.bind(description);
        }
        if let Some(folder_id) = changes.folder_id {
            query = query.bind(folder_id);
        }
        if let Some(status) = changes.status {
            query = query.bind(status);
        }
        if let Some(priority) = changes.priority {
            query = query.bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            query = query.bind(due_date);
        }

        let result = query.bind(id).bind(user_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, id: i64, user_id: i64) -> Result<bool, ApiError> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = $1 AND user_id = $2)")
                .bind(id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }
}

#[async_trait]
impl UniqueProbe for PgStore {
    async fn exists(
        &self,
        table: &str,
        column: &str,
        value: &str,
        except_id: Option<i64>,
    ) -> Result<bool, ApiError> {
        // identifiers were restricted to [a-z_]+ when the schema was built
        let sql = match except_id {
            None => format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)", table, column),
            Some(_) => format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1 AND id <> $2)",
                table, column
            ),
        };

        let mut query = sqlx::query_scalar::<_, bool>(&sql).bind(value);
        if let Some(id) = except_id {
            query = query.bind(id);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}
