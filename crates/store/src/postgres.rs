//! Postgres-backed store implementation.
//!
//! Every mutation sequence runs inside one sqlx transaction so the task write
//! and its activity append commit together or not at all; dropping the
//! transaction rolls back. Referential constraints are enforced by the schema
//! (with `ON DELETE SET NULL` from activities to tasks), and optional list
//! filters use single parameterized queries (`$n IS NULL OR col = $n`).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use taskboard_core::{
    Activity, ActivityAction, ActivityId, ChangeSet, NewActivity, NewTask, Project, ProjectId,
    Tag, TagId, Task, TaskId, TaskPatch, TaskPriority, TaskStatus, User, UserId,
};

use crate::error::{map_sqlx_error, StoreError};
use crate::filter::{ActivityFilter, TaskFilter};
use crate::page::{Page, PageMeta, PageRequest};
use crate::store::{Store, StoreTxn};

const SCHEMA: &str = include_str!("schema.sql");

const TASK_SELECT: &str = r#"
    SELECT
        t.id, t.title, t.description, t.status, t.priority, t.due_date,
        t.project_id, t.assignee_id, t.created_at, t.updated_at,
        p.name AS project_name,
        u.name AS assignee_name, u.email AS assignee_email
    FROM tasks t
    JOIN projects p ON p.id = t.project_id
    LEFT JOIN users u ON u.id = t.assignee_id
"#;

const ACTIVITY_SELECT: &str = r#"
    SELECT
        a.id, a.action, a.changes, a.task_id, a.task_title, a.user_id, a.created_at,
        u.name AS user_name, u.email AS user_email
    FROM activities a
    LEFT JOIN users u ON u.id = a.user_id
"#;

/// Postgres-backed task/activity store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Apply the idempotent schema (CREATE TABLE IF NOT EXISTS ...).
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("init_schema", e))?;
        Ok(())
    }

    async fn load_tags_for(
        &self,
        task_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tt.task_id, tg.id, tg.name
            FROM task_tags tt
            JOIN tags tg ON tg.id = tt.tag_id
            WHERE tt.task_id = ANY($1)
            ORDER BY tg.id ASC
            "#,
        )
        .bind(task_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_tags", e))?;

        let mut by_task: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            let task_id: Uuid = row.try_get("task_id").map_err(row_error)?;
            let tag = Tag {
                id: TagId::from_uuid(row.try_get("id").map_err(row_error)?),
                name: row.try_get("name").map_err(row_error)?,
            };
            by_task.entry(task_id).or_default().push(tag);
        }
        Ok(by_task)
    }
}

fn row_error(e: sqlx::Error) -> StoreError {
    StoreError::backend(format!("failed to read row: {e}"))
}

// Row types

#[derive(Debug)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    project_id: Uuid,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    project_name: String,
    assignee_name: Option<String>,
    assignee_email: Option<String>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for TaskRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TaskRow {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            due_date: row.try_get("due_date")?,
            project_id: row.try_get("project_id")?,
            assignee_id: row.try_get("assignee_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            project_name: row.try_get("project_name")?,
            assignee_name: row.try_get("assignee_name")?,
            assignee_email: row.try_get("assignee_email")?,
        })
    }
}

impl TaskRow {
    fn into_task(self, tags: Vec<Tag>) -> Result<Task, StoreError> {
        let status = TaskStatus::from_str(&self.status)
            .map_err(|_| StoreError::backend(format!("unknown stored status '{}'", self.status)))?;
        let priority = TaskPriority::from_str(&self.priority).map_err(|_| {
            StoreError::backend(format!("unknown stored priority '{}'", self.priority))
        })?;
        let assignee = match self.assignee_id {
            Some(id) => Some(User {
                id: UserId::from_uuid(id),
                name: self
                    .assignee_name
                    .ok_or_else(|| StoreError::backend("assignee row missing name"))?,
                email: self
                    .assignee_email
                    .ok_or_else(|| StoreError::backend("assignee row missing email"))?,
            }),
            None => None,
        };
        Ok(Task {
            id: TaskId::from_uuid(self.id),
            title: self.title,
            description: self.description,
            status,
            priority,
            due_date: self.due_date,
            project: Project {
                id: ProjectId::from_uuid(self.project_id),
                name: self.project_name,
            },
            assignee,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug)]
struct ActivityRow {
    id: Uuid,
    action: String,
    changes: serde_json::Value,
    task_id: Option<Uuid>,
    task_title: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    user_name: Option<String>,
    user_email: Option<String>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ActivityRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ActivityRow {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            changes: row.try_get("changes")?,
            task_id: row.try_get("task_id")?,
            task_title: row.try_get("task_title")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            user_name: row.try_get("user_name")?,
            user_email: row.try_get("user_email")?,
        })
    }
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity, StoreError> {
        let action = ActivityAction::from_str(&self.action)
            .map_err(|_| StoreError::backend(format!("unknown stored action '{}'", self.action)))?;
        let changes: ChangeSet = serde_json::from_value(self.changes)
            .map_err(|e| StoreError::backend(format!("malformed stored change set: {e}")))?;
        let user_id = UserId::from_uuid(self.user_id);
        let user = match (self.user_name, self.user_email) {
            (Some(name), Some(email)) => Some(User {
                id: user_id,
                name,
                email,
            }),
            _ => None,
        };
        Ok(Activity {
            id: ActivityId::from_uuid(self.id),
            action,
            changes,
            task_id: self.task_id.map(TaskId::from_uuid),
            task_title: self.task_title,
            user_id,
            user,
            created_at: self.created_at,
        })
    }
}

// Transaction-scoped helpers

async fn find_task_in(
    tx: &mut Transaction<'static, Postgres>,
    id: TaskId,
) -> Result<Task, StoreError> {
    let query = format!("{TASK_SELECT} WHERE t.id = $1");
    let row = sqlx::query(&query)
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("find_task", e))?
        .ok_or_else(|| StoreError::not_found("task"))?;
    let row = TaskRow::from_row(&row).map_err(row_error)?;

    let tag_rows = sqlx::query(
        r#"
        SELECT tg.id, tg.name
        FROM task_tags tt
        JOIN tags tg ON tg.id = tt.tag_id
        WHERE tt.task_id = $1
        ORDER BY tg.id ASC
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("find_task_tags", e))?;

    let mut tags = Vec::with_capacity(tag_rows.len());
    for row in tag_rows {
        tags.push(Tag {
            id: TagId::from_uuid(row.try_get("id").map_err(row_error)?),
            name: row.try_get("name").map_err(row_error)?,
        });
    }
    row.into_task(tags)
}

async fn check_reference(
    tx: &mut Transaction<'static, Postgres>,
    table: &str,
    entity: &str,
    id: Uuid,
) -> Result<(), StoreError> {
    // `table` is a compile-time constant at every call site, never user input.
    let query = format!("SELECT 1 AS one FROM {table} WHERE id = $1");
    let found = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("check_reference", e))?;
    if found.is_none() {
        return Err(StoreError::not_found(entity));
    }
    Ok(())
}

async fn check_tags(
    tx: &mut Transaction<'static, Postgres>,
    tag_ids: &[TagId],
) -> Result<(), StoreError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = tag_ids.iter().map(|t| *t.as_uuid()).collect();
    let row = sqlx::query("SELECT COUNT(*) AS total FROM tags WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("check_tags", e))?;
    let total: i64 = row.try_get("total").map_err(row_error)?;
    if total != ids.len() as i64 {
        return Err(StoreError::not_found("tag"));
    }
    Ok(())
}

async fn replace_task_tags(
    tx: &mut Transaction<'static, Postgres>,
    task_id: TaskId,
    tag_ids: &[TagId],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM task_tags WHERE task_id = $1")
        .bind(task_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("clear_task_tags", e))?;
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO task_tags (task_id, tag_id) VALUES ($1, $2)")
            .bind(task_id.as_uuid())
            .bind(tag_id.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_task_tag", e))?;
    }
    Ok(())
}

/// One open Postgres transaction. Dropping it rolls back.
pub struct PgTxn {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTxn for PgTxn {
    async fn find_task(&mut self, id: TaskId) -> Result<Task, StoreError> {
        find_task_in(&mut self.tx, id).await
    }

    async fn insert_task(&mut self, draft: &NewTask) -> Result<Task, StoreError> {
        check_reference(&mut self.tx, "projects", "project", *draft.project_id.as_uuid()).await?;
        if let Some(assignee_id) = draft.assignee_id {
            check_reference(&mut self.tx, "users", "assignee", *assignee_id.as_uuid()).await?;
        }
        let tag_ids = draft.tag_ids.clone().unwrap_or_default();
        check_tags(&mut self.tx, &tag_ids).await?;

        let id = TaskId::new();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date, project_id, assignee_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.status.unwrap_or_default().as_str())
        .bind(draft.priority.unwrap_or_default().as_str())
        .bind(draft.due_date)
        .bind(draft.project_id.as_uuid())
        .bind(draft.assignee_id.map(|a| *a.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_task", e))?;

        replace_task_tags(&mut self.tx, id, &tag_ids).await?;
        find_task_in(&mut self.tx, id).await
    }

    async fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let current = find_task_in(&mut self.tx, id).await?;

        if let Some(assignee_id) = patch.assignee_id.value() {
            check_reference(&mut self.tx, "users", "assignee", *assignee_id.as_uuid()).await?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            check_tags(&mut self.tx, tag_ids).await?;
        }

        let title = patch.title.clone().unwrap_or(current.title);
        let description = patch
            .description
            .clone()
            .apply(current.description);
        let status = patch.status.unwrap_or(current.status);
        let priority = patch.priority.unwrap_or(current.priority);
        let due_date = if patch.due_date.is_supplied() {
            patch.due_date.apply(current.due_date)
        } else {
            current.due_date
        };
        let assignee_id = if patch.assignee_id.is_supplied() {
            patch.assignee_id.apply(current.assignee.map(|u| u.id))
        } else {
            current.assignee.map(|u| u.id)
        };

        sqlx::query(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, status = $4, priority = $5,
                due_date = $6, assignee_id = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&title)
        .bind(&description)
        .bind(status.as_str())
        .bind(priority.as_str())
        .bind(due_date)
        .bind(assignee_id.map(|a| *a.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_task", e))?;

        if let Some(tag_ids) = &patch.tag_ids {
            replace_task_tags(&mut self.tx, id, tag_ids).await?;
        }
        find_task_in(&mut self.tx, id).await
    }

    async fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_task", e))?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("task"));
        }
        Ok(())
    }

    async fn append_activity(&mut self, record: NewActivity) -> Result<Activity, StoreError> {
        let id = ActivityId::new();
        let changes = serde_json::to_value(&record.changes)
            .map_err(|e| StoreError::backend(format!("change set serialization failed: {e}")))?;

        let row = sqlx::query(
            r#"
            INSERT INTO activities (id, action, changes, task_id, task_title, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(record.action.as_str())
        .bind(&changes)
        .bind(record.task_id.map(|t| *t.as_uuid()))
        .bind(&record.task_title)
        .bind(record.user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_activity", e))?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(row_error)?;

        let user_row = sqlx::query("SELECT name, email FROM users WHERE id = $1")
            .bind(record.user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_actor", e))?;
        let user = match user_row {
            Some(row) => Some(User {
                id: record.user_id,
                name: row.try_get("name").map_err(row_error)?,
                email: row.try_get("email").map_err(row_error)?,
            }),
            None => None,
        };

        Ok(Activity {
            id,
            action: record.action,
            changes: record.changes,
            task_id: record.task_id,
            task_title: record.task_title,
            user_id: record.user_id,
            user,
            created_at,
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Txn = PgTxn;

    async fn begin(&self) -> Result<Self::Txn, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgTxn { tx })
    }

    #[instrument(skip(self), err)]
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        let status = filter.status.map(|s| s.as_str());
        let priority = filter.priority.map(|p| p.as_str());
        let assignee_id = filter.assignee_id.map(|a| *a.as_uuid());
        let project_id = filter.project_id.map(|p| *p.as_uuid());

        const FILTER: &str = r#"
            WHERE ($1::text IS NULL OR t.status = $1)
              AND ($2::text IS NULL OR t.priority = $2)
              AND ($3::uuid IS NULL OR t.assignee_id = $3)
              AND ($4::uuid IS NULL OR t.project_id = $4)
              AND ($5::timestamptz IS NULL OR t.due_date >= $5)
              AND ($6::timestamptz IS NULL OR t.due_date <= $6)
        "#;

        let count_query = format!("SELECT COUNT(*) AS total FROM tasks t {FILTER}");
        let count_row = sqlx::query(&count_query)
            .bind(status)
            .bind(priority)
            .bind(assignee_id)
            .bind(project_id)
            .bind(filter.due_date_from)
            .bind(filter.due_date_to)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_tasks", e))?;
        let total: i64 = count_row.try_get("total").map_err(row_error)?;

        let list_query = format!(
            "{TASK_SELECT} {FILTER} ORDER BY t.created_at ASC, t.id ASC LIMIT $7 OFFSET $8"
        );
        let rows = sqlx::query(&list_query)
            .bind(status)
            .bind(priority)
            .bind(assignee_id)
            .bind(project_id)
            .bind(filter.due_date_from)
            .bind(filter.due_date_to)
            .bind(i64::from(page.per_page))
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tasks", e))?;

        let task_rows: Vec<TaskRow> = rows
            .iter()
            .map(TaskRow::from_row)
            .collect::<Result<_, _>>()
            .map_err(row_error)?;
        let ids: Vec<Uuid> = task_rows.iter().map(|r| r.id).collect();
        let mut tags_by_task = self.load_tags_for(&ids).await?;

        let mut data = Vec::with_capacity(task_rows.len());
        for row in task_rows {
            let tags = tags_by_task.remove(&row.id).unwrap_or_default();
            data.push(row.into_task(tags)?);
        }

        Ok(Page {
            data,
            meta: PageMeta::new(total as u64, page),
        })
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let query = format!("{TASK_SELECT} WHERE t.id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_task", e))?
            .ok_or_else(|| StoreError::not_found("task"))?;
        let row = TaskRow::from_row(&row).map_err(row_error)?;
        let tags = self
            .load_tags_for(&[row.id])
            .await?
            .remove(&row.id)
            .unwrap_or_default();
        row.into_task(tags)
    }

    #[instrument(skip(self), err)]
    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError> {
        let user_id = filter.user_id.map(|u| *u.as_uuid());
        let action = filter.action.map(|a| a.as_str());

        const FILTER: &str = r#"
            WHERE ($1::uuid IS NULL OR a.user_id = $1)
              AND ($2::text IS NULL OR a.action = $2)
              AND ($3::timestamptz IS NULL OR a.created_at >= $3)
              AND ($4::timestamptz IS NULL OR a.created_at <= $4)
        "#;

        let count_query = format!("SELECT COUNT(*) AS total FROM activities a {FILTER}");
        let count_row = sqlx::query(&count_query)
            .bind(user_id)
            .bind(action)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_activities", e))?;
        let total: i64 = count_row.try_get("total").map_err(row_error)?;

        let list_query = format!(
            "{ACTIVITY_SELECT} {FILTER} ORDER BY a.created_at DESC, a.id DESC LIMIT $5 OFFSET $6"
        );
        let rows = sqlx::query(&list_query)
            .bind(user_id)
            .bind(action)
            .bind(filter.from)
            .bind(filter.to)
            .bind(i64::from(page.per_page))
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_activities", e))?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            data.push(ActivityRow::from_row(row).map_err(row_error)?.into_activity()?);
        }

        Ok(Page {
            data,
            meta: PageMeta::new(total as u64, page),
        })
    }

    async fn list_task_activities(
        &self,
        task_id: TaskId,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError> {
        let count_row = sqlx::query("SELECT COUNT(*) AS total FROM activities a WHERE a.task_id = $1")
            .bind(task_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_task_activities", e))?;
        let total: i64 = count_row.try_get("total").map_err(row_error)?;

        let list_query = format!(
            "{ACTIVITY_SELECT} WHERE a.task_id = $1 ORDER BY a.created_at DESC, a.id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&list_query)
            .bind(task_id.as_uuid())
            .bind(i64::from(page.per_page))
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_task_activities", e))?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            data.push(ActivityRow::from_row(row).map_err(row_error)?.into_activity()?);
        }

        Ok(Page {
            data,
            meta: PageMeta::new(total as u64, page),
        })
    }
}
