//! In-memory store.
//!
//! Intended for tests/dev. A transaction works against a private snapshot of
//! the shared state and records every write it makes; commit re-applies the
//! recorded writes to the current shared state under one lock acquisition, so
//! overlapping transactions both land. Dropping the transaction discards the
//! snapshot and the log, which is the rollback. Readers never observe a
//! half-applied mutation.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use taskboard_core::{
    Activity, ActivityId, NewActivity, NewTask, Project, ProjectId, Tag, TagId, Task, TaskId,
    TaskPatch, TaskPriority, TaskStatus, User, UserId,
};

use crate::error::StoreError;
use crate::filter::{ActivityFilter, TaskFilter};
use crate::page::{Page, PageRequest};
use crate::store::{Store, StoreTxn};

#[derive(Debug, Clone)]
struct TaskRow {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<DateTime<Utc>>,
    project_id: ProjectId,
    assignee_id: Option<UserId>,
    tag_ids: Vec<TagId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ActivityRow {
    id: ActivityId,
    action: taskboard_core::ActivityAction,
    changes: taskboard_core::ChangeSet,
    task_id: Option<TaskId>,
    task_title: String,
    user_id: UserId,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct State {
    projects: BTreeMap<ProjectId, Project>,
    users: BTreeMap<UserId, User>,
    tags: BTreeMap<TagId, Tag>,
    tasks: Vec<TaskRow>,
    activities: Vec<ActivityRow>,
}

impl State {
    fn resolve_task(&self, row: &TaskRow) -> Result<Task, StoreError> {
        let project = self
            .projects
            .get(&row.project_id)
            .cloned()
            .ok_or_else(|| StoreError::backend("dangling project reference"))?;
        let assignee = match row.assignee_id {
            Some(id) => Some(
                self.users
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::backend("dangling assignee reference"))?,
            ),
            None => None,
        };
        let mut tags = Vec::with_capacity(row.tag_ids.len());
        for tag_id in &row.tag_ids {
            tags.push(
                self.tags
                    .get(tag_id)
                    .cloned()
                    .ok_or_else(|| StoreError::backend("dangling tag reference"))?,
            );
        }
        Ok(Task {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            status: row.status,
            priority: row.priority,
            due_date: row.due_date,
            project,
            assignee,
            tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn resolve_activity(&self, row: &ActivityRow) -> Activity {
        Activity {
            id: row.id,
            action: row.action,
            changes: row.changes.clone(),
            task_id: row.task_id,
            task_title: row.task_title.clone(),
            user_id: row.user_id,
            user: self.users.get(&row.user_id).cloned(),
            created_at: row.created_at,
        }
    }

    fn task_index(&self, id: TaskId) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found("task"))
    }

    fn check_project(&self, id: ProjectId) -> Result<(), StoreError> {
        if self.projects.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::not_found("project"))
        }
    }

    fn check_assignee(&self, id: UserId) -> Result<(), StoreError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::not_found("assignee"))
        }
    }

    fn check_tags(&self, ids: &[TagId]) -> Result<(), StoreError> {
        for id in ids {
            if !self.tags.contains_key(id) {
                return Err(StoreError::not_found("tag"));
            }
        }
        Ok(())
    }

    fn remove_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        let idx = self.task_index(id)?;
        self.tasks.remove(idx);
        // ON DELETE SET NULL semantics: history survives the task.
        for activity in &mut self.activities {
            if activity.task_id == Some(id) {
                activity.task_id = None;
            }
        }
        Ok(())
    }
}

fn matches_task(row: &TaskRow, filter: &TaskFilter) -> bool {
    if let Some(status) = filter.status {
        if row.status != status {
            return false;
        }
    }
    if let Some(priority) = filter.priority {
        if row.priority != priority {
            return false;
        }
    }
    if let Some(assignee_id) = filter.assignee_id {
        if row.assignee_id != Some(assignee_id) {
            return false;
        }
    }
    if let Some(project_id) = filter.project_id {
        if row.project_id != project_id {
            return false;
        }
    }
    if filter.due_date_from.is_some() || filter.due_date_to.is_some() {
        let Some(due) = row.due_date else { return false };
        if filter.due_date_from.is_some_and(|from| due < from) {
            return false;
        }
        if filter.due_date_to.is_some_and(|to| due > to) {
            return false;
        }
    }
    true
}

fn matches_activity(row: &ActivityRow, filter: &ActivityFilter) -> bool {
    if let Some(user_id) = filter.user_id {
        if row.user_id != user_id {
            return false;
        }
    }
    if let Some(action) = filter.action {
        if row.action != action {
            return false;
        }
    }
    if filter.from.is_some_and(|from| row.created_at < from) {
        return false;
    }
    if filter.to.is_some_and(|to| row.created_at > to) {
        return false;
    }
    true
}

/// In-memory task/activity store. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    /// Seed a referenced project (lifecycle-managed outside the core).
    pub fn insert_project(&self, name: impl Into<String>) -> Result<Project, StoreError> {
        let project = Project {
            id: ProjectId::new(),
            name: name.into(),
        };
        self.write()?.projects.insert(project.id, project.clone());
        Ok(project)
    }

    /// Seed a referenced user.
    pub fn insert_user(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<User, StoreError> {
        let user = User {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
        };
        self.write()?.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Seed a referenced tag.
    pub fn insert_tag(&self, name: impl Into<String>) -> Result<Tag, StoreError> {
        let tag = Tag {
            id: TagId::new(),
            name: name.into(),
        };
        self.write()?.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    /// Seed the demo dataset used for local development: three users, three
    /// projects, and four tags.
    pub fn seed_demo(&self) -> Result<(), StoreError> {
        self.insert_user("John Doe", "john@example.com")?;
        self.insert_user("Jane Smith", "jane@example.com")?;
        self.insert_user("Bob Johnson", "bob@example.com")?;
        self.insert_project("Backend API")?;
        self.insert_project("Mobile App")?;
        self.insert_project("Data Migration")?;
        for tag in ["bug", "feature", "enhancement", "documentation"] {
            self.insert_tag(tag)?;
        }
        Ok(())
    }
}

/// One staged write, replayed against the shared state on commit.
#[derive(Debug, Clone)]
enum StagedWrite {
    InsertTask(TaskRow),
    UpdateTask(TaskRow),
    DeleteTask(TaskId),
    AppendActivity(ActivityRow),
}

/// Snapshot transaction over [`MemoryStore`].
///
/// Writes go to a private snapshot and into a log; commit replays the log
/// onto the shared state, so an overlapping transaction's committed writes
/// survive. Replaying an update or delete whose target row was removed by a
/// concurrent commit fails the whole commit with a constraint error and
/// applies nothing.
pub struct MemoryTxn {
    staged: State,
    log: Vec<StagedWrite>,
    shared: Arc<RwLock<State>>,
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn find_task(&mut self, id: TaskId) -> Result<Task, StoreError> {
        let idx = self.staged.task_index(id)?;
        self.staged.resolve_task(&self.staged.tasks[idx])
    }

    async fn insert_task(&mut self, draft: &NewTask) -> Result<Task, StoreError> {
        self.staged.check_project(draft.project_id)?;
        if let Some(assignee_id) = draft.assignee_id {
            self.staged.check_assignee(assignee_id)?;
        }
        let tag_ids = draft.tag_ids.clone().unwrap_or_default();
        self.staged.check_tags(&tag_ids)?;

        let now = Utc::now();
        let row = TaskRow {
            id: TaskId::new(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status.unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            due_date: draft.due_date,
            project_id: draft.project_id,
            assignee_id: draft.assignee_id,
            tag_ids,
            created_at: now,
            updated_at: now,
        };
        let task = self.staged.resolve_task(&row)?;
        self.log.push(StagedWrite::InsertTask(row.clone()));
        self.staged.tasks.push(row);
        Ok(task)
    }

    async fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        if let Some(assignee_id) = patch.assignee_id.value() {
            self.staged.check_assignee(*assignee_id)?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            self.staged.check_tags(tag_ids)?;
        }

        let idx = self.staged.task_index(id)?;
        let row = &mut self.staged.tasks[idx];
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if patch.description.is_supplied() {
            row.description = patch.description.clone().apply(row.description.take());
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(priority) = patch.priority {
            row.priority = priority;
        }
        if patch.due_date.is_supplied() {
            row.due_date = patch.due_date.apply(row.due_date);
        }
        if patch.assignee_id.is_supplied() {
            row.assignee_id = patch.assignee_id.apply(row.assignee_id);
        }
        if let Some(tag_ids) = &patch.tag_ids {
            row.tag_ids = tag_ids.clone();
        }
        row.updated_at = Utc::now();

        let row = self.staged.tasks[idx].clone();
        self.log.push(StagedWrite::UpdateTask(row.clone()));
        self.staged.resolve_task(&row)
    }

    async fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        self.staged.remove_task(id)?;
        self.log.push(StagedWrite::DeleteTask(id));
        Ok(())
    }

    async fn append_activity(&mut self, record: NewActivity) -> Result<Activity, StoreError> {
        if !self.staged.users.contains_key(&record.user_id) {
            return Err(StoreError::constraint(format!(
                "activities.user_id references missing user {}",
                record.user_id
            )));
        }
        if let Some(task_id) = record.task_id {
            if self.staged.task_index(task_id).is_err() {
                return Err(StoreError::constraint(format!(
                    "activities.task_id references missing task {task_id}"
                )));
            }
        }
        let row = ActivityRow {
            id: ActivityId::new(),
            action: record.action,
            changes: record.changes,
            task_id: record.task_id,
            task_title: record.task_title,
            user_id: record.user_id,
            created_at: Utc::now(),
        };
        let activity = self.staged.resolve_activity(&row);
        self.log.push(StagedWrite::AppendActivity(row.clone()));
        self.staged.activities.push(row);
        Ok(activity)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut shared = self
            .shared
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        // Replay against a clone so a mid-replay conflict applies nothing.
        let mut next = shared.clone();
        for write in self.log {
            match write {
                StagedWrite::InsertTask(row) => next.tasks.push(row),
                StagedWrite::UpdateTask(row) => {
                    let idx = next.task_index(row.id).map_err(|_| {
                        StoreError::constraint(format!(
                            "task {} was removed by a concurrent transaction",
                            row.id
                        ))
                    })?;
                    next.tasks[idx] = row;
                }
                StagedWrite::DeleteTask(id) => {
                    next.remove_task(id).map_err(|_| {
                        StoreError::constraint(format!(
                            "task {id} was removed by a concurrent transaction"
                        ))
                    })?;
                }
                StagedWrite::AppendActivity(row) => next.activities.push(row),
            }
        }
        *shared = next;
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Txn = MemoryTxn;

    async fn begin(&self) -> Result<Self::Txn, StoreError> {
        let staged = self.read()?.clone();
        Ok(MemoryTxn {
            staged,
            log: Vec::new(),
            shared: Arc::clone(&self.inner),
        })
    }

    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        let state = self.read()?;
        // Vec order is insertion order, which is the stable list order.
        let mut rows = Vec::new();
        for row in state.tasks.iter().filter(|row| matches_task(row, filter)) {
            rows.push(state.resolve_task(row)?);
        }
        Ok(Page::slice(rows, page))
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let state = self.read()?;
        let idx = state.task_index(id)?;
        state.resolve_task(&state.tasks[idx])
    }

    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<&ActivityRow> = state
            .activities
            .iter()
            .filter(|row| matches_activity(row, filter))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let resolved = rows.into_iter().map(|row| state.resolve_activity(row)).collect();
        Ok(Page::slice(resolved, page))
    }

    async fn list_task_activities(
        &self,
        task_id: TaskId,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<&ActivityRow> = state
            .activities
            .iter()
            .filter(|row| row.task_id == Some(task_id))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let resolved = rows.into_iter().map(|row| state.resolve_activity(row)).collect();
        Ok(Page::slice(resolved, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_core::{ActivityAction, ChangeSet, Patch};

    fn draft(project_id: ProjectId, title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
            project_id,
            assignee_id: None,
            tag_ids: None,
        }
    }

    #[tokio::test]
    async fn committed_insert_is_visible_with_defaults() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();

        let mut txn = store.begin().await.unwrap();
        let task = txn.insert_task(&draft(project.id, "T")).await.unwrap();
        txn.commit().await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap();
        assert_eq!(loaded.title, "T");
        assert_eq!(loaded.status, TaskStatus::Todo);
        assert_eq!(loaded.priority, TaskPriority::Medium);
        assert_eq!(loaded.project.name, "P");
    }

    #[tokio::test]
    async fn dropped_txn_rolls_back() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.insert_task(&draft(project.id, "T")).await.unwrap();
        drop(txn);

        let page = store
            .list_tasks(&TaskFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn overlapping_commits_preserve_both_writes() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();

        // Two transactions open before either commits.
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_task(&draft(project.id, "A")).await.unwrap();
        second.insert_task(&draft(project.id, "B")).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let page = store
            .list_tasks(&TaskFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 2, "both committed tasks must survive");
        let titles: Vec<&str> = page.data.iter().map(|t| t.title.as_str()).collect();
        assert!(titles.contains(&"A") && titles.contains(&"B"));
    }

    #[tokio::test]
    async fn commit_conflicts_when_target_was_removed_concurrently() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();

        let mut txn = store.begin().await.unwrap();
        let task = txn.insert_task(&draft(project.id, "T")).await.unwrap();
        txn.commit().await.unwrap();

        let mut deleter = store.begin().await.unwrap();
        let mut updater = store.begin().await.unwrap();
        deleter.delete_task(task.id).await.unwrap();
        updater
            .update_task(
                task.id,
                &TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        deleter.commit().await.unwrap();

        let err = updater.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        // The losing transaction applied nothing.
        let page = store
            .list_tasks(&TaskFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn insert_rejects_missing_project() {
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        let err = txn.insert_task(&draft(ProjectId::new(), "T")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref e) if e == "project"));
    }

    #[tokio::test]
    async fn append_rejects_unknown_actor() {
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        let err = txn
            .append_activity(NewActivity {
                action: ActivityAction::Created,
                changes: ChangeSet::new(),
                task_id: None,
                task_title: "T".to_string(),
                user_id: UserId::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn delete_nullifies_activity_task_refs() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();
        let user = store.insert_user("U", "u@example.com").unwrap();

        let mut txn = store.begin().await.unwrap();
        let task = txn.insert_task(&draft(project.id, "T")).await.unwrap();
        txn.append_activity(NewActivity {
            action: ActivityAction::Created,
            changes: ChangeSet::new(),
            task_id: Some(task.id),
            task_title: task.title.clone(),
            user_id: user.id,
        })
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.delete_task(task.id).await.unwrap();
        txn.commit().await.unwrap();

        let page = store
            .list_activities(&ActivityFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].task_id, None);
        assert_eq!(page.data[0].task_title, "T");
    }

    #[tokio::test]
    async fn update_patch_semantics() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();
        let user = store.insert_user("U", "u@example.com").unwrap();

        let mut txn = store.begin().await.unwrap();
        let task = txn
            .insert_task(&NewTask {
                description: Some("desc".to_string()),
                assignee_id: Some(user.id),
                ..draft(project.id, "T")
            })
            .await
            .unwrap();
        txn.commit().await.unwrap();

        // Omitted fields stay; explicit null disconnects.
        let mut txn = store.begin().await.unwrap();
        let updated = txn
            .update_task(
                task.id,
                &TaskPatch {
                    status: Some(TaskStatus::Completed),
                    assignee_id: Patch::Null,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert!(updated.assignee.is_none());
    }

    #[tokio::test]
    async fn task_filters_restrict_results() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();
        let other = store.insert_project("Q").unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.insert_task(&NewTask {
            status: Some(TaskStatus::Todo),
            ..draft(project.id, "A")
        })
        .await
        .unwrap();
        txn.insert_task(&NewTask {
            status: Some(TaskStatus::InProgress),
            ..draft(other.id, "B")
        })
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let page = store
            .list_tasks(
                &TaskFilter {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].title, "B");

        let page = store
            .list_tasks(
                &TaskFilter {
                    project_id: Some(project.id),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.data[0].title, "A");
    }

    #[tokio::test]
    async fn due_date_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let project = store.insert_project("P").unwrap();
        let due = taskboard_core::diff::parse_instant("2024-06-15").unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.insert_task(&NewTask {
            due_date: Some(due),
            ..draft(project.id, "T")
        })
        .await
        .unwrap();
        txn.insert_task(&draft(project.id, "no-due")).await.unwrap();
        txn.commit().await.unwrap();

        let page = store
            .list_tasks(
                &TaskFilter {
                    due_date_from: Some(due),
                    due_date_to: Some(due),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].title, "T");
    }
}
