//! Store contracts: read paths plus the transactional unit of work.

use async_trait::async_trait;

use taskboard_core::{Activity, NewActivity, NewTask, Task, TaskId, TaskPatch};

use crate::error::StoreError;
use crate::filter::{ActivityFilter, TaskFilter};
use crate::page::{Page, PageRequest};

/// One open transaction: the unit-of-work object passed through a mutation's
/// task write and activity append so both commit or neither does.
///
/// Dropping a transaction without calling [`commit`](StoreTxn::commit) rolls
/// back every write made through it. Implementations must also validate
/// referential existence (project, assignee, tags, actor) at write time,
/// reporting `StoreError::NotFound` for missing mutation references and
/// `StoreError::Constraint` for append-side violations.
#[async_trait]
pub trait StoreTxn: Send {
    /// Load a task with its references resolved, or `None`.
    async fn find_task(&mut self, id: TaskId) -> Result<Task, StoreError>;

    /// Insert a new task. `status`/`priority` default to `TODO`/`MEDIUM`
    /// when the draft leaves them unset.
    async fn insert_task(&mut self, draft: &NewTask) -> Result<Task, StoreError>;

    /// Apply a partial update. Unset patch fields leave stored values
    /// untouched; a supplied tag list fully replaces the tag set.
    /// Fails with `NotFound` if the task does not exist.
    async fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError>;

    /// Delete a task. Fails with `NotFound` if the task does not exist.
    /// Existing activity records keep their rows; their task reference is
    /// nullified, never cascaded.
    async fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError>;

    /// Append one activity record (append-only; id and timestamp are
    /// assigned here).
    async fn append_activity(&mut self, record: NewActivity) -> Result<Activity, StoreError>;

    /// Commit every write made through this transaction.
    async fn commit(self) -> Result<(), StoreError>;
}

/// Task/activity persistence.
///
/// Read paths are lock-free from the caller's perspective and may run
/// concurrently with mutations; a reader observes either the pre- or
/// post-state of an in-flight transaction, never a partial one.
#[async_trait]
pub trait Store: Send + Sync {
    type Txn: StoreTxn;

    /// Open a transaction for a mutation.
    async fn begin(&self) -> Result<Self::Txn, StoreError>;

    /// List tasks in insertion order with pagination metadata.
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError>;

    /// Fetch one task with references resolved.
    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    /// List activities newest-first with pagination metadata.
    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError>;

    /// List activities for one task, newest-first.
    async fn list_task_activities(
        &self,
        task_id: TaskId,
        page: PageRequest,
    ) -> Result<Page<Activity>, StoreError>;
}
