//! Task orchestration.
//!
//! Every mutation runs as one unit of work: the task write and its activity
//! append share a transaction, so a failed append rolls the task write back.
//! Assignment notifications are dispatched only after the commit succeeds and
//! never affect the caller's result.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use taskboard_core::diff::{date_change, id_set_change, merge_changes, scalar_changes};
use taskboard_core::{
    Activity, ActivityAction, ChangeSet, ChangeValue, FieldChange, NewActivity, NewTask, Patch,
    TagId, Task, TaskId, TaskPatch, UserId,
};
use taskboard_store::{ActivityFilter, Page, PageRequest, Store, StoreTxn, TaskFilter};

use crate::error::ServiceResult;
use crate::notify::Notifier;

/// Task mutation and query orchestrator over a [`Store`] backend.
pub struct TaskService<S, N> {
    store: S,
    notifier: Arc<N>,
}

impl<S: Store, N: Notifier> TaskService<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier: Arc::new(notifier),
        }
    }

    /// Create a task. When an actor is known, a `created` activity recording
    /// every supplied field (as `null -> value`) is appended in the same
    /// transaction. If the new task has an assignee, a notification is
    /// dispatched after commit.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_task(&self, actor: Option<UserId>, draft: NewTask) -> ServiceResult<Task> {
        draft.validate()?;

        let mut txn = self.store.begin().await?;
        let task = txn.insert_task(&draft).await?;
        if let Some(actor) = actor {
            txn.append_activity(NewActivity {
                action: ActivityAction::Created,
                changes: creation_changes(&draft),
                task_id: Some(task.id),
                task_title: task.title.clone(),
                user_id: actor,
            })
            .await?;
        }
        txn.commit().await?;
        info!(task_id = %task.id, "task created");

        if let Some(assignee) = &task.assignee {
            self.spawn_notification(assignee.email.clone(), task.title.clone());
        }
        Ok(task)
    }

    /// Apply a partial update. An `updated` activity is appended only when the
    /// computed change set is non-empty; a no-op update leaves no trace. If the
    /// update sets or changes the assignee, the new assignee is notified after
    /// commit.
    #[instrument(skip(self, patch))]
    pub async fn update_task(
        &self,
        actor: Option<UserId>,
        id: TaskId,
        patch: TaskPatch,
    ) -> ServiceResult<Task> {
        patch.validate()?;

        let mut txn = self.store.begin().await?;
        let original = txn.find_task(id).await?;
        let updated = txn.update_task(id, &patch).await?;

        let changes = update_changes(&original, &patch);
        if let Some(actor) = actor {
            if !changes.is_empty() {
                txn.append_activity(NewActivity {
                    action: ActivityAction::Updated,
                    changes,
                    task_id: Some(id),
                    task_title: updated.title.clone(),
                    user_id: actor,
                })
                .await?;
            }
        }
        txn.commit().await?;

        if let Some(assignee) = &updated.assignee {
            if original.assignee_id() != Some(assignee.id) {
                self.spawn_notification(assignee.email.clone(), updated.title.clone());
            }
        }
        Ok(updated)
    }

    /// Delete a task. The `deleted` activity carries no task reference (the
    /// row is gone) but keeps the title denormalized, so the trail stays
    /// legible.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, actor: Option<UserId>, id: TaskId) -> ServiceResult<()> {
        let mut txn = self.store.begin().await?;
        let task = txn.find_task(id).await?;
        txn.delete_task(id).await?;
        if let Some(actor) = actor {
            txn.append_activity(NewActivity {
                action: ActivityAction::Deleted,
                changes: ChangeSet::new(),
                task_id: None,
                task_title: task.title,
                user_id: actor,
            })
            .await?;
        }
        txn.commit().await?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Task>> {
        Ok(self.store.list_tasks(filter, page).await?)
    }

    pub async fn get_task(&self, id: TaskId) -> ServiceResult<Task> {
        Ok(self.store.get_task(id).await?)
    }

    pub async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Activity>> {
        Ok(self.store.list_activities(filter, page).await?)
    }

    /// History of one task, newest first. This is the global listing narrowed
    /// to a single task reference, so an unknown or deleted task id simply
    /// yields an empty page; deleted tasks' activities have their reference
    /// nullified and stay reachable through the global listing.
    pub async fn task_activities(
        &self,
        id: TaskId,
        page: PageRequest,
    ) -> ServiceResult<Page<Activity>> {
        Ok(self.store.list_task_activities(id, page).await?)
    }

    fn spawn_notification(&self, email: String, task_title: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.notify_assignment(&email, &task_title).await {
                warn!(%err, email, task_title, "assignment notification dropped");
            }
        });
    }
}

/// Change set for a creation: every supplied field reported as
/// `{old: null, new: value}`. Tag membership is not part of creation records.
fn creation_changes(draft: &NewTask) -> ChangeSet {
    let mut changes = ChangeSet::new();
    let mut record = |field: &str, new: ChangeValue| {
        changes.insert(
            field.to_string(),
            FieldChange {
                old: ChangeValue::Null,
                new,
            },
        );
    };

    record("title", ChangeValue::text(draft.title.as_str()));
    if let Some(description) = &draft.description {
        record("description", ChangeValue::text(description.as_str()));
    }
    if let Some(status) = draft.status {
        record("status", ChangeValue::text(status.as_str()));
    }
    if let Some(priority) = draft.priority {
        record("priority", ChangeValue::text(priority.as_str()));
    }
    if let Some(due_date) = draft.due_date {
        record("dueDate", ChangeValue::Timestamp(due_date));
    }
    if let Some(assignee_id) = draft.assignee_id {
        record("assigneeId", ChangeValue::Id(assignee_id.into()));
    }
    changes
}

/// Change set for an update: supplied-and-changed fields only.
fn update_changes(original: &Task, patch: &TaskPatch) -> ChangeSet {
    let scalars = scalar_changes([
        (
            "title",
            ChangeValue::text(original.title.as_str()),
            patch.title.as_deref().map(ChangeValue::text),
        ),
        (
            "description",
            ChangeValue::from_opt_text(original.description.as_deref()),
            supplied_text(&patch.description),
        ),
        (
            "status",
            ChangeValue::text(original.status.as_str()),
            patch.status.map(|s| ChangeValue::text(s.as_str())),
        ),
        (
            "priority",
            ChangeValue::text(original.priority.as_str()),
            patch.priority.map(|p| ChangeValue::text(p.as_str())),
        ),
        (
            "assigneeId",
            ChangeValue::from_opt_id(original.assignee_id().map(Into::into)),
            supplied_id(patch.assignee_id),
        ),
    ]);
    let due = date_change("dueDate", original.due_date, patch.due_date);
    let tags = match &patch.tag_ids {
        Some(new_ids) => id_set_change(
            "tags",
            &tag_uuids(&original.tag_ids()),
            &tag_uuids(new_ids),
        ),
        None => ChangeSet::new(),
    };
    merge_changes([scalars, due, tags])
}

fn supplied_text(patch: &Patch<String>) -> Option<ChangeValue> {
    match patch {
        Patch::Unset => None,
        Patch::Null => Some(ChangeValue::Null),
        Patch::Value(s) => Some(ChangeValue::text(s.as_str())),
    }
}

fn supplied_id(patch: Patch<UserId>) -> Option<ChangeValue> {
    match patch {
        Patch::Unset => None,
        Patch::Null => Some(ChangeValue::Null),
        Patch::Value(id) => Some(ChangeValue::Id(id.into())),
    }
}

fn tag_uuids(ids: &[TagId]) -> Vec<uuid::Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}
