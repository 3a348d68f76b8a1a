//! Filter criteria for the task and activity list surfaces.

use chrono::{DateTime, Utc};

use taskboard_core::{ActivityAction, ProjectId, TaskPriority, TaskStatus, UserId};

/// Filter criteria for task listing. All fields optional; absent fields do
/// not restrict the result. Due-date bounds are inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<UserId>,
    pub project_id: Option<ProjectId>,
    pub due_date_from: Option<DateTime<Utc>>,
    pub due_date_to: Option<DateTime<Utc>>,
}

/// Filter criteria for the global activity feed. Creation-time bounds are
/// inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub user_id: Option<UserId>,
    pub action: Option<ActivityAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
