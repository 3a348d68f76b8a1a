//! Task entity and its referenced entities.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{ProjectId, TagId, TaskId, UserId};
use crate::patch::Patch;

/// Task status lifecycle (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "status must be one of TODO, IN_PROGRESS, COMPLETED, CANCELLED (got '{other}')"
            ))),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

/// Task priority (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
            TaskPriority::Urgent => "URGENT",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(TaskPriority::Low),
            "MEDIUM" => Ok(TaskPriority::Medium),
            "HIGH" => Ok(TaskPriority::High),
            "URGENT" => Ok(TaskPriority::Urgent),
            other => Err(DomainError::validation(format!(
                "priority must be one of LOW, MEDIUM, HIGH, URGENT (got '{other}')"
            ))),
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// A project a task belongs to. Lifecycle-managed outside this core; only
/// referenced and denormalized here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// A user (assignee or actor). Lifecycle-managed outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A tag. Lifecycle-managed outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// A task with its project, assignee, and tags resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub project: Project,
    pub assignee: Option<User>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn project_id(&self) -> ProjectId {
        self.project.id
    }

    pub fn assignee_id(&self) -> Option<UserId> {
        self.assignee.as_ref().map(|u| u.id)
    }

    pub fn tag_ids(&self) -> Vec<TagId> {
        self.tags.iter().map(|t| t.id).collect()
    }
}

/// Validated input for creating a task.
///
/// `status`/`priority` stay `Option` so the activity change set can report
/// exactly the fields the caller supplied; the store applies the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: ProjectId,
    pub assignee_id: Option<UserId>,
    pub tag_ids: Option<Vec<TagId>>,
}

impl NewTask {
    /// Required-field validation: title must be non-empty.
    ///
    /// Referential existence (project, assignee, tags) is checked at write
    /// time inside the store transaction.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        Ok(())
    }
}

/// Partial update for a task.
///
/// Fields left at their defaults were not mentioned in the payload and leave
/// the stored value untouched. `assignee_id` and the other nullable fields use
/// [`Patch`] so "explicitly null" (disconnect) stays distinguishable from
/// "omitted". A supplied `tag_ids` fully replaces the tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Patch<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Patch<DateTime<Utc>>,
    pub assignee_id: Patch<UserId>,
    pub tag_ids: Option<Vec<TagId>>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DomainError::validation("title must not be empty"));
            }
        }
        Ok(())
    }

    /// True when no field is mentioned at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && !self.description.is_supplied()
            && self.status.is_none()
            && self.priority.is_none()
            && !self.due_date.is_supplied()
            && !self.assignee_id.is_supplied()
            && self.tag_ids.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in ["TODO", "IN_PROGRESS", "COMPLETED", "CANCELLED"] {
            assert_eq!(TaskStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(TaskStatus::from_str("DONE").is_err());
    }

    #[test]
    fn priority_round_trips_through_str() {
        for p in ["LOW", "MEDIUM", "HIGH", "URGENT"] {
            assert_eq!(TaskPriority::from_str(p).unwrap().as_str(), p);
        }
        assert!(TaskPriority::from_str("urgent").is_err());
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, r#""IN_PROGRESS""#);
    }

    #[test]
    fn new_task_rejects_blank_title() {
        let draft = NewTask {
            title: "   ".to_string(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
            project_id: ProjectId::new(),
            assignee_id: None,
            tag_ids: None,
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
