//! Request/response DTOs and JSON mapping.
//!
//! Requests carry ids, enums, and dates as strings and are parsed here into
//! domain types; a parse failure becomes a 400 response before any service
//! call. Update payloads keep "absent" and "null" apart (see `Patch`).

use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};

use taskboard_core::diff::parse_instant;
use taskboard_core::{
    Activity, ActivityAction, NewTask, Patch, ProjectId, Tag, TagId, Task, TaskPatch,
    TaskPriority, TaskStatus, User, UserId,
};
use taskboard_store::{ActivityFilter, Page, PageRequest, TaskFilter};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub project_id: String,
    pub assignee_id: Option<String>,
    pub tag_ids: Option<Vec<String>>,
}

impl CreateTaskRequest {
    pub fn into_draft(self) -> Result<NewTask, Response> {
        Ok(NewTask {
            title: self.title,
            description: self.description,
            status: self.status.as_deref().map(parse_status).transpose()?,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            due_date: self.due_date.as_deref().map(parse_date).transpose()?,
            project_id: parse_id::<ProjectId>(&self.project_id)?,
            assignee_id: self.assignee_id.as_deref().map(parse_id::<UserId>).transpose()?,
            tag_ids: self.tag_ids.map(parse_tag_ids).transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Patch<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Patch<String>,
    #[serde(default)]
    pub assignee_id: Patch<String>,
    pub tag_ids: Option<Vec<String>>,
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> Result<TaskPatch, Response> {
        let due_date = match self.due_date {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(s) => Patch::Value(parse_date(&s)?),
        };
        let assignee_id = match self.assignee_id {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(s) => Patch::Value(parse_id::<UserId>(&s)?),
        };
        Ok(TaskPatch {
            title: self.title,
            description: self.description,
            status: self.status.as_deref().map(parse_status).transpose()?,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            due_date,
            assignee_id,
            tag_ids: self.tag_ids.map(parse_tag_ids).transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<String>,
    pub project_id: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
}

impl TaskListQuery {
    pub fn into_parts(self) -> Result<(TaskFilter, PageRequest), Response> {
        // Unparseable page/limit fall back to defaults; filter values must
        // parse or the request is rejected.
        let page = PageRequest::lenient(self.page.as_deref(), self.limit.as_deref());
        let filter = TaskFilter {
            status: self.status.as_deref().map(parse_status).transpose()?,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            assignee_id: self.assignee_id.as_deref().map(parse_id::<UserId>).transpose()?,
            project_id: self.project_id.as_deref().map(parse_id::<ProjectId>).transpose()?,
            due_date_from: self.due_date_from.as_deref().map(parse_date).transpose()?,
            due_date_to: self.due_date_to.as_deref().map(parse_date).transpose()?,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ActivityListQuery {
    pub fn into_parts(self) -> Result<(ActivityFilter, PageRequest), Response> {
        let page = PageRequest::lenient(self.page.as_deref(), self.limit.as_deref());
        let filter = ActivityFilter {
            user_id: self.user_id.as_deref().map(parse_id::<UserId>).transpose()?,
            action: self.action.as_deref().map(parse_action).transpose()?,
            from: self.from.as_deref().map(parse_date).transpose()?,
            to: self.to.as_deref().map(parse_date).transpose()?,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::lenient(self.page.as_deref(), self.limit.as_deref())
    }
}

// -------------------------
// Parse helpers
// -------------------------

fn invalid(err: impl std::fmt::Display) -> Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

fn parse_status(s: &str) -> Result<TaskStatus, Response> {
    s.parse().map_err(invalid)
}

fn parse_priority(s: &str) -> Result<TaskPriority, Response> {
    s.parse().map_err(invalid)
}

fn parse_action(s: &str) -> Result<ActivityAction, Response> {
    s.parse().map_err(invalid)
}

fn parse_date(s: &str) -> Result<chrono::DateTime<chrono::Utc>, Response> {
    parse_instant(s).map_err(invalid)
}

fn parse_id<T: std::str::FromStr>(s: &str) -> Result<T, Response>
where
    T::Err: std::fmt::Display,
{
    s.parse().map_err(invalid)
}

fn parse_tag_ids(ids: Vec<String>) -> Result<Vec<TagId>, Response> {
    ids.iter().map(|s| parse_id::<TagId>(s)).collect()
}

// -------------------------
// Response mapping
// -------------------------

pub fn task_to_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "status": task.status,
        "priority": task.priority,
        "dueDate": task.due_date,
        "projectId": task.project.id,
        "project": { "id": task.project.id, "name": task.project.name },
        "assigneeId": task.assignee_id(),
        "assignee": task.assignee.as_ref().map(user_to_json),
        "tags": task.tags.iter().map(tag_to_json).collect::<Vec<_>>(),
        "createdAt": task.created_at,
        "updatedAt": task.updated_at,
    })
}

pub fn activity_to_json(activity: &Activity) -> Value {
    json!({
        "id": activity.id,
        "action": activity.action,
        "changes": activity.changes,
        "taskId": activity.task_id,
        "taskTitle": activity.task_title,
        "userId": activity.user_id,
        "user": activity.user.as_ref().map(user_to_json),
        "createdAt": activity.created_at,
    })
}

fn user_to_json(user: &User) -> Value {
    json!({ "id": user.id, "name": user.name, "email": user.email })
}

fn tag_to_json(tag: &Tag) -> Value {
    json!({ "id": tag.id, "name": tag.name })
}

pub fn page_to_json<T>(page: &Page<T>, item: impl Fn(&T) -> Value) -> Value {
    json!({
        "data": page.data.iter().map(item).collect::<Vec<_>>(),
        "meta": page.meta,
    })
}
