//! `taskboard-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the task/activity model, the three-state update value,
//! and the diff engine that turns a pair of snapshots into a change set.

pub mod activity;
pub mod diff;
pub mod error;
pub mod id;
pub mod patch;
pub mod task;

pub use activity::{Activity, ActivityAction, ChangeSet, ChangeValue, FieldChange, NewActivity};
pub use error::{DomainError, DomainResult};
pub use id::{ActivityId, ProjectId, TagId, TaskId, UserId};
pub use patch::Patch;
pub use task::{NewTask, Project, Tag, Task, TaskPatch, TaskPriority, TaskStatus, User};
