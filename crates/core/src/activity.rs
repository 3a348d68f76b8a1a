//! Append-only activity records and their typed change sets.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::{ActivityId, TaskId, UserId};
use crate::task::User;

/// What a mutation did (closed, extensible set). Lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActivityAction::Created),
            "updated" => Ok(ActivityAction::Updated),
            "deleted" => Ok(ActivityAction::Deleted),
            other => Err(DomainError::validation(format!(
                "action must be one of created, updated, deleted (got '{other}')"
            ))),
        }
    }
}

/// One side of a recorded field change.
///
/// A closed variant set instead of raw JSON: every value a diff can report is
/// one of these. `Null` is tried first on deserialization so JSON `null` maps
/// back to it; timestamps and ids are tried before plain text so their string
/// forms stay typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeValue {
    Null,
    Timestamp(DateTime<Utc>),
    Id(Uuid),
    IdList(Vec<Uuid>),
    Text(String),
}

impl ChangeValue {
    pub fn text(s: impl Into<String>) -> Self {
        ChangeValue::Text(s.into())
    }

    pub fn from_opt_text(s: Option<&str>) -> Self {
        match s {
            Some(s) => ChangeValue::Text(s.to_string()),
            None => ChangeValue::Null,
        }
    }

    pub fn from_opt_id(id: Option<Uuid>) -> Self {
        match id {
            Some(id) => ChangeValue::Id(id),
            None => ChangeValue::Null,
        }
    }

    pub fn from_opt_timestamp(ts: Option<DateTime<Utc>>) -> Self {
        match ts {
            Some(ts) => ChangeValue::Timestamp(ts),
            None => ChangeValue::Null,
        }
    }
}

/// An old/new pair for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: ChangeValue,
    pub new: ChangeValue,
}

/// Field name → `{old, new}` mapping produced by one mutation.
///
/// A `BTreeMap` keeps serialized change sets in a stable field order.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// An appended activity record: a write-once fact.
///
/// `task_id` is `None` for `deleted` actions (the row is gone; the reference
/// must never dangle) and nullified later if the referenced task is deleted.
/// `task_title` is denormalized so the record stays legible either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub action: ActivityAction,
    pub changes: ChangeSet,
    pub task_id: Option<TaskId>,
    pub task_title: String,
    pub user_id: UserId,
    /// Actor resolved for display; absent if the user row is gone.
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
}

/// An activity ready to be appended (id and timestamp assigned by the store).
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub action: ActivityAction,
    pub changes: ChangeSet,
    pub task_id: Option<TaskId>,
    pub task_title: String,
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ActivityAction::Created).unwrap(), r#""created""#);
        assert_eq!("deleted".parse::<ActivityAction>().unwrap(), ActivityAction::Deleted);
        assert!("renamed".parse::<ActivityAction>().is_err());
    }

    #[test]
    fn change_value_null_round_trips() {
        let json = serde_json::to_string(&ChangeValue::Null).unwrap();
        assert_eq!(json, "null");
        let back: ChangeValue = serde_json::from_str("null").unwrap();
        assert_eq!(back, ChangeValue::Null);
    }

    #[test]
    fn change_set_serializes_as_object() {
        let mut changes = ChangeSet::new();
        changes.insert(
            "status".to_string(),
            FieldChange {
                old: ChangeValue::text("TODO"),
                new: ChangeValue::text("COMPLETED"),
            },
        );
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json["status"]["old"], "TODO");
        assert_eq!(json["status"]["new"], "COMPLETED");
    }

    #[test]
    fn timestamps_and_ids_stay_typed_through_serde() {
        let ts = ChangeValue::Timestamp(Utc::now());
        let back: ChangeValue = serde_json::from_value(serde_json::to_value(&ts).unwrap()).unwrap();
        assert!(matches!(back, ChangeValue::Timestamp(_)));

        let id = ChangeValue::Id(Uuid::now_v7());
        let back: ChangeValue = serde_json::from_value(serde_json::to_value(&id).unwrap()).unwrap();
        assert!(matches!(back, ChangeValue::Id(_)));
    }
}
