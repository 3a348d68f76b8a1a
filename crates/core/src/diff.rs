//! Diff engine: pure functions computing field-level change sets between two
//! snapshots of a task.
//!
//! Three diff kinds cover the heterogeneous field types:
//! - scalar fields (title, description, status, priority, assignee id),
//! - the temporal field (due date), compared as canonical instants,
//! - the tag id set, compared order-insensitively.
//!
//! Every function returns an empty [`ChangeSet`]; callers merge the partial
//! maps into one change set per mutation. "Field not supplied" is distinct
//! from "field set to null": unsupplied fields are never reported.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::activity::{ChangeSet, ChangeValue, FieldChange};
use crate::error::DomainError;
use crate::patch::Patch;

/// Diff scalar fields.
///
/// Each entry is `(field, old, supplied)`: `supplied` is `None` when the
/// update payload did not mention the field, and `Some(value)` (possibly
/// `ChangeValue::Null`) when it did. A field is reported only when it was
/// supplied with a value different from the original.
pub fn scalar_changes<I>(fields: I) -> ChangeSet
where
    I: IntoIterator<Item = (&'static str, ChangeValue, Option<ChangeValue>)>,
{
    let mut changes = ChangeSet::new();
    for (field, old, supplied) in fields {
        if let Some(new) = supplied {
            if new != old {
                changes.insert(field.to_string(), FieldChange { old, new });
            }
        }
    }
    changes
}

/// Diff the due date, comparing canonical instants.
///
/// Both sides are `DateTime<Utc>` by the time they reach the diff engine
/// (see [`parse_instant`]), so two textual representations of the same moment
/// never produce a false positive. An `Unset` patch reports nothing.
pub fn date_change(
    field: &'static str,
    original: Option<DateTime<Utc>>,
    updated: Patch<DateTime<Utc>>,
) -> ChangeSet {
    let mut changes = ChangeSet::new();
    let new = match updated {
        Patch::Unset => return changes,
        Patch::Null => None,
        Patch::Value(ts) => Some(ts),
    };
    if new != original {
        changes.insert(
            field.to_string(),
            FieldChange {
                old: ChangeValue::from_opt_timestamp(original),
                new: ChangeValue::from_opt_timestamp(new),
            },
        );
    }
    changes
}

/// Diff two unordered id collections (tag membership).
///
/// Both sides are normalized by sorting before comparison; the reported
/// old/new values are the sorted forms, not the original order.
pub fn id_set_change(field: &'static str, original: &[Uuid], updated: &[Uuid]) -> ChangeSet {
    let mut old_sorted = original.to_vec();
    let mut new_sorted = updated.to_vec();
    old_sorted.sort();
    new_sorted.sort();

    let mut changes = ChangeSet::new();
    if old_sorted != new_sorted {
        changes.insert(
            field.to_string(),
            FieldChange {
                old: ChangeValue::IdList(old_sorted),
                new: ChangeValue::IdList(new_sorted),
            },
        );
    }
    changes
}

/// Normalize a date-like string to a canonical UTC instant.
///
/// Accepts RFC 3339 timestamps in any offset, or a bare `YYYY-MM-DD` date
/// (taken as midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, DomainError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(DateTime::from_naive_utc_and_offset(midnight, Utc));
    }
    Err(DomainError::validation(format!(
        "'{s}' is not a valid RFC 3339 timestamp or YYYY-MM-DD date"
    )))
}

/// Merge partial change sets into one, in argument order.
pub fn merge_changes<I>(parts: I) -> ChangeSet
where
    I: IntoIterator<Item = ChangeSet>,
{
    let mut merged = ChangeSet::new();
    for part in parts {
        merged.extend(part);
    }
    merged
}
