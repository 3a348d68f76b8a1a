//! Three-state update value for partial-update payloads.

use serde::{Deserialize, Deserializer};

/// A field in an update payload that distinguishes "not mentioned" from
/// "explicitly set to null" from "set to a value".
///
/// A plain `Option<T>` collapses the first two states, which would make an
/// omitted field silently clear existing data. `Patch<T>` keeps them apart:
/// pair it with `#[serde(default)]` so an absent JSON key deserializes to
/// `Unset`, while an explicit `null` deserializes to `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch<T> {
    /// The field was absent from the payload; leave the current value alone.
    Unset,
    /// The field was explicitly `null`; clear the current value.
    Null,
    /// The field was supplied; replace the current value.
    Value(T),
}

impl<T> Patch<T> {
    /// True unless the field was absent from the payload.
    pub fn is_supplied(&self) -> bool {
        !matches!(self, Patch::Unset)
    }

    /// The supplied value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Collapse to the value this patch would leave behind, given the current one.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Unset => current,
            Patch::Null => None,
            Patch::Value(v) => Some(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(v) => Patch::Value(f(v)),
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(v) => Patch::Value(v),
        }
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present: JSON null becomes Null,
        // anything else becomes Value. Absent keys rely on #[serde(default)].
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default)]
        name: Patch<String>,
    }

    #[test]
    fn absent_key_is_unset() {
        let p: Payload = serde_json::from_str("{}").unwrap();
        assert_eq!(p.name, Patch::Unset);
    }

    #[test]
    fn explicit_null_is_null() {
        let p: Payload = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(p.name, Patch::Null);
    }

    #[test]
    fn supplied_value_is_value() {
        let p: Payload = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(p.name, Patch::Value("x".to_string()));
    }

    #[test]
    fn apply_keeps_current_when_unset() {
        assert_eq!(Patch::<i32>::Unset.apply(Some(1)), Some(1));
        assert_eq!(Patch::<i32>::Null.apply(Some(1)), None);
        assert_eq!(Patch::Value(2).apply(Some(1)), Some(2));
    }
}
