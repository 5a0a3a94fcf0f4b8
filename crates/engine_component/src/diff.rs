//! Attribute-level state differ.
//!
//! Both inputs are full serialised snapshots of the same entity. Values are
//! compared by JSON value equality, so nested values (a rect's four numbers,
//! a velocity pair) are compared structurally.

use crate::entity::AttrMap;

/// Return the attributes of `current` whose value differs from `previous`.
///
/// Keys present only in `previous` are not reported: an entity's attribute
/// set is fixed by its type, and removal has no wire representation.
#[must_use]
pub fn diff(previous: &AttrMap, current: &AttrMap) -> AttrMap {
    current
        .iter()
        .filter(|(key, value)| previous.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn snapshot(value: Value) -> AttrMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let x = snapshot(json!({ "rect": [0, 600, 1920, 20], "updater": "server" }));
        assert!(diff(&x, &x).is_empty());
    }

    #[test]
    fn test_diff_reports_exactly_changed_keys() {
        let previous = snapshot(json!({
            "rect": [100, 100, 50, 50],
            "health": 100,
            "weapon": "w1",
            "updater": "a",
        }));
        let current = snapshot(json!({
            "rect": [100, 104, 50, 50],
            "health": 90,
            "weapon": "w1",
            "updater": "a",
        }));

        let delta = diff(&previous, &current);
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get("rect"), Some(&json!([100, 104, 50, 50])));
        assert_eq!(delta.get("health"), Some(&json!(90)));
    }

    #[test]
    fn test_nested_values_compare_by_value() {
        let previous = snapshot(json!({ "velocity": [1.5, 0.0] }));
        let same = snapshot(json!({ "velocity": [1.5, 0.0] }));
        let changed = snapshot(json!({ "velocity": [1.5, 0.25] }));
        assert!(diff(&previous, &same).is_empty());
        assert_eq!(diff(&previous, &changed).len(), 1);
    }

    #[test]
    fn test_new_key_is_reported() {
        let previous = snapshot(json!({ "a": 1 }));
        let current = snapshot(json!({ "a": 1, "b": null }));
        let delta = diff(&previous, &current);
        assert_eq!(delta.get("b"), Some(&Value::Null));
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn test_removed_key_is_not_reported() {
        let previous = snapshot(json!({ "a": 1, "b": 2 }));
        let current = snapshot(json!({ "a": 1 }));
        assert!(diff(&previous, &current).is_empty());
    }
}
