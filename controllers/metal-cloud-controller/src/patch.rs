//! Merge patch construction
//!
//! Writes are decided by comparing one field of a snapshot against its desired value, so
//! a patch carries only the field that changed and nothing is sent when nothing changed.

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Merge patch bringing label `key` to `desired`, or `None` when it is already there
///
/// `desired == None` removes the label.
pub fn label_patch(
    labels: Option<&BTreeMap<String, String>>,
    key: &str,
    desired: Option<&str>,
) -> Option<Value> {
    let current = labels.and_then(|labels| labels.get(key)).map(String::as_str);
    if current == desired {
        return None;
    }
    Some(json!({
        "metadata": {
            "labels": {
                key: desired,
            }
        }
    }))
}
