//! JSON merge patch (RFC 7386) for the mock stores

use crate::error::ClientError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Merge `patch` into `target`: objects merge recursively, `null` deletes a key, any
/// other value replaces the target wholesale.
pub fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Apply a merge patch to a typed object by round-tripping it through JSON
pub fn apply_merge_patch<T: Serialize + DeserializeOwned>(obj: &T, patch: &Value) -> Result<T, ClientError> {
    let mut value = serde_json::to_value(obj)?;
    merge(&mut value, patch);
    Ok(serde_json::from_value(value)?)
}
