//! Structural merging of configuration overlays
//!
//! An overlay is a partial configuration document applied on top of the base:
//! - objects merge key by key, recursively
//! - scalars from the overlay win
//! - arrays from the overlay replace the base array (no concatenation)
//! - an explicit `null` in the overlay clears the field
//!
//! Neither input is modified; the merged document is a fresh value.

use serde_json::{Map, Value};

/// Apply `overlay` on top of `base` and return the merged document.
pub fn merge_overlay(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            merge_into(&mut merged, overlay_map);
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn merge_into(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(overlay_child) => match target.get_mut(key) {
                Some(Value::Object(base_child)) => merge_into(base_child, overlay_child),
                _ => {
                    // Nothing to merge into; drop nulls nested in the overlay itself
                    let mut fresh = Map::new();
                    merge_into(&mut fresh, overlay_child);
                    target.insert(key.clone(), Value::Object(fresh));
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}
