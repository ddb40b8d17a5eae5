//! Recursive merge of template data layers.
use serde_json::{Map, Value};

/// Merge `source` into `dest`. Maps present on both sides merge key by key;
/// any other value in `source` replaces the value in `dest`.
pub fn recursive_merge(dest: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, source_value) in source {
        match (dest.get_mut(key), source_value) {
            (Some(Value::Object(dest_map)), Value::Object(source_map)) => {
                recursive_merge(dest_map, source_map);
            }
            _ => {
                dest.insert(key.clone(), source_value.clone());
            }
        }
    }
}
