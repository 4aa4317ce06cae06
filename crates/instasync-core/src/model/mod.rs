//! Display-ready documents built from decoded upstream records.

mod campaign;
mod lead;

pub use campaign::{Campaign, CampaignMetrics};
pub use lead::Lead;

use serde_json::Value;

/// First non-empty string among `keys`. Numeric values are stringified.
pub(crate) fn str_field(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First non-negative integer among `keys`.
pub(crate) fn u64_field(record: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| {
        let v = record.get(*key)?;
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

/// First JSON object among `keys`, or an empty object.
pub(crate) fn object_field(record: &Value, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| record.get(*key).filter(|v| v.is_object()).cloned())
        .unwrap_or_else(|| Value::Object(Default::default()))
}

/// String array under `key`; non-string entries are dropped.
pub(crate) fn tags_field(record: &Value, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Serialize `doc` and drop its `id` key; the id is the document key.
pub(crate) fn without_id<T: serde::Serialize>(doc: &T) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(doc)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(value)
}
