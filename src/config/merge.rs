//! Layer construction and merging
//!
//! Layers are JSON objects merged in precedence order:
//! - Objects: deep-merge by key
//! - Arrays and scalars: the later layer wins
//! - Null: clears the earlier value

use serde_json::{Map, Value};

/// Deep merge `overlay` into `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Set a dotted key path (e.g. `poll.interval_seconds`) inside an object,
/// creating intermediate tables as needed.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let Value::Object(map) = root else {
        return;
    };

    match path.split_once('.') {
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
        None => {
            map.insert(path.to_string(), value);
        }
    }
}

/// Build a layer from `(dotted path, value)` pairs, skipping absent values
pub fn layer_from_pairs<I>(pairs: I) -> Option<Value>
where
    I: IntoIterator<Item = (&'static str, Option<Value>)>,
{
    let mut layer = Value::Object(Map::new());
    let mut empty = true;
    for (path, value) in pairs {
        if let Some(value) = value {
            set_path(&mut layer, path, value);
            empty = false;
        }
    }
    if empty {
        None
    } else {
        Some(layer)
    }
}

/// Convert a parsed TOML document into a JSON value
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
