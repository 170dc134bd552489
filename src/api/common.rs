//! Common API utilities
//!
//! List requests use bracket notation in the query string
//! (`pagination[page]=2`, `filters[region][id][$eq]=3`, `sort[0]=name:asc`).
//! [`parse_query`] turns such a query string into a nested JSON object.

use serde_json::{Map, Value};

/// Maximum bracket depth; deeper segments are kept as one literal key
pub const MAX_DEPTH: usize = 10;

/// Decode one query-string component (`+` is a space)
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned(),
    }
}

/// Split `a[b][c]` into `["a", "b", "c"]`.
///
/// `[]` yields an empty segment (append). Brackets past [`MAX_DEPTH`] stay
/// together as one final literal segment; an unclosed bracket is literal.
fn split_key(key: &str) -> Vec<String> {
    let (root, mut rest) = match key.find('[') {
        Some(0) | None => return vec![key.to_string()],
        Some(pos) => (&key[..pos], &key[pos..]),
    };

    let mut segments = vec![root.to_string()];
    while rest.starts_with('[') {
        if segments.len() > MAX_DEPTH {
            segments.push(rest.to_string());
            return segments;
        }
        match rest.find(']') {
            Some(end) => {
                segments.push(rest[1..end].to_string());
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }

    if !rest.is_empty() {
        if let Some(last) = segments.last_mut() {
            last.push_str(rest);
        }
    }
    segments
}

/// Next free positional key of an object
fn next_index(map: &Map<String, Value>) -> String {
    map.len().to_string()
}

fn insert(map: &mut Map<String, Value>, segments: &[String], value: String) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };
    let key = if head.is_empty() { next_index(map) } else { head.clone() };

    if tail.is_empty() {
        match map.get_mut(&key) {
            None => {
                map.insert(key, Value::String(value));
            }
            // Repeated key: collect values positionally
            Some(Value::Object(existing)) => {
                let index = next_index(existing);
                existing.insert(index, Value::String(value));
            }
            Some(existing) => {
                let previous = existing.take();
                let mut list = Map::new();
                list.insert("0".to_string(), previous);
                list.insert("1".to_string(), Value::String(value));
                *existing = Value::Object(list);
            }
        }
        return;
    }

    let child = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        let previous = child.take();
        let mut wrapped = Map::new();
        wrapped.insert("0".to_string(), previous);
        *child = Value::Object(wrapped);
    }
    if let Value::Object(child_map) = child {
        insert(child_map, tail, value);
    }
}

/// Whether the keys of `map` are exactly `0..n`
fn is_positional(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && (0..map.len()).all(|i| map.contains_key(&i.to_string()))
}

/// Turn positional objects into arrays, recursively
fn finalize(value: Value) -> Value {
    match value {
        Value::Object(map) if is_positional(&map) => {
            let mut map = map;
            let items = (0..map.len())
                .filter_map(|i| map.remove(&i.to_string()))
                .map(finalize)
                .collect();
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, finalize(v))).collect()),
        other => other,
    }
}

/// Parse a bracket-notation query string into a nested object.
///
/// Every leaf is a string; callers coerce where they need numbers.
pub fn parse_query(raw: &str) -> Map<String, Value> {
    let mut root = Map::new();

    for pair in raw.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        if key.is_empty() {
            continue;
        }
        let value = decode_component(raw_value);
        insert(&mut root, &split_key(&key), value);
    }

    root.into_iter().map(|(k, v)| (k, finalize(v))).collect()
}
