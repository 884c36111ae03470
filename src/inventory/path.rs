//! Dotted-path addressing over raw API responses
//!
//! Responses are opaque JSON trees; nothing here knows a per-service schema.

use serde_json::{Map, Value};

/// Top-level response keys that never hold resources
const NON_RESOURCE_KEYS: &[&str] = &[
    "ResponseMetadata",
    "NextToken",
    "nextToken",
    "Marker",
    "NextMarker",
    "IsTruncated",
    "MaxItems",
    "MaxResults",
    "ContinuationToken",
    "NextContinuationToken",
];

/// Look up a dotted path such as `Placement.AvailabilityZone`.
///
/// Numeric segments index into arrays (`SecurityGroups.0.GroupId`).
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Pull the resource items out of one raw response.
///
/// With a collection path, each segment is followed through every array met
/// on the way (`Reservations.Instances` flattens all reservations). Without
/// one, the first array-valued top-level key is used, falling back to the
/// first object-valued key for single-resource responses.
pub fn collect_items(response: &Value, collection_path: Option<&str>) -> Vec<Value> {
    match collection_path {
        Some(path) if !path.is_empty() => collect_along_path(response, path),
        _ => collect_heuristic(response),
    }
}

fn collect_along_path(response: &Value, path: &str) -> Vec<Value> {
    let mut current: Vec<&Value> = vec![response];

    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Array(items) => {
                    next.extend(items.iter().filter_map(|item| item.get(segment)));
                }
                other => next.extend(other.get(segment)),
            }
        }
        current = next;
    }

    let key = path.rsplit('.').next().unwrap_or(path);
    current
        .into_iter()
        .flat_map(|v| expand(key, v))
        .collect()
}

fn collect_heuristic(response: &Value) -> Vec<Value> {
    let map = match response {
        Value::Array(_) => return expand("Id", response),
        Value::Object(map) => map,
        _ => return Vec::new(),
    };

    let candidates = || {
        map.iter()
            .filter(|(k, _)| !NON_RESOURCE_KEYS.contains(&k.as_str()))
    };

    if let Some((key, value)) = candidates().find(|(_, v)| v.is_array()) {
        return expand(key, value);
    }

    candidates()
        .find(|(_, v)| v.is_object())
        .map(|(_, v)| vec![v.clone()])
        .unwrap_or_default()
}

/// Arrays become their elements; scalars are wrapped as `{singular(key): v}`.
fn expand(key: &str, value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().map(|item| wrap_scalar(key, item)).collect(),
        Value::Null => Vec::new(),
        other => vec![wrap_scalar(key, other)],
    }
}

fn wrap_scalar(key: &str, value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => value.clone(),
        scalar => {
            let mut map = Map::new();
            map.insert(singularize(key), scalar.clone());
            Value::Object(map)
        }
    }
}

/// English plural -> singular, good enough for API collection names
pub fn singularize(word: &str) -> String {
    const IRREGULAR: &[(&str, &str)] = &[
        ("aliases", "alias"),
        ("Aliases", "Alias"),
        ("statuses", "status"),
        ("Statuses", "Status"),
        ("indices", "index"),
    ];

    for (plural, singular) in IRREGULAR {
        if let Some(stem) = word.strip_suffix(plural) {
            return format!("{}{}", stem, singular);
        }
    }

    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
