//! Null-safe readers over provider JSON and the small conversions applied to
//! extracted values before they land in a record.
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::record::FieldValue;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

const WITH_TIME: &str = "%Y-%m-%d %H:%M:%S UTC";
const DATE_ONLY: &str = "%Y-%m-%d";

/// Follow a dotted path. `None` as soon as a segment is absent or the value
/// being indexed is not an object. An empty path returns `value` itself.
pub fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.')
        .try_fold(value, |cur, key| cur.as_object().and_then(|m| m.get(key)))
}

/// Read a scalar at `path`.
///
/// ```
/// use pulse_social::extract::lookup;
/// use pulse_social::record::FieldValue;
/// use serde_json::json;
///
/// let body = json!({"user": {"username": "nasa", "stats": [1, 2]}});
/// assert_eq!(lookup(&body, "user.username"), FieldValue::Text("nasa".into()));
/// assert_eq!(lookup(&body, "user.stats"), FieldValue::Missing);
/// assert_eq!(lookup(&body, "user.username.first"), FieldValue::Missing);
/// ```
pub fn lookup(value: &Value, path: &str) -> FieldValue {
    walk(value, path)
        .map(FieldValue::from_json)
        .unwrap_or(FieldValue::Missing)
}

/// Whether `path` holds a present, non-empty, non-zero, non-false value.
pub fn is_truthy(value: &Value, path: &str) -> bool {
    match walk(value, path) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Array of strings at `path`, joined with `", "`.
pub fn joined(value: &Value, path: &str) -> FieldValue {
    let parts: Vec<&str> = walk(value, path)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if parts.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Text(parts.join(", "))
    }
}

/// Render an epoch timestamp (seconds or milliseconds) in UTC.
///
/// Accepts integers, floats, numeric strings and RFC 3339 strings. Anything
/// else is `Missing`.
///
/// ```
/// use pulse_social::extract::format_timestamp;
/// use pulse_social::record::FieldValue;
///
/// let secs = format_timestamp(&FieldValue::Integer(1_700_000_000), true);
/// assert_eq!(secs, FieldValue::Text("2023-11-14 22:13:20 UTC".into()));
/// let millis = format_timestamp(&FieldValue::Integer(1_700_000_000_000), false);
/// assert_eq!(millis, FieldValue::Text("2023-11-14".into()));
/// ```
pub fn format_timestamp(value: &FieldValue, with_time: bool) -> FieldValue {
    let instant = match value {
        FieldValue::Integer(i) => from_epoch(*i),
        FieldValue::Float(x) if x.is_finite() => from_epoch(x.trunc() as i64),
        FieldValue::Text(s) => parse_text_timestamp(s.trim()),
        _ => None,
    };
    match instant {
        Some(dt) => FieldValue::Text(
            dt.format(if with_time { WITH_TIME } else { DATE_ONLY })
                .to_string(),
        ),
        None => FieldValue::Missing,
    }
}

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    let secs = if raw > MILLIS_THRESHOLD { raw / 1000 } else { raw };
    DateTime::from_timestamp(secs, 0)
}

fn parse_text_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(i) = s.parse::<i64>() {
        return from_epoch(i);
    }
    if let Ok(x) = s.parse::<f64>() {
        return x.is_finite().then(|| from_epoch(x.trunc() as i64)).flatten();
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Cut text longer than `max_chars` characters and mark the cut with `...`.
pub fn truncate_text(value: FieldValue, max_chars: usize) -> FieldValue {
    match value {
        FieldValue::Text(s) if s.chars().count() > max_chars => {
            let mut cut: String = s.chars().take(max_chars).collect();
            cut.push_str("...");
            FieldValue::Text(cut)
        }
        other => other,
    }
}

/// Durations above 1000 that are whole thousands are milliseconds.
pub fn normalize_duration(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Integer(i) if i > 1000 && i % 1000 == 0 => FieldValue::Integer(i / 1000),
        FieldValue::Float(x) if x > 1000.0 && x % 1000.0 == 0.0 => FieldValue::Float(x / 1000.0),
        v @ (FieldValue::Integer(_) | FieldValue::Float(_)) => v,
        _ => FieldValue::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walk_stops_at_non_objects() {
        let v = json!({"a": {"b": [1, 2]}, "c": "x"});
        assert!(walk(&v, "a.b").is_some());
        assert!(walk(&v, "a.b.0").is_none());
        assert!(walk(&v, "c.d").is_none());
        assert!(walk(&v, "missing").is_none());
        assert_eq!(walk(&v, ""), Some(&v));
    }

    #[test]
    fn lookup_never_returns_containers_or_nulls() {
        let v = json!({"a": {"b": null, "c": {}, "d": 3}});
        assert_eq!(lookup(&v, "a.b"), FieldValue::Missing);
        assert_eq!(lookup(&v, "a.c"), FieldValue::Missing);
        assert_eq!(lookup(&v, "a"), FieldValue::Missing);
        assert_eq!(lookup(&v, "a.d"), FieldValue::Integer(3));
    }

    #[test]
    fn truthiness_follows_marker_rules() {
        let v = json!({
            "t": true, "f": false, "zero": 0, "one": 1, "empty": "",
            "s": "x", "arr": [], "full": [1], "obj": {}, "null": null
        });
        for path in ["t", "one", "s", "full"] {
            assert!(is_truthy(&v, path), "{path}");
        }
        for path in ["f", "zero", "empty", "arr", "obj", "null", "absent"] {
            assert!(!is_truthy(&v, path), "{path}");
        }
    }

    #[test]
    fn timestamps_auto_scale_and_format() {
        let with_time = FieldValue::Text("2023-11-14 22:13:20 UTC".into());
        assert_eq!(format_timestamp(&FieldValue::Integer(1_700_000_000), true), with_time);
        assert_eq!(format_timestamp(&FieldValue::Integer(1_700_000_000_000), true), with_time);
        assert_eq!(format_timestamp(&"1700000000".into(), true), with_time);
        assert_eq!(format_timestamp(&FieldValue::Float(1_700_000_000.9), true), with_time);
        assert_eq!(
            format_timestamp(&FieldValue::Integer(1_700_000_000), false),
            FieldValue::Text("2023-11-14".into())
        );
    }

    #[test]
    fn rfc3339_strings_are_accepted() {
        assert_eq!(
            format_timestamp(&"2023-11-14T22:13:20Z".into(), true),
            FieldValue::Text("2023-11-14 22:13:20 UTC".into())
        );
    }

    #[test]
    fn unparsable_timestamps_are_missing() {
        assert_eq!(format_timestamp(&"yesterday".into(), true), FieldValue::Missing);
        assert_eq!(format_timestamp(&FieldValue::Missing, true), FieldValue::Missing);
        assert_eq!(format_timestamp(&FieldValue::Bool(true), true), FieldValue::Missing);
    }

    #[test]
    fn truncation_counts_characters() {
        let long = "é".repeat(71);
        let FieldValue::Text(cut) = truncate_text(long.into(), 70) else {
            panic!("expected text");
        };
        assert_eq!(cut.chars().count(), 73);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_text("short".into(), 70), FieldValue::Text("short".into()));
        assert_eq!(truncate_text(FieldValue::Missing, 70), FieldValue::Missing);
    }

    #[test]
    fn durations_in_whole_thousands_are_milliseconds() {
        assert_eq!(normalize_duration(FieldValue::Integer(15_000)), FieldValue::Integer(15));
        assert_eq!(normalize_duration(FieldValue::Integer(1_500)), FieldValue::Integer(1_500));
        assert_eq!(normalize_duration(FieldValue::Integer(1_000)), FieldValue::Integer(1_000));
        assert_eq!(normalize_duration(FieldValue::Integer(42)), FieldValue::Integer(42));
        assert_eq!(normalize_duration("42".into()), FieldValue::Missing);
    }

    #[test]
    fn joined_handles_empty_and_non_arrays() {
        let v = json!({"tags": ["a", "b"], "none": [], "text": "x"});
        assert_eq!(joined(&v, "tags"), FieldValue::Text("a, b".into()));
        assert_eq!(joined(&v, "none"), FieldValue::Missing);
        assert_eq!(joined(&v, "text"), FieldValue::Missing);
    }
}
