//! Field alias tables and value decoders for stored records.
//!
//! Each canonical field lists the keys it may be stored under, modern name
//! first. A key whose value is `null` or cannot be decoded into the wanted
//! type counts as absent and resolution moves on to the next alias.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

pub const ID: &[&str] = &["id"];
pub const CATEGORY: &[&str] = &["category"];
pub const TITLE: &[&str] = &["title", "name"];
pub const AUTHOR: &[&str] = &["author", "developer"];
pub const BODY: &[&str] = &["body", "description"];
pub const IMAGE: &[&str] = &["primaryImage", "image"];
pub const ICON: &[&str] = &["icon"];
pub const IMAGE_LIST: &[&str] = &["imageList", "images"];
pub const STATUS: &[&str] = &["status"];
pub const PUBLISHED_FLAG: &[&str] = &["published", "isPublished"];
pub const STORE: &[&str] = &["store", "platform"];
pub const STORE_LINK: &[&str] = &["storeLink", "storeUrl"];
pub const TAGS: &[&str] = &["tags"];
pub const TIMESTAMP: &[&str] = &["sortTimestamp", "uploadDate", "publishedAt", "createdAt"];
pub const RATING: &[&str] = &["rating"];
pub const DOWNLOADS: &[&str] = &["downloadCount", "downloads"];
pub const VERSION: &[&str] = &["version"];
pub const SIZE: &[&str] = &["size"];
pub const VIEWS: &[&str] = &["views"];
pub const LIKES: &[&str] = &["likes"];

pub const DEFAULT_RATING: f64 = 4.5;
pub const DEFAULT_DOWNLOADS: &str = "1K+";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_SIZE: &str = "50MB";

/// Return the first alias whose value decodes successfully.
pub fn resolve<T>(
    object: &Map<String, Value>,
    aliases: &[&str],
    decode: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    aliases
        .iter()
        .filter_map(|key| object.get(*key))
        .filter(|value| !value.is_null())
        .find_map(decode)
}

/// Strings pass through; numbers are rendered as text.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-empty trimmed string. Used for identifiers and URLs.
pub fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

pub fn float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_count)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_count))
        }
        _ => None,
    }
}

/// Truncate a float to a count. Negative, non-finite and out-of-range values
/// are undecodable.
fn whole_count(v: f64) -> Option<u64> {
    // u64::MAX as f64 rounds up to 2^64, the first value that does not fit
    if v.is_finite() && v >= 0.0 && v < u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

/// Array of URLs. Non-string and empty elements are dropped; an array with
/// nothing usable left counts as absent.
pub fn url_list(value: &Value) -> Option<Vec<String>> {
    let urls: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(non_empty_string)
        .collect();
    if urls.is_empty() {
        None
    } else {
        Some(urls)
    }
}

/// Tags from an array of strings or a comma-joined string. Order of first
/// appearance is kept and duplicates are dropped.
pub fn tags(value: &Value) -> Option<Vec<String>> {
    let candidates: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect(),
        Value::String(joined) => joined.split(',').map(str::to_string).collect(),
        _ => return None,
    };

    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for tag in candidates {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    Some(out)
}

/// RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC), plain
/// dates, or epoch milliseconds.
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s.trim()),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
