//! Record normalization.
//!
//! Stored blobs are heterogeneous: records written by current code use the
//! canonical camelCase keys, older records use legacy names (`name`,
//! `developer`, `description`, `isPublished`, ...), and some blobs hold an
//! array of records instead of a single object. Normalization maps all of
//! them onto [`CanonicalRecord`] with every field populated.

pub mod fields;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{CanonicalRecord, Category, Status, StorePlatform};

/// Why a raw value produced no record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("value is not a JSON object")]
    NotAnObject,

    #[error("record has no string id")]
    MissingId,
}

/// Shape of a parsed blob.
#[derive(Debug)]
pub enum BlobPayload<'a> {
    Single(&'a Map<String, Value>),
    Batch(&'a [Value]),
    Unsupported,
}

impl<'a> BlobPayload<'a> {
    pub fn decode(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => BlobPayload::Single(map),
            Value::Array(items) => BlobPayload::Batch(items),
            _ => BlobPayload::Unsupported,
        }
    }
}

/// Publish signals carried by a raw record. Both are kept because they may
/// disagree; `published` latches true if either says so.
#[derive(Debug, Clone, Copy, Default)]
struct PublishSignals {
    explicit_status: Option<Status>,
    legacy_flag: Option<bool>,
}

impl PublishSignals {
    fn read(object: &Map<String, Value>) -> Self {
        Self {
            explicit_status: fields::resolve(object, fields::STATUS, |v| {
                v.as_str().and_then(Status::parse)
            }),
            legacy_flag: fields::resolve(object, fields::PUBLISHED_FLAG, fields::boolean),
        }
    }

    fn published(&self) -> bool {
        self.explicit_status == Some(Status::Published) || self.legacy_flag == Some(true)
    }

    fn status(&self) -> Status {
        match self.explicit_status {
            Some(status) => status,
            None if self.legacy_flag == Some(true) => Status::Published,
            None => Status::Development,
        }
    }
}

/// Category a record belongs to: its own declared category when valid, else
/// the category the caller asked for, else `gallery`.
pub fn resolve_category(object: &Map<String, Value>, requested: Option<Category>) -> Category {
    fields::resolve(object, fields::CATEGORY, |v| v.as_str().and_then(Category::parse))
        .or(requested)
        .unwrap_or(Category::Gallery)
}

/// Normalize a single raw value into a canonical record.
///
/// `now` is only used as the default `sortTimestamp`; given the same input
/// and `now` the result is always the same.
pub fn normalize(
    raw: &Value,
    requested: Option<Category>,
    now: DateTime<Utc>,
) -> Result<CanonicalRecord, Rejection> {
    let object = raw.as_object().ok_or(Rejection::NotAnObject)?;
    normalize_object(object, requested, now)
}

pub fn normalize_object(
    object: &Map<String, Value>,
    requested: Option<Category>,
    now: DateTime<Utc>,
) -> Result<CanonicalRecord, Rejection> {
    let id = fields::resolve(object, fields::ID, fields::non_empty_string)
        .ok_or(Rejection::MissingId)?;

    let primary_image = fields::resolve(object, fields::IMAGE, fields::non_empty_string)
        .or_else(|| fields::resolve(object, fields::ICON, fields::non_empty_string))
        .or_else(|| {
            fields::resolve(object, fields::IMAGE_LIST, fields::url_list)
                .and_then(|urls| urls.into_iter().next())
        })
        .unwrap_or_default();

    let image_list = fields::resolve(object, fields::IMAGE_LIST, fields::url_list)
        .unwrap_or_else(|| {
            if primary_image.is_empty() {
                Vec::new()
            } else {
                vec![primary_image.clone()]
            }
        });

    let signals = PublishSignals::read(object);

    Ok(CanonicalRecord {
        id,
        category: resolve_category(object, requested),
        title: fields::resolve(object, fields::TITLE, fields::text).unwrap_or_default(),
        author: fields::resolve(object, fields::AUTHOR, fields::text).unwrap_or_default(),
        body: fields::resolve(object, fields::BODY, fields::text).unwrap_or_default(),
        primary_image,
        image_list,
        published: signals.published(),
        status: signals.status(),
        store: fields::resolve(object, fields::STORE, |v| {
            v.as_str().and_then(StorePlatform::parse)
        })
        .unwrap_or_default(),
        store_link: fields::resolve(object, fields::STORE_LINK, |v| {
            v.as_str().map(str::to_string)
        }),
        tags: fields::resolve(object, fields::TAGS, fields::tags).unwrap_or_default(),
        sort_timestamp: fields::resolve(object, fields::TIMESTAMP, fields::timestamp)
            .unwrap_or(now),
        rating: fields::resolve(object, fields::RATING, fields::float)
            .unwrap_or(fields::DEFAULT_RATING),
        download_count: fields::resolve(object, fields::DOWNLOADS, fields::text)
            .unwrap_or_else(|| fields::DEFAULT_DOWNLOADS.to_string()),
        version: fields::resolve(object, fields::VERSION, fields::text)
            .unwrap_or_else(|| fields::DEFAULT_VERSION.to_string()),
        size: fields::resolve(object, fields::SIZE, fields::text)
            .unwrap_or_else(|| fields::DEFAULT_SIZE.to_string()),
        views: fields::resolve(object, fields::VIEWS, fields::count).unwrap_or(0),
        likes: fields::resolve(object, fields::LIKES, fields::count).unwrap_or(0),
    })
}

/// Normalize every record in a parsed blob. Arrays are expanded element-wise;
/// rejected elements are returned alongside their index so callers can log them.
pub fn normalize_payload(
    payload: &Value,
    requested: Option<Category>,
    now: DateTime<Utc>,
) -> (Vec<CanonicalRecord>, Vec<(usize, Rejection)>) {
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    match BlobPayload::decode(payload) {
        BlobPayload::Single(object) => match normalize_object(object, requested, now) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.push((0, reason)),
        },
        BlobPayload::Batch(items) => {
            for (index, item) in items.iter().enumerate() {
                match normalize(item, requested, now) {
                    Ok(record) => records.push(record),
                    Err(reason) => rejected.push((index, reason)),
                }
            }
        }
        BlobPayload::Unsupported => rejected.push((0, Rejection::NotAnObject)),
    }

    (records, rejected)
}
