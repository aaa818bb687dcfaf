use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::Catalog;
use crate::domain::{CanonicalRecord, Category};
use crate::error::{CatalogError, Result};
use crate::metrics;
use crate::normalize::{fields, normalize_object, resolve_category};
use crate::partitions::{
    file_name, is_record_blob, partitions_for, primary_partition, record_pathname, JSON_SUFFIX,
};
use crate::storage::{BlobObject, StorageError};

/// Form fields copied into a new record. Anything else in a form submission
/// is ignored.
pub const FORM_FIELDS: &[&str] = &[
    "title",
    "body",
    "author",
    "tags",
    "published",
    "isPublished",
    "status",
    "store",
    "storeLink",
    "storeUrl",
    "category",
    "image",
];

/// Binary file uploaded with a new record.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum CreateInput {
    /// A full record, e.g. an existing item being moved to another category.
    Record(Value),
    Form {
        fields: HashMap<String, String>,
        attachment: Option<Attachment>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub record: CanonicalRecord,
    pub location: BlobObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: String,
    pub pathnames: Vec<String>,
}

/// Every JSON blob holding a record id, across all partitions of a
/// category, plus the assets stored next to them.
struct Located {
    records: Vec<BlobObject>,
    assets: Vec<BlobObject>,
}

impl Located {
    fn record_pathnames(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|o| o.pathname.as_str())
    }
}

fn upstream(op: &'static str) -> impl Fn(StorageError) -> CatalogError {
    move |e| {
        metrics::storage::error(op);
        CatalogError::Upstream(e)
    }
}

impl Catalog {
    /// Store a new record under a freshly generated id.
    pub async fn create(&self, category: Option<Category>, input: CreateInput) -> Result<Created> {
        let (mut object, attachment) = match input {
            CreateInput::Record(Value::Object(map)) => (map, None),
            CreateInput::Record(_) => {
                return Err(CatalogError::MalformedRecord(
                    "expected a JSON object".to_string(),
                ))
            }
            CreateInput::Form { fields, attachment } => (form_to_object(&fields), attachment),
        };

        let id = new_record_id();
        object.insert("id".to_string(), Value::String(id.clone()));
        let target = resolve_category(&object, category);

        if let Some(attachment) = attachment {
            let pathname = format!(
                "{}/{}-{}",
                primary_partition(target),
                id,
                sanitize_file_name(&attachment.file_name)
            );
            let asset = self
                .store
                .put(&pathname, attachment.bytes, &attachment.content_type)
                .await
                .map_err(upstream("put"))?;
            info!(id = %id, pathname = %asset.pathname, "Stored attachment");
            object.insert("primaryImage".to_string(), Value::String(asset.url));
        }

        let record = normalize_object(&object, Some(target), Utc::now())
            .map_err(|e| CatalogError::MalformedRecord(e.to_string()))?;
        let location = self.write_record(&record).await?;

        metrics::mutations::applied("create");
        info!(id = %record.id, category = %record.category, "Created record");
        Ok(Created { record, location })
    }

    /// Replace the stored record with the same id.
    pub async fn update(&self, category: Option<Category>, body: Value) -> Result<CanonicalRecord> {
        let object = body
            .as_object()
            .ok_or_else(|| CatalogError::MalformedRecord("expected a JSON object".to_string()))?;
        let id = fields::resolve(object, fields::ID, fields::non_empty_string)
            .ok_or_else(|| CatalogError::MissingParameter("id".to_string()))?;
        let search = category.unwrap_or_else(|| resolve_category(object, None));

        let existing = self
            .locate(search, &id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                category: search,
                id: id.clone(),
            })?;

        let record = normalize_object(object, Some(search), Utc::now())
            .map_err(|e| CatalogError::MalformedRecord(e.to_string()))?;
        let location = self.write_record(&record).await?;
        let stale: Vec<String> = existing
            .record_pathnames()
            .filter(|pathname| *pathname != location.pathname)
            .map(str::to_string)
            .collect();
        if !stale.is_empty() {
            self.store
                .delete(&stale)
                .await
                .map_err(upstream("delete"))?;
        }

        metrics::mutations::applied("update");
        info!(
            id = %record.id,
            to = %location.pathname,
            removed = ?stale,
            "Updated record"
        );
        Ok(record)
    }

    /// Remove a record and any asset stored next to it.
    pub async fn delete(&self, category: Category, id: &str) -> Result<Deleted> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CatalogError::MissingParameter("id".to_string()));
        }

        let located = self
            .locate(category, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                category,
                id: id.to_string(),
            })?;

        let pathnames: Vec<String> = located
            .records
            .into_iter()
            .chain(located.assets)
            .map(|object| object.pathname)
            .collect();
        self.store
            .delete(&pathnames)
            .await
            .map_err(upstream("delete"))?;

        metrics::mutations::applied("delete");
        info!(id = %id, category = %category, removed = pathnames.len(), "Deleted record");
        Ok(Deleted {
            id: id.to_string(),
            pathnames,
        })
    }

    async fn write_record(&self, record: &CanonicalRecord) -> Result<BlobObject> {
        let pathname = record_pathname(primary_partition(record.category), &record.id);
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| CatalogError::MalformedRecord(e.to_string()))?;
        self.store
            .put(&pathname, bytes, "application/json")
            .await
            .map_err(upstream("put"))
    }

    /// Find every blob named `<id>.json` in the partitions of `category`,
    /// together with the assets named `<id>-<file>` next to them. `None`
    /// when no partition holds the record.
    async fn locate(&self, category: Category, id: &str) -> Result<Option<Located>> {
        let json_name = format!("{}{}", id, JSON_SUFFIX);
        let asset_prefix = format!("{}-", id);

        let mut located = Located {
            records: Vec::new(),
            assets: Vec::new(),
        };
        for partition in partitions_for(category) {
            let objects = self.store.list(partition).await.map_err(upstream("list"))?;
            for object in objects {
                let name = file_name(&object.pathname);
                if name == json_name {
                    located.records.push(object);
                } else if name.starts_with(&asset_prefix) && !is_record_blob(&object.pathname) {
                    located.assets.push(object);
                }
            }
        }

        if located.records.is_empty() {
            Ok(None)
        } else {
            Ok(Some(located))
        }
    }
}

fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

fn form_to_object(fields: &HashMap<String, String>) -> Map<String, Value> {
    FORM_FIELDS
        .iter()
        .filter_map(|key| fields.get(*key).map(|value| (*key, value.trim())))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

/// Reduce an uploaded file name to a safe final path segment. The result
/// never ends in `.json`, so an attachment is never mistaken for a record.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let mut cleaned = cleaned.trim_matches(|c| c == '.' || c == '-').to_string();
    if cleaned.is_empty() {
        cleaned = "attachment".to_string();
    }
    if is_record_blob(&cleaned) {
        cleaned.push_str(".bin");
    }
    cleaned
}
