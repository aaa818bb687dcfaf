use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{normalize_folder, validate_pathname, BlobObject, BlobStore, Result, StorageError};
use crate::config::SupabaseSettings;

const LIST_PAGE_SIZE: usize = 1000;

/// Blob store backed by Supabase Storage.
///
/// Objects live in one bucket, optionally below a path prefix. Reads go
/// through the authenticated object endpoint with `Cache-Control: no-cache`
/// so listings never see a CDN-cached copy.
pub struct SupabaseBlobStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    key: String,
    prefix: String,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    // Folders come back without an id
    id: Option<String>,
    updated_at: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl SupabaseBlobStore {
    pub fn new(settings: &SupabaseSettings) -> Result<Self> {
        let base_url = settings.base_url().ok_or_else(|| {
            StorageError::Config("SUPABASE_URL or SUPABASE_PROJECT_REF must be set".to_string())
        })?;
        let key = settings
            .service_role_key
            .clone()
            .ok_or_else(|| StorageError::Config("SUPABASE_SERVICE_ROLE_KEY must be set".to_string()))?;
        let bucket = settings
            .bucket
            .clone()
            .ok_or_else(|| StorageError::Config("SUPABASE_BUCKET must be set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            key,
            prefix: settings.prefix.trim_matches('/').to_string(),
        })
    }

    fn object_key(&self, pathname: &str) -> String {
        match (self.prefix.is_empty(), pathname.is_empty()) {
            (true, _) => pathname.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, pathname),
        }
    }

    fn object_endpoint(&self, pathname: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            self.object_key(pathname)
        )
    }

    pub fn public_url(&self, pathname: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            self.object_key(pathname)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.key))
            .header("apikey", self.key.clone())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn entry_to_object(&self, folder: &str, entry: ListEntry) -> BlobObject {
        let pathname = if folder.is_empty() {
            entry.name
        } else {
            format!("{}/{}", folder, entry.name)
        };
        let size = entry
            .metadata
            .as_ref()
            .and_then(|m| m.get("size"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let uploaded_at = entry
            .updated_at
            .or(entry.created_at)
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        BlobObject {
            url: self.public_url(&pathname),
            pathname,
            size,
            uploaded_at,
        }
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn list(&self, folder: &str) -> Result<Vec<BlobObject>> {
        let folder = normalize_folder(folder);
        let endpoint = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let list_prefix = self.object_key(folder);

        let mut objects = Vec::new();
        let mut offset = 0usize;
        loop {
            let body = json!({
                "prefix": list_prefix,
                "limit": LIST_PAGE_SIZE,
                "offset": offset,
                "sortBy": { "column": "name", "order": "asc" }
            });
            let resp = self
                .authorize(self.client.post(&endpoint))
                .json(&body)
                .send()
                .await?;
            let entries: Vec<ListEntry> = Self::check(resp).await?.json().await?;
            let page_len = entries.len();

            objects.extend(
                entries
                    .into_iter()
                    .filter(|entry| entry.id.is_some())
                    .map(|entry| self.entry_to_object(folder, entry)),
            );

            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        debug!("Listed {} objects under {}", objects.len(), folder);
        Ok(objects)
    }

    async fn get(&self, pathname: &str) -> Result<Vec<u8>> {
        validate_pathname(pathname)?;
        let resp = self
            .authorize(self.client.get(self.object_endpoint(pathname)))
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(pathname.to_string()));
        }
        let bytes = Self::check(resp).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, pathname: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobObject> {
        validate_pathname(pathname)?;
        let size = bytes.len() as u64;
        let resp = self
            .authorize(self.client.put(self.object_endpoint(pathname)))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .query(&[("upsert", "true")])
            .body(bytes)
            .send()
            .await?;
        Self::check(resp).await?;

        debug!("Uploaded {} ({} bytes)", pathname, size);
        Ok(BlobObject {
            pathname: pathname.to_string(),
            url: self.public_url(pathname),
            size,
            uploaded_at: Some(Utc::now()),
        })
    }

    async fn delete(&self, pathnames: &[String]) -> Result<()> {
        if pathnames.is_empty() {
            return Ok(());
        }
        for pathname in pathnames {
            validate_pathname(pathname)?;
        }
        let prefixes: Vec<String> = pathnames.iter().map(|p| self.object_key(p)).collect();
        let endpoint = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let resp = self
            .authorize(self.client.delete(&endpoint))
            .json(&json!({ "prefixes": prefixes }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
