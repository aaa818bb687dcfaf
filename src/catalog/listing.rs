use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::Catalog;
use crate::domain::{CanonicalRecord, Category};
use crate::error::{CatalogError, Result};
use crate::metrics;
use crate::normalize::normalize_payload;
use crate::partitions::{is_record_blob, partitions_for, Visibility};
use crate::storage::{BlobObject, BlobStore};

impl Catalog {
    /// List the visible records of a category, newest first.
    ///
    /// Blobs that cannot be fetched or parsed, and values the normalizer
    /// rejects, are skipped. Failing to enumerate a partition fails the whole
    /// listing.
    pub async fn list(&self, category: Category) -> Result<Vec<CanonicalRecord>> {
        let started = Instant::now();
        metrics::listing::request(category.as_str());

        let blobs = self.enumerate(category).await?;
        let blob_count = blobs.len();
        let fetched = self.fetch_all(blobs).await;

        let now = Utc::now();
        let visibility = Visibility::for_category(category);
        let mut records = Vec::new();
        for (blob, payload) in fetched {
            let (normalized, rejected) = normalize_payload(&payload, Some(category), now);
            for (index, reason) in rejected {
                metrics::listing::record_rejected();
                debug!("Skipping element {} of {}: {}", index, blob.pathname, reason);
            }
            records.extend(normalized.into_iter().filter(|r| visibility.admits(r)));
        }
        sort_by_recency(&mut records);

        metrics::listing::records_listed(category.as_str(), records.len());
        metrics::listing::duration(started.elapsed().as_secs_f64());
        info!(
            category = %category,
            blobs = blob_count,
            records = records.len(),
            "Listed catalog"
        );
        Ok(records)
    }

    /// JSON blobs of every partition backing `category`, in partition order.
    async fn enumerate(&self, category: Category) -> Result<Vec<BlobObject>> {
        let mut blobs = Vec::new();
        for partition in partitions_for(category) {
            let objects = self.store.list(partition).await.map_err(|e| {
                metrics::storage::error("list");
                CatalogError::Upstream(e)
            })?;
            blobs.extend(objects.into_iter().filter(|o| is_record_blob(&o.pathname)));
        }
        Ok(blobs)
    }

    /// Fetch and parse blobs concurrently. The output keeps the input order;
    /// failed blobs are dropped.
    async fn fetch_all(&self, blobs: Vec<BlobObject>) -> Vec<(BlobObject, Value)> {
        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let handles: Vec<_> = blobs
            .into_iter()
            .map(|blob| {
                let store = Arc::clone(&self.store);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    fetch_json(store.as_ref(), blob).await
                })
            })
            .collect();

        let mut fetched = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(entry)) => fetched.push(entry),
                Ok(None) => {}
                Err(e) => {
                    metrics::listing::blob_skipped("task");
                    warn!("Blob fetch task failed: {}", e);
                }
            }
        }
        fetched
    }
}

async fn fetch_json(store: &dyn BlobStore, blob: BlobObject) -> Option<(BlobObject, Value)> {
    let bytes = match store.get(&blob.pathname).await {
        Ok(bytes) => bytes,
        Err(e) => {
            metrics::listing::blob_skipped("fetch");
            warn!("Skipping {}: fetch failed: {}", blob.pathname, e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(payload) => Some((blob, payload)),
        Err(e) => {
            metrics::listing::blob_skipped("parse");
            warn!("Skipping {}: not valid JSON: {}", blob.pathname, e);
            None
        }
    }
}

/// Newest first. Records with equal timestamps keep their relative order.
pub fn sort_by_recency(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| b.sort_timestamp.cmp(&a.sort_timestamp));
}
