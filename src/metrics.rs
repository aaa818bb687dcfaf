//! Metrics for the catalog service.
//!
//! Metric names live in [`MetricName`] so call sites never spell them out.
//! Recording is a no-op until a recorder is installed with [`init`].

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    ListingRequests,
    ListingDuration,
    RecordsListed,
    BlobsSkipped,
    RecordsRejected,
    Mutations,
    StorageErrors,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ListingRequests => "gallery_listing_requests_total",
            MetricName::ListingDuration => "gallery_listing_duration_seconds",
            MetricName::RecordsListed => "gallery_records_listed_total",
            MetricName::BlobsSkipped => "gallery_blobs_skipped_total",
            MetricName::RecordsRejected => "gallery_records_rejected_total",
            MetricName::Mutations => "gallery_mutations_total",
            MetricName::StorageErrors => "gallery_storage_errors_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. The returned handle renders the text
/// exposition served on `/metrics`.
pub fn init() -> Result<PrometheusHandle, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod listing {
    use super::MetricName;

    pub fn request(category: &str) {
        ::metrics::counter!(MetricName::ListingRequests.as_str(), "category" => category.to_string())
            .increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::ListingDuration.as_str()).record(secs);
    }

    pub fn records_listed(category: &str, count: usize) {
        ::metrics::counter!(MetricName::RecordsListed.as_str(), "category" => category.to_string())
            .increment(count as u64);
    }

    /// A blob that could not be fetched or parsed.
    pub fn blob_skipped(reason: &'static str) {
        ::metrics::counter!(MetricName::BlobsSkipped.as_str(), "reason" => reason).increment(1);
    }

    /// A parsed value the normalizer rejected.
    pub fn record_rejected() {
        ::metrics::counter!(MetricName::RecordsRejected.as_str()).increment(1);
    }
}

pub mod mutations {
    use super::MetricName;

    pub fn applied(op: &'static str) {
        ::metrics::counter!(MetricName::Mutations.as_str(), "op" => op).increment(1);
    }
}

pub mod storage {
    use super::MetricName;

    pub fn error(op: &'static str) {
        ::metrics::counter!(MetricName::StorageErrors.as_str(), "op" => op).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed() {
        for name in [
            MetricName::ListingRequests,
            MetricName::ListingDuration,
            MetricName::RecordsListed,
            MetricName::BlobsSkipped,
            MetricName::RecordsRejected,
            MetricName::Mutations,
            MetricName::StorageErrors,
        ] {
            assert!(name.as_str().starts_with("gallery_"));
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        listing::request("gallery");
        listing::blob_skipped("parse");
        mutations::applied("create");
        storage::error("list");
    }
}
