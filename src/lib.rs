//! Gallery catalog service.
//!
//! Items are stored as JSON blobs in an object store, one folder per
//! category. Listing rebuilds canonical records from whatever shape the
//! blobs are in (see [`normalize`]), filters them by publish state and sorts
//! them newest first. Create, update and delete replace or remove whole blobs.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod partitions;
pub mod server;
pub mod storage;

pub use catalog::Catalog;
pub use domain::{CanonicalRecord, Category, Status, StorePlatform};
pub use error::CatalogError;
