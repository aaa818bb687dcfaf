//! Catalog operations over the blob store: listing and create/update/delete.
//!
//! Every operation is stateless. Records are rebuilt from the stored blobs on
//! each request and mutations replace or remove whole blobs.

mod listing;
mod mutations;

use std::sync::Arc;

use crate::storage::BlobStore;

pub use listing::sort_by_recency;
pub use mutations::{Attachment, CreateInput, Created, Deleted, FORM_FIELDS};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

pub struct Catalog {
    store: Arc<dyn BlobStore>,
    fetch_concurrency: usize,
}

impl Catalog {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_fetch_concurrency(store, DEFAULT_FETCH_CONCURRENCY)
    }

    pub fn with_fetch_concurrency(store: Arc<dyn BlobStore>, fetch_concurrency: usize) -> Self {
        Self {
            store,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }
}
