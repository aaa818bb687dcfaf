use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::Category;
use crate::storage::StorageError;

/// Request-level failures of catalog operations.
///
/// Per-blob problems during listing never show up here; they are skipped
/// where they occur.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: String, value: String },

    #[error("No record with id {id} in category {category}")]
    NotFound { category: Category, id: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Storage service failure: {0}")]
    Upstream(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::MissingParameter(_)
            | CatalogError::InvalidParameter { .. }
            | CatalogError::MalformedRecord(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            CatalogError::Upstream(source) => {
                error!("Storage failure: {}", source);
                "storage service failure".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
