use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Query, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Form, Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::catalog::{Attachment, Catalog, CreateInput};
use crate::domain::Category;
use crate::error::{CatalogError, Result};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub id: Option<String>,
}

fn optional_category(raw: Option<&str>) -> Result<Option<Category>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => Category::parse(value)
            .map(Some)
            .ok_or_else(|| CatalogError::InvalidParameter {
                name: "category".to_string(),
                value: value.to_string(),
            }),
    }
}

fn required_category(raw: Option<&str>) -> Result<Category> {
    optional_category(raw)?.ok_or_else(|| CatalogError::MissingParameter("category".to_string()))
}

fn malformed(e: impl Display) -> CatalogError {
    CatalogError::MalformedRecord(e.to_string())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "gallery-catalog",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Response> {
    let category = required_category(query.category.as_deref())?;
    let records = state.catalog.list(category).await?;

    Ok((
        [(header::CACHE_CONTROL, "no-store, max-age=0")],
        Json(records),
    )
        .into_response())
}

/// Create accepts a JSON record, a multipart form with an optional file, or
/// a urlencoded form.
async fn create_item(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
    request: Request<Body>,
) -> Result<Response> {
    let category = optional_category(query.category.as_deref())?;
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let input = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(malformed)?;
        read_multipart(multipart).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &state)
            .await
            .map_err(malformed)?;
        CreateInput::Form {
            fields,
            attachment: None,
        }
    } else {
        let Json(value) = Json::<Value>::from_request(request, &state)
            .await
            .map_err(malformed)?;
        CreateInput::Record(value)
    };

    let created = state.catalog.create(category, input).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn read_multipart(mut multipart: Multipart) -> Result<CreateInput> {
    let mut fields = HashMap::new();
    let mut attachment = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        match file_name {
            Some(file_name) if !file_name.is_empty() => {
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    attachment = Some(Attachment {
                        file_name,
                        content_type: content_type
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                        bytes: bytes.to_vec(),
                    });
                }
            }
            // File input submitted without a file
            Some(_) => {}
            None => {
                let text = field.text().await.map_err(malformed)?;
                fields.insert(name, text);
            }
        }
    }

    Ok(CreateInput::Form { fields, attachment })
}

async fn update_item(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = body.map_err(malformed)?;
    let category = optional_category(query.category.as_deref())?;
    let record = state.catalog.update(category, body).await?;
    Ok(Json(json!({ "success": true, "record": record })))
}

async fn delete_item(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Value>> {
    let category = required_category(query.category.as_deref())?;
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::MissingParameter("id".to_string()))?;

    let deleted = state.catalog.delete(category, id).await?;
    Ok(Json(json!({
        "success": true,
        "id": deleted.id,
        "deleted": deleted.pathnames
    })))
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/items",
            get(list_items)
                .post(create_item)
                .put(update_item)
                .delete(delete_item),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server on the specified port and run until Ctrl+C or SIGTERM.
pub async fn start_server(state: AppState, port: u16, max_body_bytes: usize) -> anyhow::Result<()> {
    let app = create_router(state, max_body_bytes);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server listening on http://{}", addr);
    info!("Catalog API: http://localhost:{}/api/items?category=gallery", port);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parameter_parsing() {
        assert_eq!(optional_category(None).unwrap(), None);
        assert_eq!(optional_category(Some("  ")).unwrap(), None);
        assert_eq!(
            optional_category(Some("Events")).unwrap(),
            Some(Category::Events)
        );
        assert!(matches!(
            optional_category(Some("apps")),
            Err(CatalogError::InvalidParameter { .. })
        ));
        assert!(matches!(
            required_category(None),
            Err(CatalogError::MissingParameter(_))
        ));
    }
}
