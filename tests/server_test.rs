use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use gallery_catalog::server::{create_router, AppState};
use gallery_catalog::storage::{BlobStore, InMemoryBlobStore};
use gallery_catalog::Catalog;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

fn app(store: &InMemoryBlobStore) -> Router {
    let catalog = Arc::new(Catalog::new(Arc::new(store.clone())));
    create_router(AppState::new(catalog), BODY_LIMIT)
}

fn seed(store: &InMemoryBlobStore, pathname: &str, value: Value) {
    store.insert_raw(pathname, serde_json::to_vec(&value).unwrap());
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = send(app(&InMemoryBlobStore::new()), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn metrics_is_absent_without_recorder() {
    let response = send(app(&InMemoryBlobStore::new()), get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_without_category_is_bad_request() {
    let response = send(app(&InMemoryBlobStore::new()), get("/api/items")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("category"));
}

#[tokio::test]
async fn listing_unknown_category_is_bad_request() {
    let response = send(
        app(&InMemoryBlobStore::new()),
        get("/api/items?category=apps"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_returns_visible_records_uncached() {
    let store = InMemoryBlobStore::new();
    seed(&store, "featured/a1.json", json!({"id": "a1", "name": "Foo", "isPublished": true}));
    seed(&store, "featured/a2.json", json!({"id": "a2", "title": "Bar"}));

    let response = send(app(&store), get("/api/items?category=featured")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cache_control.contains("no-store"));

    let body = body_json(response).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "a1");
    assert_eq!(items[0]["title"], "Foo");
    assert_eq!(items[0]["status"], "published");
    assert_eq!(items[0]["published"], true);
    assert!(items[0].get("sortTimestamp").is_some());
}

#[tokio::test]
async fn create_from_json_returns_created() {
    let store = InMemoryBlobStore::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/items?category=featured")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"title": "Launch", "status": "published"}).to_string(),
        ))
        .unwrap();

    let response = send(app(&store), request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let id = body["record"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["record"]["category"], "featured");
    assert_eq!(
        body["location"]["pathname"],
        format!("featured/{}.json", id)
    );
    assert!(store.contains(&format!("featured/{}.json", id)));
}

#[tokio::test]
async fn create_from_urlencoded_form() {
    let store = InMemoryBlobStore::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/items")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("title=Hello&status=in-review&category=gallery&tags=a%2Cb"))
        .unwrap();

    let response = send(app(&store), request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let listing = body_json(send(app(&store), get("/api/items?category=gallery")).await).await;
    let items = listing.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Hello");
    assert_eq!(items[0]["status"], "in-review");
    assert_eq!(items[0]["tags"], json!(["a", "b"]));
}

#[tokio::test]
async fn create_from_multipart_stores_file() {
    let store = InMemoryBlobStore::new();
    let boundary = "XGALLERYBOUNDARY";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         Rocket\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"published\"\r\n\r\n\
         true\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"rocket.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNGDATA\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/items?category=events")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = send(app(&store), request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let id = body["record"]["id"].as_str().unwrap().to_string();
    let asset = format!("events/{}-rocket.png", id);
    assert_eq!(body["record"]["title"], "Rocket");
    assert_eq!(body["record"]["published"], true);
    assert_eq!(body["record"]["primaryImage"], format!("memory://{}", asset));
    assert_eq!(store.content_type(&asset).as_deref(), Some("image/png"));
    assert_eq!(store.get(&asset).await.unwrap(), b"PNGDATA".to_vec());
}

#[tokio::test]
async fn create_with_invalid_json_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/items?category=gallery")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();

    let response = send(app(&InMemoryBlobStore::new()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_without_id_is_bad_request() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/items?category=gallery")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"title": "No id"}).to_string()))
        .unwrap();

    let response = send(app(&InMemoryBlobStore::new()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/items?category=gallery")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"id": "ghost", "title": "Boo"}).to_string()))
        .unwrap();

    let response = send(app(&InMemoryBlobStore::new()), request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_replaces_record() {
    let store = InMemoryBlobStore::new();
    seed(&store, "featured/f1.json", json!({"id": "f1", "title": "Old", "published": true}));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/items?category=featured")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"id": "f1", "title": "New", "published": true}).to_string(),
        ))
        .unwrap();

    let response = send(app(&store), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["record"]["title"], "New");
}

#[tokio::test]
async fn delete_requires_id() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/items?category=gallery")
        .body(Body::empty())
        .unwrap();

    let response = send(app(&InMemoryBlobStore::new()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/items?category=gallery&id=missing")
        .body(Body::empty())
        .unwrap();

    let response = send(app(&InMemoryBlobStore::new()), request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_record() {
    let store = InMemoryBlobStore::new();
    seed(&store, "events/e1.json", json!({"id": "e1", "published": true}));

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/items?category=events&id=e1")
        .body(Body::empty())
        .unwrap();

    let response = send(app(&store), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], "e1");
    assert!(!store.contains("events/e1.json"));
}
