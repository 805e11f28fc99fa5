//! API integration tests over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    config::AppConfig,
    create_router,
    models::Role,
    repository::Repository,
    services::Services,
    AppState,
};

struct TestApp {
    router: Router,
    services: Arc<Services>,
}

impl TestApp {
    async fn new() -> Self {
        let config = AppConfig::default();
        let services = Arc::new(Services::new(
            Repository::in_memory(),
            config.library.clone(),
            config.auth.clone(),
        ));

        for (name, email, role) in [
            ("Libby", "librarian@example.com", Role::Librarian),
            ("Ann", "ann@example.com", Role::Reader),
            ("Bob", "bob@example.com", Role::Reader),
        ] {
            services
                .users
                .create_user(name, email, "secret", role)
                .await
                .unwrap();
        }

        let router = create_router(AppState {
            config: Arc::new(config),
            services: services.clone(),
        });

        Self { router, services }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(json_request("POST", "/api/v1/auth/login", None, json!({
                "email": email,
                "password": "secret"
            })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        body["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, Some(token), body)).await
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn dune() -> Value {
    json!({"title": "Dune", "author": "Frank Herbert", "publication_year": "1965"})
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app
        .send(Request::builder().uri("/api/v1/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(json_request("POST", "/api/v1/auth/login", None, json!({
            "email": "ann@example.com",
            "password": "wrong"
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(Request::builder().uri("/api/v1/books").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_same_book_twice_adds_copy() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;

    let (status, first) = app.post("/api/v1/books", &librarian, dune()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, second) = app.post("/api/v1/books", &librarian, dune()).await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["num_of_copies"], 2);
    assert_eq!(second["available_copies"], 2);

    let (status, page) = app.get("/api/v1/books?page=1", &librarian).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["total_pages"], 1);
}

#[tokio::test]
async fn test_reader_cannot_edit_catalog() {
    let app = TestApp::new().await;
    let reader = app.login("ann@example.com").await;
    let (status, _) = app.post("/api/v1/books", &reader, dune()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_year_and_out_of_range_page() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;

    let (status, body) = app
        .post("/api/v1/books", &librarian, json!({
            "title": "Dune", "author": "Frank Herbert", "publication_year": "soon"
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 8);

    let (status, page) = app.get("/api/v1/books?page=1", &librarian).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 0);

    let (status, _) = app.get("/api/v1/books?page=2", &librarian).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_conflict() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;
    app.post("/api/v1/books", &librarian, dune()).await;
    let (_, hobbit) = app
        .post("/api/v1/books", &librarian, json!({
            "title": "The Hobbit", "author": "J.R.R. Tolkien", "publication_year": "1937"
        }))
        .await;

    let request = json_request(
        "PUT",
        &format!("/api/v1/books/{}", hobbit["id"]),
        Some(&librarian),
        dune(),
    );
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6);
}

#[tokio::test]
async fn test_order_approve_and_list_flow() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;
    let ann = app.login("ann@example.com").await;
    let bob = app.login("bob@example.com").await;

    let (_, book) = app.post("/api/v1/books", &librarian, dune()).await;
    let order_uri = format!("/api/v1/books/{}/order", book["id"]);

    let (status, subscription) = app.post(&order_uri, &ann, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(subscription["approved"], false);

    let (status, body) = app.post(&order_uri, &bob, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 5);

    let (status, _) = app
        .get(&format!("/api/v1/books/{}", book["id"]), &ann)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Readers only see their own subscriptions
    let (_, own) = app.get("/api/v1/subscriptions", &bob).await;
    assert_eq!(own.as_array().unwrap().len(), 0);
    let (_, all) = app.get("/api/v1/subscriptions", &librarian).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["book_title"], "Dune");
    assert_eq!(all[0]["user_email"], "ann@example.com");
    assert_eq!(all[0]["state"], "pending");

    let approve_uri = format!("/api/v1/subscriptions/{}/approve", subscription["id"]);
    let (status, _) = app.post(&approve_uri, &ann, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = app.post(&approve_uri, &librarian, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["approved"], true);
    assert_eq!(approved["period"], 60);
    assert_eq!(approved["fine"], 0);

    let (status, body) = app.post(&approve_uri, &librarian, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);

    let (_, own) = app.get("/api/v1/subscriptions", &ann).await;
    assert_eq!(own[0]["state"], "approved");
    assert_eq!(own[0]["overdue"], false);
    assert!(own[0]["due_date"].is_string());
}

#[tokio::test]
async fn test_fines_show_on_account() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;
    let ann = app.login("ann@example.com").await;

    let (_, book) = app.post("/api/v1/books", &librarian, dune()).await;
    let (_, subscription) = app
        .post(&format!("/api/v1/books/{}/order", book["id"]), &ann, json!({}))
        .await;

    let today = chrono::Utc::now().date_naive();
    app.services
        .loans
        .approve_subscription_on(
            subscription["id"].as_i64().unwrap() as i32,
            today - chrono::Duration::days(70),
        )
        .await
        .unwrap();
    app.services.fines.calculate_and_add_fines().await.unwrap();

    let (status, me) = app.get("/api/v1/auth/me", &ann).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["fine"], 10);

    let (_, own) = app.get("/api/v1/subscriptions", &ann).await;
    assert_eq!(own[0]["fine"], 10);
    assert_eq!(own[0]["overdue"], true);
}

#[tokio::test]
async fn test_block_user_prevents_login() {
    let app = TestApp::new().await;
    let librarian = app.login("librarian@example.com").await;

    let (status, users) = app.get("/api/v1/users", &librarian).await;
    assert_eq!(status, StatusCode::OK);
    let bob_id = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "bob@example.com")
        .map(|u| u["id"].clone())
        .unwrap();

    let (status, blocked) = app
        .post(&format!("/api/v1/users/{}/block", bob_id), &librarian, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blocked["blocked"], true);

    let (status, _) = app
        .send(json_request("POST", "/api/v1/auth/login", None, json!({
            "email": "bob@example.com",
            "password": "secret"
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/v1/users/999/block", &librarian, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
