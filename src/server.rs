//! HTTP surface
//!
//! - `POST /graphql` executes a GraphQL request
//! - `GET /graphql` serves GraphiQL
//! - `GET /health` liveness probe
//! - `GET /` static service descriptor

use crate::auth::{graphql_handler, JwtVerifier};
use crate::row_store::{Postgrest, RowStore};
use crate::schema::AppSchema;
use async_graphql::http::GraphiQLSource;
use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Builds the row store access object for one request
pub trait Connect: Send + Sync {
    /// `token` is the caller's verified JWT; `None` for anonymous requests.
    fn connect(&self, token: Option<&str>) -> RowStore;
}

impl Connect for Postgrest {
    fn connect(&self, token: Option<&str>) -> RowStore {
        Postgrest::connect(self, token)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Connect for Arc<crate::row_store::MemoryBackend> {
    fn connect(&self, _token: Option<&str>) -> RowStore {
        RowStore::from_backend(self.clone())
    }
}

/// Shared by every request
#[derive(Clone)]
pub struct AppState {
    pub schema: AppSchema,
    pub connector: Arc<dyn Connect>,
    pub verifier: JwtVerifier,
    /// Loader batch window
    pub batch_delay: Duration,
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Cohab API",
        "graphql_endpoint": "/graphql",
        "health": "/health",
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row_store::MemoryBackend;
    use crate::schema::build_schema;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state(backend: Arc<MemoryBackend>) -> AppState {
        AppState {
            schema: build_schema(),
            connector: Arc::new(backend),
            verifier: JwtVerifier::new("test-secret"),
            batch_delay: Duration::from_millis(1),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn graphql(query: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/graphql").header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = router(state(Arc::new(MemoryBackend::new())));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "healthy" }));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["graphql_endpoint"], "/graphql");
    }

    #[tokio::test]
    async fn test_anonymous_query_runs() {
        let backend = Arc::new(MemoryBackend::new().with_table(
            "households",
            vec![json!({ "id": "h1", "name": "Maple St", "is_available": true })],
        ));
        let app = router(state(backend.clone()));

        let response = app
            .oneshot(graphql("{ households { list { name } } }", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["households"]["list"][0]["name"], "Maple St");

        let requests = backend.requests_to("households").await;
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_before_execution() {
        let backend = Arc::new(MemoryBackend::new());
        let app = router(state(backend.clone()));

        let response = app
            .oneshot(graphql("{ profiles { me { id } } }", Some("not.a.jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "detail": "Invalid token" }));
        assert!(backend.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let app = router(state(Arc::new(MemoryBackend::new())));
        let response = app
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
