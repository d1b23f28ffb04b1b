//! GraphQL authentication and request context injection
//!
//! Provides helpers for:
//! - Extracting the bearer token from HTTP headers
//! - Verifying Supabase-issued HS256 JWTs
//! - An Axum handler that builds the [`RequestContext`] for each request
//!
//! A request without a token runs anonymously. A request carrying a token that
//! fails verification is rejected with 401 before the schema runs.

use crate::context::RequestContext;
use crate::server::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Audience Supabase puts in tokens for signed-in users.
pub const AUDIENCE: &str = "authenticated";

/// Extract the raw token from an `Authorization: Bearer ..` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Claims read from a verified token
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// The user id
    pub sub: Uuid,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

/// HS256 verifier for the project's JWT secret
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

/// GraphQL handler with authentication context injection
///
/// Verifies the bearer token (if any), connects to the row store with the
/// caller's credentials and attaches a fresh [`RequestContext`] to the request.
pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Response {
    let token = extract_bearer(&headers);

    let user_id = match token.map(|t| state.verifier.verify(t)).transpose() {
        Ok(claims) => claims.map(|c| c.sub),
        Err(error) => {
            tracing::debug!(%error, "rejected bearer token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": error.to_string() })),
            )
                .into_response();
        }
    };

    let store = state.connector.connect(token);
    let context = RequestContext::new(store, user_id, state.batch_delay);
    let response = state.schema.execute(request.data(context)).await;

    Json(response).into_response()
}
