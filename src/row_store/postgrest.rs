//! PostgREST backend
//!
//! Encodes [`Request`]s as PostgREST HTTP calls:
//!
//! - `GET /rest/v1/{table}?select=..&col=eq.v&col=in.(..)&order=col.desc&limit=n`
//! - `POST` / `PATCH` / `DELETE` on the same path for writes, asking for the
//!   affected rows back with `Prefer: return=representation`
//! - `POST /rest/v1/rpc/{function}` for stored procedures

use super::{Action, Backend, Filter, Request, Row, RowStore, RowStoreError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Connection settings shared by every request
///
/// Holds the pooled HTTP client; [`Postgrest::connect`] builds the per-request
/// access object carrying the caller's token.
#[derive(Clone, Debug)]
pub struct Postgrest {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Postgrest {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Row store access for one caller.
    ///
    /// Without a token the anonymous key is used, so row level security sees
    /// an anonymous caller.
    pub fn connect(&self, token: Option<&str>) -> RowStore {
        RowStore::new(PostgrestBackend {
            settings: self.clone(),
            token: token.map(str::to_string),
        })
    }
}

/// [`Backend`] speaking PostgREST over HTTP
#[derive(Debug)]
pub struct PostgrestBackend {
    settings: Postgrest,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl PostgrestBackend {
    fn url(&self, request: &Request) -> String {
        match request.action {
            Action::Rpc { .. } => format!("{}/rest/v1/rpc/{}", self.settings.base_url, request.target),
            _ => format!("{}/rest/v1/{}", self.settings.base_url, request.target),
        }
    }

    fn method(request: &Request) -> Method {
        match request.action {
            Action::Select { .. } => Method::GET,
            Action::Insert(_) | Action::Rpc { .. } => Method::POST,
            Action::Update(_) => Method::PATCH,
            Action::Delete => Method::DELETE,
        }
    }
}

/// Query string pairs for `request`.
pub fn query_pairs(request: &Request) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Action::Select { columns } = &request.action {
        pairs.push(("select".to_string(), columns.clone()));
    }
    for filter in &request.filters {
        match filter {
            Filter::Eq { column, value } => {
                let condition = match value {
                    Value::Null => "is.null".to_string(),
                    other => format!("eq.{}", literal(other)),
                };
                pairs.push((column.clone(), condition));
            }
            Filter::In { column, values } => {
                let list: Vec<String> = values.iter().map(quoted).collect();
                pairs.push((column.clone(), format!("in.({})", list.join(","))));
            }
        }
    }
    if !request.order.is_empty() {
        let order: Vec<String> = request
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.desc { "desc" } else { "asc" }))
            .collect();
        pairs.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = request.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Strings inside `in.(..)` are double quoted so commas and parentheses survive.
fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

fn into_rows(body: Value) -> Result<Vec<Row>, RowStoreError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(RowStoreError::Decode(format!("expected a row, got {other}"))),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        Value::Null => Ok(Vec::new()),
        other => Err(RowStoreError::Decode(format!("expected rows, got {other}"))),
    }
}

#[async_trait]
impl Backend for PostgrestBackend {
    async fn execute(&self, request: Request) -> Result<Vec<Row>, RowStoreError> {
        let bearer = self.token.as_deref().unwrap_or(&self.settings.api_key);
        let mut builder = self
            .settings
            .http
            .request(Self::method(&request), self.url(&request))
            .query(&query_pairs(&request))
            .header("apikey", &self.settings.api_key)
            .bearer_auth(bearer);

        builder = match &request.action {
            Action::Select { .. } => builder,
            Action::Insert(records) => builder
                .header("Prefer", "return=representation")
                .json(records),
            Action::Update(patch) => builder
                .header("Prefer", "return=representation")
                .json(patch),
            Action::Delete => builder.header("Prefer", "return=representation"),
            Action::Rpc { params } => builder.json(params),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| RowStoreError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RowStoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
            let (code, message) = match body {
                Some(body) => (body.code, body.message.unwrap_or_else(|| text.clone())),
                None => (None, text.clone()),
            };
            return Err(RowStoreError::Status {
                status: status.as_u16(),
                code,
                message,
            });
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body: Value =
            serde_json::from_str(&text).map_err(|e| RowStoreError::Decode(e.to_string()))?;
        into_rows(body)
    }
}
