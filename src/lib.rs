//! # cohab-graphql
//!
//! GraphQL API for the Cohab roommate management app, served over a hosted
//! PostgREST row store.
//!
//! ## Features
//!
//! - **Column Projection** - GraphQL selections turned into minimal `select=` lists
//! - **DataLoader** - Request-scoped batch loading for N+1 prevention
//! - **Row Store Client** - Filter-builder API over PostgREST
//! - **Auth** - JWT verification and per-request row store access
//! - **Domain Schema** - Households, profiles, expenses, messages, notifications and chores
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cohab_graphql::{schema, server};
//!
//! # fn example(state: server::AppState) {
//! let schema = schema::build_schema();
//! let app = server::router(state);
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod dataloaders;
pub mod descriptor;
pub mod loaders;
pub mod logging;
pub mod model;
pub mod payment_urls;
pub mod projection;
pub mod routes;
pub mod row_store;
pub mod schema;
pub mod selection;
pub mod server;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::RequestContext;
pub use dataloaders::{BatchLoader, DataLoader};
pub use descriptor::{Described, Descriptor};
pub use loaders::Loaders;
pub use projection::{project, Projection};
pub use row_store::{Row, RowStore, RowStoreError};
pub use schema::{build_schema, AppSchema};
pub use selection::Selection;
pub use types::DateTime;

use thiserror::Error;

/// API errors
///
/// The `Display` text is what clients see as the GraphQL error message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    RowStore(#[from] RowStoreError),
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, Error>;
