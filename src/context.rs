//! Per-request resolver context
//!
//! One [`RequestContext`] is built for every GraphQL request and attached to
//! it as data. It owns the caller's row store handle and a fresh set of
//! loaders, so nothing cached here is visible to any other request.

use crate::loaders::Loaders;
use crate::row_store::RowStore;
use crate::Error;
use async_graphql::Context;
use std::time::Duration;
use uuid::Uuid;

/// Everything a resolver needs about the current request
#[derive(Clone)]
pub struct RequestContext {
    pub store: RowStore,
    /// Authenticated caller; `None` for anonymous requests.
    pub user_id: Option<Uuid>,
    pub loaders: Loaders,
}

impl RequestContext {
    pub fn new(store: RowStore, user_id: Option<Uuid>, batch_delay: Duration) -> Self {
        let loaders = Loaders::new(&store, batch_delay);
        Self {
            store,
            user_id,
            loaders,
        }
    }

    pub fn require_user(&self) -> crate::Result<Uuid> {
        self.user_id.ok_or(Error::NotAuthenticated)
    }
}

/// Get the request context from the GraphQL context
pub fn request_context<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a RequestContext> {
    ctx.data::<RequestContext>()
}

/// Get user ID from context
pub fn get_user_id(ctx: &Context<'_>) -> Option<Uuid> {
    ctx.data_opt::<RequestContext>().and_then(|rc| rc.user_id)
}

/// Require authenticated user
pub fn require_user(ctx: &Context<'_>) -> async_graphql::Result<Uuid> {
    Ok(request_context(ctx)?.require_user()?)
}
