use anyhow::{Context, Result};
use clap::Parser;
use cohab_graphql::auth::JwtVerifier;
use cohab_graphql::config::Config;
use cohab_graphql::row_store::Postgrest;
use cohab_graphql::server::{self, AppState};
use cohab_graphql::{build_schema, logging};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(config.log_json);

    let http = reqwest::Client::builder()
        .build()
        .context("build http client")?;
    let state = AppState {
        schema: build_schema(),
        connector: Arc::new(Postgrest::new(
            http,
            &config.supabase_url,
            &config.supabase_anon_key,
        )),
        verifier: JwtVerifier::new(&config.supabase_jwt_secret),
        batch_delay: config.batch_delay(),
    };

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;
    info!(listen = %config.listen, row_store = %config.supabase_url, "cohab api listening");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
