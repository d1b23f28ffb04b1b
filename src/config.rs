//! Service configuration
//!
//! Every option can be given on the command line or through the environment.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Cohab GraphQL API")]
pub struct Config {
    /// Base URL of the Supabase project
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// Anonymous API key, sent with every row store request
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: String,

    /// HS256 secret used to verify user tokens
    #[arg(long, env = "SUPABASE_JWT_SECRET", hide_env_values = true)]
    pub supabase_jwt_secret: String,

    /// Address to serve on
    #[arg(long, env = "COHAB_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// How long a loader collects keys before dispatching a batch, in milliseconds
    #[arg(long, env = "COHAB_BATCH_DELAY_MS", default_value_t = 1)]
    pub batch_delay_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "COHAB_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}
