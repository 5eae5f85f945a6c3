use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: SocketAddr,
    /// Shared secret for the closeout trigger. Unset means the endpoint is
    /// open — acceptable only outside production.
    pub cron_secret: Option<String>,
    pub fetch_timeout_secs: u64,
    /// Optional local snapshot of official-shape results, used as the last
    /// fetch fallback.
    pub cache_file: Option<PathBuf>,
}

pub fn load() -> Result<Config> {
    let database_path =
        env::var("LOTTO_DB_PATH").unwrap_or_else(|_| "data/lotto.db".to_string());

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cron_secret = env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());

    let fetch_timeout_secs = env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let cache_file = env::var("LOTTO_CACHE_FILE").ok().map(PathBuf::from);

    Ok(Config {
        database_path,
        bind_addr,
        cron_secret,
        fetch_timeout_secs,
        cache_file,
    })
}
