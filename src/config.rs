use std::net::SocketAddr;

use anyhow::Context;

/// Token compiled into the binary, used when `TMDB_ACCESS_TOKEN` is unset.
const EMBEDDED_TMDB_TOKEN: Option<&str> = option_env!("MOVIARY_DEFAULT_TMDB_TOKEN");

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    /// `None` switches the app to the no-op store.
    pub database_url: Option<String>,
    pub auto_migrate: bool,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_rps: u32,
    pub localize_region: String,
    pub localize_language: String,
    pub search_debounce_ms: u64,
    pub import_delay_ms: u64,
    pub max_concurrent: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 =
            non_empty("PORT").unwrap_or_else(|| "3000".to_string()).parse().context("PORT")?;

        let database_url = non_empty("DATABASE_URL");
        let auto_migrate = non_empty("AUTO_MIGRATE")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let tmdb_access_token = non_empty("TMDB_ACCESS_TOKEN")
            .or_else(|| EMBEDDED_TMDB_TOKEN.map(str::to_string))
            .unwrap_or_default();
        let tmdb_base_url = non_empty("TMDB_BASE_URL")
            .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string());

        let tmdb_rps: u32 = non_empty("TMDB_RPS").and_then(|s| s.parse().ok()).unwrap_or(4);

        let localize_region = non_empty("LOCALIZE_REGION")
            .unwrap_or_else(|| "ID".to_string())
            .to_ascii_uppercase();
        let localize_language =
            non_empty("LOCALIZE_LANGUAGE").unwrap_or_else(|| "id".to_string()).to_ascii_lowercase();

        let search_debounce_ms: u64 =
            non_empty("SEARCH_DEBOUNCE_MS").and_then(|s| s.parse().ok()).unwrap_or(300);

        let import_delay_ms: u64 =
            non_empty("IMPORT_DELAY_MS").and_then(|s| s.parse().ok()).unwrap_or(250);

        let max_concurrent: usize =
            non_empty("MAX_CONCURRENT_REQUESTS").and_then(|s| s.parse().ok()).unwrap_or(5);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            auto_migrate,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_rps,
            localize_region,
            localize_language,
            search_debounce_ms,
            import_delay_ms,
            max_concurrent,
        })
    }
}
