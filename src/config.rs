use crate::utils::odds_format::OddsFormat;
use crate::utils::pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_CONTENT_API_URL: &str = "http://localhost:8080/wp-json/odds/v1";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_REFRESH_SECS: u64 = 60;

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Settings {
    pub content_api_url: String,
    pub use_cache: bool,
    pub cache_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// Format used when a request does not ask for one
    pub odds_format: OddsFormat,
    pub default_per_page: usize,
    /// Seconds between snapshot reloads in the web server, 0 turns it off
    pub refresh_secs: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup, so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("BIND_ADDR is not a socket address: {}", bind_addr))?;

        let default_per_page = match lookup("DEFAULT_PER_PAGE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("DEFAULT_PER_PAGE is not a number: {}", raw))?
                .clamp(1, MAX_PER_PAGE),
            None => DEFAULT_PER_PAGE,
        };

        let refresh_secs = match lookup("REFRESH_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("REFRESH_SECS is not a number: {}", raw))?,
            None => DEFAULT_REFRESH_SECS,
        };

        Ok(Self {
            content_api_url: lookup("CONTENT_API_URL")
                .unwrap_or_else(|| DEFAULT_CONTENT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            use_cache: lookup("USE_CACHE").unwrap_or_default() == "1",
            cache_dir: PathBuf::from(
                lookup("CACHE_DIR").unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            ),
            bind_addr,
            odds_format: lookup("ODDS_FORMAT")
                .map(|v| OddsFormat::parse_lenient(&v))
                .unwrap_or_default(),
            default_per_page,
            refresh_secs,
        })
    }

    pub fn snapshot_cache_file(&self) -> PathBuf {
        self.cache_dir.join("snapshot_cache.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.content_api_url, DEFAULT_CONTENT_API_URL);
        assert!(!settings.use_cache);
        assert_eq!(settings.bind_addr.port(), 3000);
        assert_eq!(settings.odds_format, OddsFormat::Decimal);
        assert_eq!(settings.default_per_page, DEFAULT_PER_PAGE);
        assert_eq!(settings.refresh_secs, DEFAULT_REFRESH_SECS);
        assert_eq!(
            settings.snapshot_cache_file(),
            PathBuf::from("cache/snapshot_cache.json")
        );
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("CONTENT_API_URL", "https://odds.example.com/wp-json/odds/v1/"),
            ("USE_CACHE", "1"),
            ("BIND_ADDR", "0.0.0.0:8000"),
            ("ODDS_FORMAT", "fractional"),
            ("DEFAULT_PER_PAGE", "500"),
            ("REFRESH_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(
            settings.content_api_url,
            "https://odds.example.com/wp-json/odds/v1"
        );
        assert!(settings.use_cache);
        assert_eq!(settings.bind_addr.port(), 8000);
        assert_eq!(settings.odds_format, OddsFormat::Fractional);
        assert_eq!(settings.default_per_page, MAX_PER_PAGE);
        assert_eq!(settings.refresh_secs, 0);
    }

    #[test]
    fn test_bad_bind_addr_is_an_error() {
        assert!(Settings::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DEFAULT_PER_PAGE", "ten")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("REFRESH_SECS", "-5")])).is_err());
    }
}
