use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::Database;
use crate::export::default_export_dir;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/search";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub db_path: Option<PathBuf>,
    pub export_dir: PathBuf,
    /// `None` means no client-side timeout.
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match get("CAREER_HUNTER_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| {
                    format!(
                        "CAREER_HUNTER_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    )
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url: get("CAREER_HUNTER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            db_path: get("CAREER_HUNTER_DB").map(PathBuf::from),
            export_dir: get("CAREER_HUNTER_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_export_dir),
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    pub fn log_file(&self) -> PathBuf {
        Database::data_dir().join("career-hunter.log")
    }
}
