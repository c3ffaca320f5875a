use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables. Everything
/// has a default; the Apify credential itself lives in the settings store
/// (with `APIFY_API_KEY` as an env override).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the per-platform dataset trees.
    pub data_dir: PathBuf,

    /// Path of the JSON settings file (credential + handle lists).
    pub settings_path: PathBuf,

    /// Env override for the Apify token, taking precedence over settings.
    pub apify_token: Option<String>,

    /// Bound on concurrent comment fetches within one handle.
    pub comment_concurrency: usize,

    pub max_posts: u32,
    pub max_comments: u32,

    /// Default posts date window when the caller gives none.
    pub lookback_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("scraped_data")),
            settings_path: env::var("THREADLINE_SETTINGS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("settings.json")),
            apify_token: env::var("APIFY_API_KEY").ok().filter(|t| !t.is_empty()),
            comment_concurrency: env::var("THREADLINE_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            max_posts: env::var("THREADLINE_MAX_POSTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            max_comments: env::var("THREADLINE_MAX_COMMENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            lookback_days: env::var("THREADLINE_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
        }
    }
}
