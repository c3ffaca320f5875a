use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single dataset item as Apify returns it: arbitrary key/value JSON.
/// Actor output schemas differ per platform and per actor version, so the
/// client makes no attempt to type them.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

// --- apidojo/tweet-scraper ---

/// Input for the apidojo/tweet-scraper actor. Scrapes a profile timeline
/// when `start_urls` points at `https://x.com/{handle}`, or a reply thread
/// when it points at a single tweet URL.
#[derive(Debug, Clone, Serialize)]
pub struct TweetScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    pub sort: String,
    #[serde(rename = "tweetLanguage", skip_serializing_if = "Option::is_none")]
    pub tweet_language: Option<String>,
}

// --- apify/instagram-scraper ---

/// Input for the apify/instagram-scraper actor. The same actor serves both
/// post and comment scrapes; `results_type` selects which.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramScraperInput {
    #[serde(rename = "directUrls")]
    pub direct_urls: Vec<String>,
    #[serde(rename = "resultsType")]
    pub results_type: String,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    #[serde(rename = "onlyPostsNewerThan", skip_serializing_if = "Option::is_none")]
    pub only_posts_newer_than: Option<String>,
    #[serde(rename = "addParentData")]
    pub add_parent_data: bool,
}

// --- apify/facebook-posts-scraper + facebook comments actor ---

/// A start URL entry for Facebook scraper input.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the apify/facebook-posts-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct FacebookPostsInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    #[serde(rename = "onlyPostsNewerThan", skip_serializing_if = "Option::is_none")]
    pub only_posts_newer_than: Option<String>,
}

/// Input for the Facebook comments actor, which takes a single post URL.
#[derive(Debug, Clone, Serialize)]
pub struct FacebookCommentsInput {
    pub post_url: String,
    pub count: u32,
}
