//! Fetch-service boundary. The engine sees one trait; the Apify-backed
//! implementation builds the per-platform actor payloads and leaves retry
//! policy entirely to the caller.

use async_trait::async_trait;

use apify_client::{
    ApifyClient, FacebookCommentsInput, FacebookPostsInput, InstagramScraperInput, StartUrl,
    TweetScraperInput,
};
use threadline_common::{DateRange, Handle, HarvestError, Platform, PostRef, Record};

use crate::registry;

/// Capability interface over the external scraping backend. Each call is a
/// blocking remote operation with unbounded latency; implementations must
/// not retry internally.
#[async_trait]
pub trait FetchService: Send + Sync {
    /// Fetch a profile's posts within a date window. Failure is fatal to
    /// the affected handle only.
    async fn fetch_posts(
        &self,
        handle: &Handle,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<Record>, HarvestError>;

    /// Fetch one post's comment thread. Failure is fatal to that post only.
    async fn fetch_comments(
        &self,
        handle: &Handle,
        post: &PostRef,
        limit: u32,
    ) -> Result<Vec<Record>, HarvestError>;
}

/// Apify-backed fetch service.
pub struct ApifyFetcher {
    client: ApifyClient,
}

impl ApifyFetcher {
    pub fn new(token: String) -> Self {
        Self {
            client: ApifyClient::new(token),
        }
    }
}

#[async_trait]
impl FetchService for ApifyFetcher {
    async fn fetch_posts(
        &self,
        handle: &Handle,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<Record>, HarvestError> {
        let spec = registry::spec(handle.platform);
        tracing::info!(handle = %handle, range = %range, limit, "Fetching posts");

        let items = match handle.platform {
            Platform::Twitter => {
                let input = TweetScraperInput {
                    start_urls: vec![handle.profile_url()],
                    start: Some(range.since_str()),
                    end: Some(range.until_str()),
                    max_items: limit,
                    sort: "Latest".to_string(),
                    tweet_language: Some("en".to_string()),
                };
                self.client.call_actor(spec.posts_actor, &input).await
            }
            Platform::Instagram => {
                let input = InstagramScraperInput {
                    direct_urls: vec![handle.profile_url()],
                    results_type: "posts".to_string(),
                    results_limit: limit,
                    only_posts_newer_than: Some(range.since_str()),
                    add_parent_data: false,
                };
                self.client.call_actor(spec.posts_actor, &input).await
            }
            Platform::Facebook => {
                let input = FacebookPostsInput {
                    start_urls: vec![StartUrl {
                        url: handle.profile_url(),
                    }],
                    results_limit: limit,
                    only_posts_newer_than: Some(range.since_str()),
                };
                self.client.call_actor(spec.posts_actor, &input).await
            }
        };

        items.map_err(|e| HarvestError::ServiceUnavailable(e.to_string()))
    }

    async fn fetch_comments(
        &self,
        handle: &Handle,
        post: &PostRef,
        limit: u32,
    ) -> Result<Vec<Record>, HarvestError> {
        let spec = registry::spec(handle.platform);
        tracing::info!(handle = %handle, post_id = %post.id, limit, "Fetching comments");

        let items = match handle.platform {
            Platform::Twitter => {
                // The tweet scraper pointed at a single tweet URL returns
                // the reply thread.
                let input = TweetScraperInput {
                    start_urls: vec![post.url.clone()],
                    start: None,
                    end: None,
                    max_items: limit,
                    sort: "Latest".to_string(),
                    tweet_language: None,
                };
                self.client.call_actor(spec.comments_actor, &input).await
            }
            Platform::Instagram => {
                let input = InstagramScraperInput {
                    direct_urls: vec![post.url.clone()],
                    results_type: "comments".to_string(),
                    results_limit: limit,
                    only_posts_newer_than: None,
                    add_parent_data: false,
                };
                self.client.call_actor(spec.comments_actor, &input).await
            }
            Platform::Facebook => {
                let input = FacebookCommentsInput {
                    post_url: post.url.clone(),
                    count: limit,
                };
                self.client.call_actor(spec.comments_actor, &input).await
            }
        };

        items.map_err(|e| HarvestError::ServiceUnavailable(e.to_string()))
    }
}
