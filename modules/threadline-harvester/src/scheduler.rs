//! Bounded-concurrency comment fetching. The pending post set is a lazy
//! stream; at most `concurrency` fetches are in flight, and a slot is
//! backfilled the moment one completes. Each job is terminal within a run:
//! Pending -> Dispatched -> Succeeded | Failed, no retries. A cancelled
//! run lets in-flight fetches drain but dispatches nothing new.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use threadline_common::{Dataset, Handle, HarvestError, PostRef};

use crate::adapter::FetchService;

/// Provenance columns stamped onto every successful comment batch.
pub const POST_ID_COLUMN: &str = "post_id";
pub const POST_URL_COLUMN: &str = "post_url";
pub const ACCOUNT_HANDLE_COLUMN: &str = "account_handle";

/// Result of one scheduling pass. Ordering within the lists is completion
/// order, which is not guaranteed to match submission order.
pub struct CommentFetchOutcome {
    pub succeeded: Vec<(PostRef, Dataset)>,
    pub failed: Vec<(PostRef, HarvestError)>,
    /// Posts never dispatched because the run was cancelled first.
    pub cancelled: Vec<PostRef>,
    /// High-water mark of concurrently dispatched fetches.
    pub peak_in_flight: usize,
}

enum JobOutcome {
    Succeeded(Dataset),
    Failed(HarvestError),
    Cancelled,
}

/// Fetch comment threads for `posts`, at most `concurrency` at a time.
/// Every successful batch is tagged with its originating post and the
/// handle under scrape, because the underlying fetch has no memory of
/// which post it was answering.
pub async fn fetch_comments(
    service: Arc<dyn FetchService>,
    handle: &Handle,
    posts: Vec<PostRef>,
    limit: u32,
    concurrency: usize,
    cancel: &CancellationToken,
) -> CommentFetchOutcome {
    let total = posts.len();
    info!(handle = %handle, posts = total, concurrency, "Scheduling comment fetches");

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let results: Vec<(PostRef, JobOutcome)> = stream::iter(posts.into_iter().map(|post| {
        let service = service.clone();
        let handle = handle.clone();
        let cancel = cancel.clone();
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        async move {
            // The stream is pulled lazily, so this check runs at dispatch
            // time: jobs not yet started stay undispatched after a cancel.
            if cancel.is_cancelled() {
                return (post, JobOutcome::Cancelled);
            }

            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(current, Ordering::SeqCst);

            let result = service.fetch_comments(&handle, &post, limit).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);

            match result {
                Ok(records) => {
                    let mut batch = Dataset::from_records(records);
                    batch.set_column(POST_ID_COLUMN, Value::String(post.id.clone()));
                    batch.set_column(POST_URL_COLUMN, Value::String(post.url.clone()));
                    batch.set_column(
                        ACCOUNT_HANDLE_COLUMN,
                        Value::String(handle.account.clone()),
                    );
                    (post, JobOutcome::Succeeded(batch))
                }
                Err(e) => (post, JobOutcome::Failed(e)),
            }
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut outcome = CommentFetchOutcome {
        succeeded: Vec::new(),
        failed: Vec::new(),
        cancelled: Vec::new(),
        peak_in_flight: peak.load(Ordering::SeqCst),
    };
    for (post, job) in results {
        match job {
            JobOutcome::Succeeded(batch) => outcome.succeeded.push((post, batch)),
            JobOutcome::Failed(e) => {
                warn!(handle = %handle, post_id = %post.id, error = %e, "Comment fetch failed");
                outcome.failed.push((post, e));
            }
            JobOutcome::Cancelled => outcome.cancelled.push(post),
        }
    }

    info!(
        handle = %handle,
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        cancelled = outcome.cancelled.len(),
        "Comment fetches complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use threadline_common::{DateRange, Platform, Record};

    /// Scripted fetch service: every comment fetch sleeps briefly, fails
    /// for configured post ids, and otherwise returns one comment row.
    struct ScriptedService {
        fail_for: Vec<String>,
        delay: Duration,
    }

    #[async_trait]
    impl FetchService for ScriptedService {
        async fn fetch_posts(
            &self,
            _handle: &Handle,
            _range: &DateRange,
            _limit: u32,
        ) -> Result<Vec<Record>, HarvestError> {
            Ok(Vec::new())
        }

        async fn fetch_comments(
            &self,
            _handle: &Handle,
            post: &PostRef,
            _limit: u32,
        ) -> Result<Vec<Record>, HarvestError> {
            tokio::time::sleep(self.delay).await;
            if self.fail_for.contains(&post.id) {
                return Err(HarvestError::ServiceUnavailable(format!(
                    "actor refused {}",
                    post.id
                )));
            }
            let mut record = Record::new();
            record.insert("id".into(), json!(format!("comment-for-{}", post.id)));
            record.insert("text".into(), json!("nice post"));
            Ok(vec![record])
        }
    }

    fn posts(n: usize) -> Vec<PostRef> {
        (1..=n)
            .map(|i| PostRef::new(format!("p{i}"), format!("https://x.com/acme/status/{i}")))
            .collect()
    }

    fn handle() -> Handle {
        Handle::new(Platform::Twitter, "acme")
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_bound() {
        let service = Arc::new(ScriptedService {
            fail_for: vec![],
            delay: Duration::from_millis(20),
        });
        let outcome = fetch_comments(
            service,
            &handle(),
            posts(10),
            100,
            2,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.succeeded.len(), 10);
        assert!(
            outcome.peak_in_flight <= 2,
            "peak was {}",
            outcome.peak_in_flight
        );
        assert_eq!(outcome.peak_in_flight, 2, "pool should actually fill up");
    }

    #[tokio::test]
    async fn one_failing_post_does_not_sink_the_batch() {
        let service = Arc::new(ScriptedService {
            fail_for: vec!["p3".to_string()],
            delay: Duration::from_millis(1),
        });
        let outcome = fetch_comments(
            service,
            &handle(),
            posts(5),
            100,
            3,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.succeeded.len(), 4);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.id, "p3");

        let mut succeeded_ids: Vec<&str> =
            outcome.succeeded.iter().map(|(p, _)| p.id.as_str()).collect();
        succeeded_ids.sort();
        assert_eq!(succeeded_ids, ["p1", "p2", "p4", "p5"]);
    }

    #[tokio::test]
    async fn batches_are_tagged_with_post_and_handle() {
        let service = Arc::new(ScriptedService {
            fail_for: vec![],
            delay: Duration::from_millis(1),
        });
        let outcome = fetch_comments(
            service,
            &handle(),
            posts(1),
            100,
            1,
            &CancellationToken::new(),
        )
        .await;

        let (post, batch) = &outcome.succeeded[0];
        assert_eq!(batch.get(0, "post_id"), Some(&json!(post.id)));
        assert_eq!(batch.get(0, "post_url"), Some(&json!(post.url)));
        assert_eq!(batch.get(0, "account_handle"), Some(&json!("acme")));
    }

    #[tokio::test]
    async fn cancelled_runs_dispatch_nothing_new() {
        let service = Arc::new(ScriptedService {
            fail_for: vec![],
            delay: Duration::from_millis(1),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fetch_comments(service, &handle(), posts(4), 100, 2, &cancel).await;
        assert!(outcome.succeeded.is_empty());
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.cancelled.len(), 4);
        assert_eq!(outcome.peak_in_flight, 0);
    }
}
