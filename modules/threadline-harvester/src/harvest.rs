//! The harvest orchestrator: per-handle fetch → merge → dedup → persist,
//! with comment scheduling bounded by a worker pool and failure blast
//! radius held to the post or handle that caused it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use threadline_common::{Dataset, DateRange, Handle, HarvestError, Platform, PostRef};

use crate::adapter::FetchService;
use crate::registry::{self, PlatformSpec};
use crate::scheduler;
use crate::store::{RecordKind, RecordStore};

/// Per-run knobs, as the invocation surface exposes them.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub date_range: DateRange,
    pub max_posts: u32,
    pub max_comments: u32,
    pub comment_concurrency: usize,
    pub scrape_comments: bool,
    /// Override the platform's reply-count pre-filter; `None` keeps the
    /// registry default.
    pub comment_prefilter: Option<bool>,
}

/// Outcome of a posts fetch for one handle. `Empty` is a legitimate
/// no-data-matched result and must not be confused with `Failed`.
pub enum PostsFetch {
    Failed(HarvestError),
    Empty,
    Fetched(Dataset),
}

/// The deduplicated union of historical and newly fetched records for one
/// handle.
pub struct ReconciledDataset {
    pub posts: Dataset,
    pub comments: Dataset,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandleReport {
    pub handle: Handle,
    #[serde(flatten)]
    pub outcome: HandleOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// The posts fetch itself failed; nothing was harvested for this handle.
    Failed { error: String },
    Harvested {
        posts: usize,
        fresh_posts: usize,
        comments: usize,
        comment_jobs: usize,
        failed_posts: Vec<String>,
    },
}

/// Counters from one platform harvest.
#[derive(Debug, Default, Clone, Serialize)]
pub struct HarvestStats {
    pub handles_scraped: u32,
    pub handles_failed: u32,
    pub posts_fetched: u32,
    pub comments_fetched: u32,
    pub comment_jobs_failed: u32,
    pub comment_jobs_cancelled: u32,
    pub duplicates_dropped: u32,
    pub schema_drift_warnings: u32,
    pub persistence_failures: u32,
}

impl std::fmt::Display for HarvestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Harvest Complete ===")?;
        writeln!(f, "Handles scraped:     {}", self.handles_scraped)?;
        writeln!(f, "Handles failed:      {}", self.handles_failed)?;
        writeln!(f, "Posts fetched:       {}", self.posts_fetched)?;
        writeln!(f, "Comments fetched:    {}", self.comments_fetched)?;
        writeln!(f, "Comment jobs failed: {}", self.comment_jobs_failed)?;
        if self.comment_jobs_cancelled > 0 {
            writeln!(f, "Jobs cancelled:      {}", self.comment_jobs_cancelled)?;
        }
        writeln!(f, "Duplicates dropped:  {}", self.duplicates_dropped)?;
        if self.schema_drift_warnings > 0 {
            writeln!(f, "Schema drift:        {}", self.schema_drift_warnings)?;
        }
        if self.persistence_failures > 0 {
            writeln!(f, "Persist failures:    {}", self.persistence_failures)?;
        }
        Ok(())
    }
}

/// One platform's reconciled result across every handle in the run.
pub struct PlatformHarvest {
    pub platform: Platform,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub posts: Dataset,
    pub comments: Dataset,
    pub reports: Vec<HandleReport>,
    pub stats: HarvestStats,
}

pub struct Harvester {
    fetcher: Arc<dyn FetchService>,
    store: RecordStore,
    cancel: CancellationToken,
}

impl Harvester {
    pub fn new(fetcher: Arc<dyn FetchService>, store: RecordStore) -> Self {
        Self {
            fetcher,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Token callers can cancel to stop dispatching new comment fetches
    /// (in-flight ones drain normally).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Harvest every given account on one platform. Handles are processed
    /// sequentially; a failed handle is reported and skipped, never fatal
    /// to the rest.
    pub async fn scrape(
        &self,
        platform: Platform,
        accounts: &[String],
        opts: &HarvestOptions,
    ) -> PlatformHarvest {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%platform, run_id = %run_id, handles = accounts.len(), "Starting harvest");

        let spec = registry::spec(platform);
        let mut stats = HarvestStats::default();
        let mut all_posts = Dataset::new();
        let mut all_comments = Dataset::new();
        let mut reports = Vec::new();

        for account in accounts {
            let handle = Handle::new(platform, account.clone());
            let (report, reconciled) = self.scrape_handle(&handle, spec, opts, &mut stats).await;
            if let Some(r) = reconciled {
                all_posts.append(r.posts);
                all_comments.append(r.comments);
            }
            reports.push(report);
        }

        // Cross-handle dedup: shared posts (e.g. the same page scraped under
        // two aliases) collapse in the cumulative platform result.
        let posts = all_posts.dedupe_by(spec.post_id_column);
        stats.duplicates_dropped += posts.removed as u32;
        let comments = all_comments.dedupe_by(spec.comment_id_column);
        stats.duplicates_dropped += comments.removed as u32;

        info!("{stats}");
        PlatformHarvest {
            platform,
            run_id,
            started_at,
            finished_at: Utc::now(),
            posts: posts.dataset,
            comments: comments.dataset,
            reports,
            stats,
        }
    }

    /// Fetch one handle's posts as a dataset, distinguishing adapter
    /// failure from a legitimately empty result.
    pub async fn fetch_posts(&self, handle: &Handle, opts: &HarvestOptions) -> PostsFetch {
        match self
            .fetcher
            .fetch_posts(handle, &opts.date_range, opts.max_posts)
            .await
        {
            Ok(records) if records.is_empty() => PostsFetch::Empty,
            Ok(records) => PostsFetch::Fetched(Dataset::from_records(records)),
            Err(e) => PostsFetch::Failed(e),
        }
    }

    async fn scrape_handle(
        &self,
        handle: &Handle,
        spec: &PlatformSpec,
        opts: &HarvestOptions,
        stats: &mut HarvestStats,
    ) -> (HandleReport, Option<ReconciledDataset>) {
        // 1. Historical comments tell us which posts are already covered.
        let history_comments = self.store.load_history(handle, RecordKind::Comments);
        let covered = history_comments.id_set(scheduler::POST_ID_COLUMN);

        // 2. Fetch posts; adapter failure is fatal to this handle only.
        let fresh_posts = match self.fetch_posts(handle, opts).await {
            PostsFetch::Failed(e) => {
                warn!(handle = %handle, error = %e, "Posts fetch failed, skipping handle");
                stats.handles_failed += 1;
                let report = HandleReport {
                    handle: handle.clone(),
                    outcome: HandleOutcome::Failed {
                        error: e.to_string(),
                    },
                };
                return (report, None);
            }
            PostsFetch::Empty => {
                info!(handle = %handle, range = %opts.date_range, "No posts in date range");
                Dataset::new()
            }
            PostsFetch::Fetched(ds) => ds,
        };
        stats.posts_fetched += fresh_posts.len() as u32;

        // 3. Merge fresh posts into post history and persist the snapshot
        // before any comment work, so a crash mid-comments leaves a valid,
        // resumable state.
        let mut merged_posts = self.store.load_history(handle, RecordKind::Posts);
        merged_posts.append(fresh_posts.clone());
        let post_dedup = merged_posts.dedupe_by(spec.post_id_column);
        if post_dedup.column_missing {
            let drift = HarvestError::SchemaDrift(spec.post_id_column.to_string());
            warn!(handle = %handle, warning = %drift, "Post dedup degraded");
            stats.schema_drift_warnings += 1;
        }
        stats.duplicates_dropped += post_dedup.removed as u32;
        let merged_posts = post_dedup.dataset;

        if !merged_posts.is_empty() {
            if let Err(e) = self.store.persist(handle, RecordKind::Posts, &merged_posts) {
                warn!(handle = %handle, error = %e, "Post persistence failed, keeping in-memory result");
                stats.persistence_failures += 1;
            }
        }

        // 4. Only fetch comments for fresh posts nobody has covered yet.
        let prefilter = opts.comment_prefilter.unwrap_or(spec.skip_commentless);
        let needs_comments = posts_needing_comments(spec, &fresh_posts, &covered, prefilter);

        // 5. Comments disabled: posts only.
        if !opts.scrape_comments {
            stats.handles_scraped += 1;
            let report = HandleReport {
                handle: handle.clone(),
                outcome: HandleOutcome::Harvested {
                    posts: merged_posts.len(),
                    fresh_posts: fresh_posts.len(),
                    comments: 0,
                    comment_jobs: 0,
                    failed_posts: Vec::new(),
                },
            };
            let reconciled = ReconciledDataset {
                posts: merged_posts,
                comments: Dataset::new(),
            };
            return (report, Some(reconciled));
        }

        // 6. Bounded-concurrency comment fetches.
        let sched = scheduler::fetch_comments(
            self.fetcher.clone(),
            handle,
            needs_comments,
            opts.max_comments,
            opts.comment_concurrency,
            &self.cancel,
        )
        .await;
        stats.comment_jobs_failed += sched.failed.len() as u32;
        stats.comment_jobs_cancelled += sched.cancelled.len() as u32;
        let comment_jobs = sched.succeeded.len();
        let failed_posts: Vec<String> = sched.failed.iter().map(|(p, _)| p.id.clone()).collect();

        // 7. Join parent-post context onto each batch. A batch whose parent
        // is missing from the in-memory posts keeps null context, it is not
        // dropped.
        let post_context: HashMap<String, (Value, Value)> = fresh_posts
            .rows()
            .iter()
            .filter_map(|row| {
                let id = row.get(spec.post_id_column).map(Dataset::cell_str)?;
                let text = row.get(spec.post_text_column).cloned().unwrap_or(Value::Null);
                let author = row
                    .get(spec.post_author_column)
                    .cloned()
                    .unwrap_or(Value::Null);
                Some((id, (text, author)))
            })
            .collect();

        let mut merged_comments = history_comments;
        let mut fetched_rows = 0usize;
        for (post, mut batch) in sched.succeeded {
            fetched_rows += batch.len();
            let (text, author) = post_context
                .get(&post.id)
                .cloned()
                .unwrap_or((Value::Null, Value::Null));
            batch.set_column("post_text", text);
            batch.set_column("post_author", author);
            merged_comments.append(batch);
        }
        stats.comments_fetched += fetched_rows as u32;

        // 8. Dedup by comment id and persist the reconciled comment set.
        let comment_dedup = merged_comments.dedupe_by(spec.comment_id_column);
        if comment_dedup.column_missing {
            let drift = HarvestError::SchemaDrift(spec.comment_id_column.to_string());
            warn!(handle = %handle, warning = %drift, "Comment dedup degraded");
            stats.schema_drift_warnings += 1;
        }
        stats.duplicates_dropped += comment_dedup.removed as u32;
        let merged_comments = comment_dedup.dataset;

        if !merged_comments.is_empty() {
            if let Err(e) = self
                .store
                .persist(handle, RecordKind::Comments, &merged_comments)
            {
                warn!(handle = %handle, error = %e, "Comment persistence failed, keeping in-memory result");
                stats.persistence_failures += 1;
            }
        }

        stats.handles_scraped += 1;
        let report = HandleReport {
            handle: handle.clone(),
            outcome: HandleOutcome::Harvested {
                posts: merged_posts.len(),
                fresh_posts: fresh_posts.len(),
                comments: merged_comments.len(),
                comment_jobs,
                failed_posts,
            },
        };
        let reconciled = ReconciledDataset {
            posts: merged_posts,
            comments: merged_comments,
        };
        (report, Some(reconciled))
    }
}

/// Fresh post ids minus already-covered ones, in row order, optionally
/// skipping posts whose reported reply count is zero. Posts without a
/// permalink cannot have their comments fetched and are skipped with a
/// warning; an unknown reply count always fetches.
fn posts_needing_comments(
    spec: &PlatformSpec,
    fresh: &Dataset,
    covered: &HashSet<String>,
    skip_commentless: bool,
) -> Vec<PostRef> {
    let mut queued: HashSet<String> = HashSet::new();
    let mut refs = Vec::new();

    for row in fresh.rows() {
        let id = match row.get(spec.post_id_column).map(Dataset::cell_str) {
            Some(id) if !id.is_empty() => id,
            _ => continue,
        };
        if covered.contains(&id) || queued.contains(&id) {
            continue;
        }
        let url = match row.get(spec.post_url_column).map(Dataset::cell_str) {
            Some(url) if !url.is_empty() => url,
            _ => {
                warn!(post_id = %id, "Post has no permalink, cannot fetch its comments");
                continue;
            }
        };
        if skip_commentless {
            let count = row.get(spec.reply_count_column).and_then(reply_count);
            if count == Some(0) {
                continue;
            }
        }
        queued.insert(id.clone());
        refs.push(PostRef::new(id, url));
    }
    refs
}

fn reply_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_common::Record;

    fn post_row(id: &str, reply_count: Option<i64>) -> Record {
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert("url".into(), json!(format!("https://x.com/acme/status/{id}")));
        record.insert("text".into(), json!("body"));
        if let Some(n) = reply_count {
            record.insert("replyCount".into(), json!(n));
        }
        record
    }

    #[test]
    fn covered_posts_are_not_scheduled() {
        let spec = registry::spec(Platform::Twitter);
        let fresh = Dataset::from_records(vec![
            post_row("a", None),
            post_row("b", None),
            post_row("c", None),
        ]);
        let covered: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();

        let refs = posts_needing_comments(spec, &fresh, &covered, false);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "c");
    }

    #[test]
    fn duplicate_fresh_posts_are_scheduled_once() {
        let spec = registry::spec(Platform::Twitter);
        let fresh = Dataset::from_records(vec![post_row("a", None), post_row("a", None)]);

        let refs = posts_needing_comments(spec, &fresh, &HashSet::new(), false);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn prefilter_skips_zero_reply_posts_but_fetches_unknown_counts() {
        let spec = registry::spec(Platform::Twitter);
        let fresh = Dataset::from_records(vec![
            post_row("quiet", Some(0)),
            post_row("busy", Some(3)),
            post_row("unknown", None),
        ]);

        let refs = posts_needing_comments(spec, &fresh, &HashSet::new(), true);
        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["busy", "unknown"]);
    }

    #[test]
    fn posts_without_permalink_are_skipped() {
        let spec = registry::spec(Platform::Twitter);
        let mut record = Record::new();
        record.insert("id".into(), json!("orphan"));
        let fresh = Dataset::from_records(vec![record, post_row("ok", None)]);

        let refs = posts_needing_comments(spec, &fresh, &HashSet::new(), false);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "ok");
    }
}
