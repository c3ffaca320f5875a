//! Persisted JSON summary of a harvest run, written under
//! `{data_dir}/runs/{run_id}.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use threadline_common::Platform;

use crate::harvest::{HandleReport, HarvestStats, PlatformHarvest};

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub platform: Platform,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: HarvestStats,
    pub handles: Vec<HandleReport>,
}

impl RunReport {
    pub fn from_harvest(harvest: &PlatformHarvest) -> Self {
        Self {
            run_id: harvest.run_id,
            platform: harvest.platform,
            started_at: harvest.started_at,
            finished_at: harvest.finished_at,
            stats: harvest.stats.clone(),
            handles: harvest.reports.clone(),
        }
    }

    pub fn write(&self, data_dir: &Path) -> Result<PathBuf> {
        let dir = data_dir.join("runs");
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join(format!("{}.json", self.run_id));
        let bytes = serde_json::to_vec_pretty(self).context("serializing run report")?;
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
