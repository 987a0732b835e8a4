//! In-memory asset store for tests and database-less runs.
//!
//! Per-asset atomicity comes from the DashMap entry lock: the whole
//! read-decide-write of [`resolve_report`] runs while the entry is held
//! exclusively, mirroring the row lock the Postgres adapter takes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{AssetStore, MutationOutcome, is_backfill_candidate, resolve_report};
use crate::asset::{Asset, AssetId, NewAsset, ProcessingStatus, StatusReport};
use crate::error::{Result, ThumbnailError};
use crate::job::StartMode;

#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    assets: DashMap<AssetId, Asset>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed asset, timestamps and all. Test seam.
    pub fn insert(&self, asset: Asset) {
        self.assets.insert(asset.id, asset);
    }

    fn update<F>(&self, id: AssetId, apply: F) -> Result<Asset>
    where
        F: FnOnce(&mut Asset) -> Result<()>,
    {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or(ThumbnailError::NotFound(id))?;
        apply(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn create(&self, new: NewAsset) -> Result<Asset> {
        let asset = Asset::new(new, Utc::now());
        self.assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn get(&self, id: AssetId) -> Result<Option<Asset>> {
        Ok(self.assets.get(&id).map(|entry| entry.value().clone()))
    }

    async fn apply_status(&self, id: AssetId, report: StatusReport) -> Result<MutationOutcome> {
        let mut entry = self
            .assets
            .get_mut(&id)
            .ok_or(ThumbnailError::NotFound(id))?;
        let (next, decision) = resolve_report(entry.value(), &report, Utc::now())?;
        *entry.value_mut() = next.clone();
        Ok(MutationOutcome {
            asset: next,
            decision,
        })
    }

    async fn begin_generation(&self, id: AssetId, mode: StartMode) -> Result<Asset> {
        self.update(id, |asset| asset.begin_generation(mode, Utc::now()))
    }

    async fn mark_generation_accepted(&self, id: AssetId) -> Result<Asset> {
        self.update(id, |asset| asset.accept_generation(Utc::now()))
    }

    async fn mark_generation_failed(&self, id: AssetId, error: &str) -> Result<Asset> {
        self.update(id, |asset| asset.fail_generation(error, Utc::now()))
    }

    async fn complete_generation(
        &self,
        id: AssetId,
        thumbnail_url: &str,
        thumbnail_blur_url: Option<&str>,
    ) -> Result<Asset> {
        self.update(id, |asset| {
            asset.complete_generation(thumbnail_url, thumbnail_blur_url, Utc::now())
        })
    }

    async fn stuck_assets(&self, stale_before: DateTime<Utc>) -> Result<Vec<Asset>> {
        let mut stuck: Vec<Asset> = self
            .assets
            .iter()
            .filter(|entry| {
                let asset = entry.value();
                asset.migration_status.is_outstanding()
                    && asset.processing_status == ProcessingStatus::Completed
                    && asset.updated_at < stale_before
            })
            .map(|entry| entry.value().clone())
            .collect();
        stuck.sort_by_key(|asset| (asset.updated_at, asset.id));
        Ok(stuck)
    }

    async fn backfill_candidates(&self, limit: i64) -> Result<Vec<Asset>> {
        let mut candidates: Vec<Asset> = self
            .assets
            .iter()
            .filter(|entry| is_backfill_candidate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by_key(|asset| std::cmp::Reverse((asset.created_at, asset.id)));
        candidates.truncate(limit.max(0) as usize);
        Ok(candidates)
    }
}
