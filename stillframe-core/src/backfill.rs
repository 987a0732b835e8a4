//! Operator backfill: manual dispatch outside the edge-triggered path.
//!
//! Backfill exists for assets the automatic path missed (signals lost while
//! dispatch was broken, the feature flag was off, or jobs failed). It reuses
//! the same queue and worker as the trigger path; the only difference is
//! [`StartMode::Manual`], which may begin over an in-flight job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{Principal, permissions};
use crate::asset::{AssetId, ProcessingStatus};
use crate::config::{ConfigStore, generation_enabled};
use crate::error::{IneligibleReason, Result, ThumbnailError};
use crate::job::StartMode;
use crate::store::AssetStore;
use crate::worker::{DispatchIntent, DispatchQueue, IntentOrigin, submit_or_fail};

/// Upper bound on one batch, whatever limit the caller asks for.
pub const MAX_BATCH_LIMIT: i64 = 100;

/// Outcome of one backfill attempt. Domain rejections are reported in-band
/// (`success = false` plus a message) so batch callers get one entry per
/// asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackfillReport {
    pub asset_id: AssetId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only on the "already has a thumbnail" rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl BackfillReport {
    fn succeeded(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            success: true,
            error: None,
            thumbnail_url: None,
        }
    }

    fn failed(asset_id: AssetId, error: impl Into<String>) -> Self {
        Self {
            asset_id,
            success: false,
            error: Some(error.into()),
            thumbnail_url: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchBackfillReport {
    pub processed_count: usize,
    pub results: Vec<BackfillReport>,
}

pub struct BackfillOperator {
    store: Arc<dyn AssetStore>,
    config: Arc<dyn ConfigStore>,
    queue: DispatchQueue,
}

impl BackfillOperator {
    pub fn new(
        store: Arc<dyn AssetStore>,
        config: Arc<dyn ConfigStore>,
        queue: DispatchQueue,
    ) -> Self {
        Self {
            store,
            config,
            queue,
        }
    }

    /// Backfill a single asset. Domain rejections come back as a failure
    /// report; only missing permission and infrastructure trouble are errors.
    pub async fn trigger_one(
        &self,
        principal: &Principal,
        id: AssetId,
    ) -> Result<BackfillReport> {
        self.require(principal)?;
        let outcome = self.execute(id).await;
        self.fold(id, outcome).await
    }

    /// Backfill up to `limit` eligible assets, most recently created first.
    /// Individual failures become result entries; the batch never aborts
    /// part-way.
    pub async fn trigger_batch(
        &self,
        principal: &Principal,
        limit: i64,
    ) -> Result<BatchBackfillReport> {
        self.require(principal)?;
        if !generation_enabled(self.config.as_ref()).await? {
            return Err(ThumbnailError::FeatureDisabled);
        }

        let limit = limit.clamp(1, MAX_BATCH_LIMIT);
        let candidates = self.store.backfill_candidates(limit).await?;
        let mut results = Vec::with_capacity(candidates.len());
        for asset in &candidates {
            let outcome = self.execute(asset.id).await;
            let report = match self.fold(asset.id, outcome).await {
                Ok(report) => report,
                Err(err) => BackfillReport::failed(asset.id, err.to_string()),
            };
            results.push(report);
        }

        let succeeded = results.iter().filter(|report| report.success).count();
        info!(
            target: "stillframe::backfill",
            processed = results.len(),
            succeeded,
            "batch backfill finished"
        );
        Ok(BatchBackfillReport {
            processed_count: results.len(),
            results,
        })
    }

    fn require(&self, principal: &Principal) -> Result<()> {
        if principal.has_permission(permissions::MAINTENANCE_BACKFILL) {
            Ok(())
        } else {
            Err(ThumbnailError::PermissionDenied(
                permissions::MAINTENANCE_BACKFILL.to_string(),
            ))
        }
    }

    /// Validate, enter `pending` under the manual override, enqueue. The
    /// eligibility checks run in rejection-precedence order so the caller
    /// always sees the most actionable reason.
    async fn execute(&self, id: AssetId) -> Result<BackfillReport> {
        if !generation_enabled(self.config.as_ref()).await? {
            return Err(ThumbnailError::FeatureDisabled);
        }
        let asset = self
            .store
            .get(id)
            .await?
            .ok_or(ThumbnailError::NotFound(id))?;
        if asset.processing_status != ProcessingStatus::Completed {
            return Err(ThumbnailError::Ineligible(IneligibleReason::NotCompleted));
        }
        let Some(source_url) = asset.source_url.clone() else {
            return Err(ThumbnailError::Ineligible(IneligibleReason::MissingSourceUrl));
        };
        if asset.has_real_thumbnail() {
            return Err(ThumbnailError::Ineligible(
                IneligibleReason::AlreadyHasThumbnail,
            ));
        }

        self.store.begin_generation(id, StartMode::Manual).await?;
        info!(
            target: "stillframe::backfill",
            asset_id = %id,
            "backfill dispatch requested"
        );
        let intent = DispatchIntent {
            asset_id: id,
            source_url,
            origin: IntentOrigin::Backfill,
        };
        if submit_or_fail(&self.queue, self.store.as_ref(), intent).await {
            Ok(BackfillReport::succeeded(id))
        } else {
            Ok(BackfillReport::failed(id, "dispatch queue full"))
        }
    }

    /// Fold domain rejections into in-band entries; infrastructure errors
    /// keep propagating.
    async fn fold(&self, id: AssetId, outcome: Result<BackfillReport>) -> Result<BackfillReport> {
        match outcome {
            Ok(report) => Ok(report),
            Err(ThumbnailError::FeatureDisabled) => Ok(BackfillReport::failed(
                id,
                "thumbnail generation is disabled",
            )),
            Err(ThumbnailError::NotFound(_)) => Ok(BackfillReport::failed(id, "asset not found")),
            Err(ThumbnailError::Ineligible(reason)) => {
                let mut report = BackfillReport::failed(id, reason.to_string());
                if reason == IneligibleReason::AlreadyHasThumbnail {
                    report.thumbnail_url = self
                        .store
                        .get(id)
                        .await?
                        .and_then(|asset| asset.thumbnail_url);
                }
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for BackfillOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackfillOperator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tokio::sync::mpsc;

    use crate::asset::{Asset, GenerationStatus, NewAsset};
    use crate::config::{InMemoryConfigStore, keys};
    use crate::store::InMemoryAssetStore;

    fn operator_principal() -> Principal {
        Principal::new("operator").grant(permissions::MAINTENANCE_BACKFILL)
    }

    fn enabled_config() -> Arc<InMemoryConfigStore> {
        let config = Arc::new(InMemoryConfigStore::new());
        config.set(keys::GENERATION_ENABLED, "true");
        config
    }

    fn eligible_asset(created_secs_ago: i64) -> Asset {
        let created = Utc::now() - Duration::seconds(created_secs_ago);
        let mut asset = Asset::new(
            NewAsset {
                source_url: Some("https://x/v.mp4".to_string()),
            },
            created,
        );
        asset.processing_status = ProcessingStatus::Completed;
        asset
    }

    struct Fixture {
        store: Arc<InMemoryAssetStore>,
        operator: BackfillOperator,
        rx: mpsc::Receiver<DispatchIntent>,
    }

    fn fixture(config: Arc<InMemoryConfigStore>, capacity: usize) -> Fixture {
        let store = Arc::new(InMemoryAssetStore::new());
        let (queue, rx) = DispatchQueue::bounded(capacity);
        let operator = BackfillOperator::new(store.clone(), config, queue);
        Fixture {
            store,
            operator,
            rx,
        }
    }

    #[tokio::test]
    async fn requires_the_backfill_permission() {
        let f = fixture(enabled_config(), 8);
        let nobody = Principal::new("nobody");

        let err = f
            .operator
            .trigger_one(&nobody, AssetId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::PermissionDenied(_)));

        let err = f.operator.trigger_batch(&nobody, 10).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn disabled_feature_rejects_without_touching_state() {
        let f = fixture(Arc::new(InMemoryConfigStore::new()), 8);
        let asset = eligible_asset(0);
        let id = asset.id;
        f.store.insert(asset);

        let report = f
            .operator
            .trigger_one(&operator_principal(), id)
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("thumbnail generation is disabled")
        );

        let stored = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.generation_status, GenerationStatus::Unset);
        assert_eq!(stored.generation_attempts, 0);

        let err = f
            .operator
            .trigger_batch(&operator_principal(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::FeatureDisabled));
    }

    #[tokio::test]
    async fn unknown_asset_reports_not_found() {
        let f = fixture(enabled_config(), 8);

        let report = f
            .operator
            .trigger_one(&operator_principal(), AssetId::new())
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("asset not found"));
    }

    #[tokio::test]
    async fn ineligible_assets_report_the_most_actionable_reason() {
        let mut f = fixture(enabled_config(), 8);

        let mut unprocessed = eligible_asset(0);
        unprocessed.processing_status = ProcessingStatus::Processing;
        let unprocessed_id = unprocessed.id;
        f.store.insert(unprocessed);

        let mut sourceless = eligible_asset(0);
        sourceless.source_url = None;
        let sourceless_id = sourceless.id;
        f.store.insert(sourceless);

        let principal = operator_principal();
        let report = f
            .operator
            .trigger_one(&principal, unprocessed_id)
            .await
            .unwrap();
        assert_eq!(
            report.error.as_deref(),
            Some("asset processing is not completed")
        );

        let report = f
            .operator
            .trigger_one(&principal, sourceless_id)
            .await
            .unwrap();
        assert_eq!(report.error.as_deref(), Some("asset has no source url"));

        // Rejections never start a job or queue an intent.
        for id in [unprocessed_id, sourceless_id] {
            let stored = f.store.get(id).await.unwrap().unwrap();
            assert_eq!(stored.generation_status, GenerationStatus::Unset);
        }
        assert!(matches!(
            f.rx.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn existing_thumbnail_rejection_carries_the_url() {
        let f = fixture(enabled_config(), 8);
        let mut asset = eligible_asset(0);
        asset.thumbnail_url = Some("https://cdn.example.com/t.jpg".to_string());
        let id = asset.id;
        f.store.insert(asset);

        let report = f
            .operator
            .trigger_one(&operator_principal(), id)
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("asset already has a thumbnail")
        );
        assert_eq!(
            report.thumbnail_url.as_deref(),
            Some("https://cdn.example.com/t.jpg")
        );

        let stored = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.generation_attempts, 0);
    }

    #[tokio::test]
    async fn placeholder_thumbnail_is_backfillable() {
        let mut f = fixture(enabled_config(), 8);
        let mut asset = eligible_asset(0);
        // A previous degraded render left an inline placeholder.
        asset.thumbnail_url = Some("data:image/svg+xml;base64,PHN2Zz4=".to_string());
        asset.generation_status = GenerationStatus::Completed;
        asset.generation_attempts = 1;
        let id = asset.id;
        f.store.insert(asset);

        let report = f
            .operator
            .trigger_one(&operator_principal(), id)
            .await
            .unwrap();
        assert!(report.success, "rejected: {:?}", report.error);

        let stored = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.generation_status, GenerationStatus::Pending);
        assert_eq!(stored.generation_attempts, 2);

        let intent = f.rx.try_recv().unwrap();
        assert_eq!(intent.asset_id, id);
        assert_eq!(intent.source_url, "https://x/v.mp4");
        assert_eq!(intent.origin, IntentOrigin::Backfill);
    }

    #[tokio::test]
    async fn manual_redispatch_overrides_an_in_flight_job() {
        let mut f = fixture(enabled_config(), 8);
        let mut asset = eligible_asset(0);
        asset.generation_status = GenerationStatus::Processing;
        asset.generation_attempts = 1;
        let id = asset.id;
        f.store.insert(asset);

        let report = f
            .operator
            .trigger_one(&operator_principal(), id)
            .await
            .unwrap();
        assert!(report.success);

        let stored = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.generation_status, GenerationStatus::Pending);
        assert_eq!(stored.generation_attempts, 2);
        assert!(f.rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn batch_honors_limit_order_and_partial_failure() {
        // Queue capacity below the batch size, with nothing draining: the
        // first seven dispatches queue, the rest overflow.
        let f = fixture(enabled_config(), 7);

        // ids[0] is the most recently created.
        let mut ids = Vec::new();
        for secs_ago in 0..15 {
            let asset = eligible_asset(secs_ago);
            ids.push(asset.id);
            f.store.insert(asset);
        }

        let batch = f
            .operator
            .trigger_batch(&operator_principal(), 10)
            .await
            .unwrap();

        assert_eq!(batch.processed_count, 10);
        assert_eq!(batch.results.len(), 10);
        let result_ids: Vec<_> = batch.results.iter().map(|r| r.asset_id).collect();
        assert_eq!(result_ids, ids[..10]);

        for (index, report) in batch.results.iter().enumerate() {
            let stored = f.store.get(report.asset_id).await.unwrap().unwrap();
            if index < 7 {
                assert!(report.success);
                assert_eq!(stored.generation_status, GenerationStatus::Pending);
            } else {
                assert!(!report.success);
                assert_eq!(report.error.as_deref(), Some("dispatch queue full"));
                assert_eq!(stored.generation_status, GenerationStatus::Failed);
            }
        }
    }

    #[tokio::test]
    async fn empty_candidate_set_yields_an_empty_batch() {
        let f = fixture(enabled_config(), 8);

        let batch = f
            .operator
            .trigger_batch(&operator_principal(), 10)
            .await
            .unwrap();
        assert_eq!(batch.processed_count, 0);
        assert!(batch.results.is_empty());
    }
}
