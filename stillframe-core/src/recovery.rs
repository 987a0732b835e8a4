//! Stuck-job detection.
//!
//! A job is stuck when storage migration is still outstanding after
//! transcoding completed and the asset has not been touched for longer than
//! the staleness threshold. The view is read-only and runs under the calling
//! principal's own permissions. Recovery is always explicit through backfill;
//! nothing here ever dispatches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::access::{Principal, permissions};
use crate::asset::{Asset, AssetId, GenerationStatus, MigrationStatus};
use crate::error::{Result, ThumbnailError};
use crate::store::AssetStore;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Minutes since the last mutation before a job counts as stuck.
    pub stale_after_minutes: i64,
    /// How often the background audit logs stuck counts.
    pub audit_interval_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: 5,
            audit_interval_secs: 300,
        }
    }
}

/// One row of the stuck-job view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StuckJob {
    pub id: AssetId,
    pub status: GenerationStatus,
    pub migration_status: MigrationStatus,
    pub staleness_minutes: i64,
    pub attempts: i32,
    pub error: Option<String>,
    pub has_source: bool,
    pub has_migrated: bool,
}

impl StuckJob {
    fn from_asset(asset: &Asset, now: chrono::DateTime<Utc>) -> Self {
        Self {
            id: asset.id,
            status: asset.generation_status,
            migration_status: asset.migration_status,
            staleness_minutes: (now - asset.updated_at).num_minutes(),
            attempts: asset.generation_attempts,
            error: asset.generation_error.clone(),
            has_source: asset.source_url.is_some(),
            has_migrated: asset.migration_status == MigrationStatus::Completed,
        }
    }
}

#[derive(Clone)]
pub struct RecoveryScanner {
    store: Arc<dyn AssetStore>,
    config: RecoveryConfig,
}

impl RecoveryScanner {
    pub fn new(store: Arc<dyn AssetStore>, config: RecoveryConfig) -> Self {
        Self { store, config }
    }

    /// Stuck jobs, oldest first. Checked against the caller's own
    /// `maintenance:view`; no elevation happens on the way to the store.
    pub async fn stuck_jobs(&self, principal: &Principal) -> Result<Vec<StuckJob>> {
        if !principal.has_permission(permissions::MAINTENANCE_VIEW) {
            return Err(ThumbnailError::PermissionDenied(
                permissions::MAINTENANCE_VIEW.to_string(),
            ));
        }
        let now = Utc::now();
        let stale_before = now - chrono::Duration::minutes(self.config.stale_after_minutes);
        let assets = self.store.stuck_assets(stale_before).await?;
        Ok(assets
            .iter()
            .map(|asset| StuckJob::from_asset(asset, now))
            .collect())
    }

    /// Periodic audit: logs stuck counts so operators notice before users do.
    /// Never dispatches anything.
    pub fn spawn_audit(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let scanner = self.clone();
        let interval = Duration::from_secs(self.config.audit_interval_secs);
        tokio::spawn(async move {
            let principal = Principal::dispatch_service();
            info!(
                target: "stillframe::recovery",
                interval_secs = scanner.config.audit_interval_secs,
                "stuck-job audit started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(target: "stillframe::recovery", "stuck-job audit stopping");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match scanner.stuck_jobs(&principal).await {
                            Ok(stuck) if stuck.is_empty() => {
                                debug!(target: "stillframe::recovery", "no stuck generation jobs");
                            }
                            Ok(stuck) => {
                                warn!(
                                    target: "stillframe::recovery",
                                    count = stuck.len(),
                                    oldest_minutes = stuck[0].staleness_minutes,
                                    "stuck generation jobs detected"
                                );
                            }
                            Err(err) => {
                                error!(
                                    target: "stillframe::recovery",
                                    error = %err,
                                    "stuck-job audit failed"
                                );
                            }
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for RecoveryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
