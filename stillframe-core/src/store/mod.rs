//! Asset store port and the atomic mutation step.
//!
//! The store is where asset mutations are serialized, so the trigger decision
//! and the `pending` write happen inside its atomic step: there is no window
//! between reading the job status and writing `pending`. Both adapters run
//! the same [`resolve_report`] core; they differ only in how they hold the
//! per-asset lock (DashMap entry vs `SELECT ... FOR UPDATE`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::asset::{Asset, AssetId, NewAsset, ProcessingStatus, StatusReport};
use crate::error::Result;
use crate::job::StartMode;
use crate::trigger::{self, FireDecision};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAssetStore;
pub use postgres::PostgresAssetStore;

/// Result of one atomic status mutation.
#[derive(Clone, Debug)]
pub struct MutationOutcome {
    /// The committed post-mutation snapshot.
    pub asset: Asset,
    /// Present when this mutation fired and the job entered `pending`. The
    /// caller owns getting it onto the dispatch queue.
    pub decision: Option<FireDecision>,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn create(&self, new: NewAsset) -> Result<Asset>;

    async fn get(&self, id: AssetId) -> Result<Option<Asset>>;

    /// Apply an upstream status report as one atomic step: patch the reported
    /// fields, evaluate the trigger policy over the (old, new) snapshot pair,
    /// apply the in-flight guard, and write `pending` when firing. Dispatch
    /// itself happens outside, off the returned decision.
    async fn apply_status(&self, id: AssetId, report: StatusReport) -> Result<MutationOutcome>;

    /// Enter `pending` outside the edge-triggered path (backfill override).
    async fn begin_generation(&self, id: AssetId, mode: StartMode) -> Result<Asset>;

    /// `pending -> processing`: the dispatch call was accepted.
    async fn mark_generation_accepted(&self, id: AssetId) -> Result<Asset>;

    /// `pending|processing -> failed`, recording the error.
    async fn mark_generation_failed(&self, id: AssetId, error: &str) -> Result<Asset>;

    /// `pending|processing -> completed`, storing the rendered thumbnail.
    async fn complete_generation(
        &self,
        id: AssetId,
        thumbnail_url: &str,
        thumbnail_blur_url: Option<&str>,
    ) -> Result<Asset>;

    /// Assets matching the stuck predicate (migration outstanding while
    /// processing completed, last touched before `stale_before`), oldest
    /// first.
    async fn stuck_assets(&self, stale_before: DateTime<Utc>) -> Result<Vec<Asset>>;

    /// Backfill-eligible assets (processing completed, source present, no
    /// real thumbnail), most recently created first, up to `limit`.
    async fn backfill_candidates(&self, limit: i64) -> Result<Vec<Asset>>;
}

/// Backfill eligibility, shared by the candidate queries and the single
/// backfill validation chain.
pub(crate) fn is_backfill_candidate(asset: &Asset) -> bool {
    asset.processing_status == ProcessingStatus::Completed
        && asset.source_url.is_some()
        && !asset.has_real_thumbnail()
}

/// The pure core of [`AssetStore::apply_status`]: compute the post-report
/// snapshot and, when the policy fires and the in-flight guard admits, the
/// `pending` transition. Runs under the adapter's per-asset lock.
pub(crate) fn resolve_report(
    old: &Asset,
    report: &StatusReport,
    now: DateTime<Utc>,
) -> Result<(Asset, Option<FireDecision>)> {
    let mut next = old.with_report(report, now);

    let Some(decision) = trigger::evaluate(old, &next) else {
        return Ok((next, None));
    };

    if !next.generation_status.can_begin(StartMode::Triggered) {
        // Already in flight: suppressed, not an error.
        tracing::debug!(
            target: "stillframe::store",
            asset_id = %old.id,
            status = %next.generation_status,
            "trigger suppressed while job in flight"
        );
        return Ok((next, None));
    }

    next.begin_generation(StartMode::Triggered, now)?;
    Ok((next, Some(decision)))
}
