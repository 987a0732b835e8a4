//! Status-report entry point.
//!
//! Upstream pipelines land here. One call applies the report through the
//! store's atomic step and, when the trigger fires, hands the intent to the
//! dispatch queue without blocking. Dispatch problems never surface to the
//! reporter; the mutation has already committed by the time they can happen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::asset::{Asset, AssetId, StatusReport};
use crate::error::Result;
use crate::store::AssetStore;
use crate::worker::{DispatchQueue, submit_or_fail};

/// What a report did: `fired` means the trigger produced a decision, `queued`
/// that the intent actually made it onto the dispatch queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub asset: Asset,
    pub fired: bool,
    pub queued: bool,
}

#[derive(Clone)]
pub struct StatusIngest {
    store: Arc<dyn AssetStore>,
    queue: DispatchQueue,
}

impl StatusIngest {
    pub fn new(store: Arc<dyn AssetStore>, queue: DispatchQueue) -> Self {
        Self { store, queue }
    }

    pub async fn report(&self, id: AssetId, report: StatusReport) -> Result<IngestOutcome> {
        let outcome = self.store.apply_status(id, report).await?;

        let Some(decision) = outcome.decision else {
            return Ok(IngestOutcome {
                asset: outcome.asset,
                fired: false,
                queued: false,
            });
        };

        info!(
            target: "stillframe::ingest",
            asset_id = %decision.asset_id,
            signal = ?decision.signal,
            "readiness edge fired, job pending"
        );

        let queued = submit_or_fail(&self.queue, self.store.as_ref(), decision.into()).await;
        let asset = if queued {
            outcome.asset
        } else {
            // Overflow writeback changed the job state after our snapshot.
            self.store.get(id).await?.unwrap_or(outcome.asset)
        };

        Ok(IngestOutcome {
            asset,
            fired: true,
            queued,
        })
    }
}

impl std::fmt::Debug for StatusIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusIngest").finish_non_exhaustive()
    }
}
