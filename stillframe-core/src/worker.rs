//! Bounded dispatch queue and the worker that drains it.
//!
//! The mutation path never performs network calls: it pushes a
//! [`DispatchIntent`] with a non-blocking `try_send` and moves on. The worker
//! owns the HTTP call and the resulting job-state writeback. Intents still
//! queued at shutdown are dropped; their jobs stay `pending` and remain
//! reachable through the stuck view or a backfill pass.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::asset::AssetId;
use crate::dispatch::{DispatchClient, RenderRequest};
use crate::error::ThumbnailError;
use crate::store::AssetStore;
use crate::trigger::{FireDecision, TriggerSignal};

/// Default queue bound. Overflow marks jobs failed rather than blocking the
/// mutation path.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// One queued dispatch, from either the edge-triggered path or backfill.
#[derive(Clone, Debug)]
pub struct DispatchIntent {
    pub asset_id: AssetId,
    pub source_url: String,
    pub origin: IntentOrigin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntentOrigin {
    /// Produced by the trigger policy off a readiness edge.
    Signal(TriggerSignal),
    /// Operator backfill override.
    Backfill,
}

impl IntentOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            IntentOrigin::Signal(TriggerSignal::ProcessingCompleted) => "processing_completed",
            IntentOrigin::Signal(TriggerSignal::MigrationCompleted) => "migration_completed",
            IntentOrigin::Backfill => "backfill",
        }
    }
}

impl From<FireDecision> for DispatchIntent {
    fn from(decision: FireDecision) -> Self {
        Self {
            asset_id: decision.asset_id,
            source_url: decision.source_url,
            origin: IntentOrigin::Signal(decision.signal),
        }
    }
}

/// Cloneable producer handle over the bounded channel.
#[derive(Clone, Debug)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchIntent>,
}

impl DispatchQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<DispatchIntent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Non-blocking submit. Returns false when the queue is full or the
    /// worker is gone; the caller decides what that means for the job.
    pub fn submit(&self, intent: DispatchIntent) -> bool {
        match self.tx.try_send(intent) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(intent)) => {
                warn!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    origin = intent.origin.as_str(),
                    "dispatch queue full, intent dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(intent)) => {
                warn!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    origin = intent.origin.as_str(),
                    "dispatch worker gone, intent dropped"
                );
                false
            }
        }
    }
}

/// Submit an intent; on overflow mark the job failed so the condition is
/// visible instead of silently stranding a `pending` job.
pub async fn submit_or_fail(
    queue: &DispatchQueue,
    store: &dyn AssetStore,
    intent: DispatchIntent,
) -> bool {
    let asset_id = intent.asset_id;
    if queue.submit(intent) {
        return true;
    }
    if let Err(err) = store
        .mark_generation_failed(asset_id, "dispatch queue full")
        .await
    {
        error!(
            target: "stillframe::worker",
            asset_id = %asset_id,
            error = %err,
            "failed to record dispatch queue overflow"
        );
    }
    false
}

pub struct DispatchWorker {
    rx: mpsc::Receiver<DispatchIntent>,
    client: Arc<dyn DispatchClient>,
    store: Arc<dyn AssetStore>,
    shutdown: CancellationToken,
}

impl DispatchWorker {
    pub fn new(
        rx: mpsc::Receiver<DispatchIntent>,
        client: Arc<dyn DispatchClient>,
        store: Arc<dyn AssetStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            client,
            store,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(target: "stillframe::worker", "dispatch worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(target: "stillframe::worker", "dispatch worker shutting down");
                    break;
                }
                intent = self.rx.recv() => {
                    let Some(intent) = intent else {
                        info!(target: "stillframe::worker", "dispatch queue closed");
                        break;
                    };
                    self.handle(intent).await;
                }
            }
        }
    }

    async fn handle(&self, intent: DispatchIntent) {
        let request = RenderRequest::new(intent.asset_id, intent.source_url.clone());
        match self.client.dispatch(&request).await {
            Ok(()) => {
                debug!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    origin = intent.origin.as_str(),
                    "dispatch accepted"
                );
                if let Err(err) = self
                    .store
                    .mark_generation_accepted(intent.asset_id)
                    .await
                {
                    error!(
                        target: "stillframe::worker",
                        asset_id = %intent.asset_id,
                        error = %err,
                        "failed to record dispatch acceptance"
                    );
                }
            }
            // Disabled or unconfigured: no-op, the job stays pending.
            Err(ThumbnailError::FeatureDisabled) => {
                warn!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    "dispatch skipped, thumbnail generation disabled"
                );
            }
            Err(ThumbnailError::ConfigMissing(key)) => {
                warn!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    key = %key,
                    "dispatch skipped, required configuration missing"
                );
            }
            Err(err) => {
                warn!(
                    target: "stillframe::worker",
                    asset_id = %intent.asset_id,
                    origin = intent.origin.as_str(),
                    error = %err,
                    "dispatch failed"
                );
                if let Err(write_err) = self
                    .store
                    .mark_generation_failed(intent.asset_id, &err.to_string())
                    .await
                {
                    error!(
                        target: "stillframe::worker",
                        asset_id = %intent.asset_id,
                        error = %write_err,
                        "failed to record dispatch failure"
                    );
                }
            }
        }
    }
}
