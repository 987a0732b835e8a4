use std::{fmt, sync::Arc};

use stillframe_core::backfill::BackfillOperator;
use stillframe_core::config::ConfigStore;
use stillframe_core::ingest::StatusIngest;
use stillframe_core::recovery::RecoveryScanner;
use stillframe_core::store::AssetStore;
use stillframe_core::worker::DispatchQueue;

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AssetStore>,
    pub config_store: Arc<dyn ConfigStore>,
    pub ingest: StatusIngest,
    pub scanner: RecoveryScanner,
    pub backfill: Arc<BackfillOperator>,
    pub settings: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the service components over whichever adapters the caller chose.
    /// The queue handle is shared between ingest and backfill; its receiver
    /// belongs to the dispatch worker.
    pub fn new(
        store: Arc<dyn AssetStore>,
        config_store: Arc<dyn ConfigStore>,
        queue: DispatchQueue,
        settings: Arc<Config>,
    ) -> Self {
        let ingest = StatusIngest::new(store.clone(), queue.clone());
        let scanner = RecoveryScanner::new(store.clone(), settings.recovery);
        let backfill = Arc::new(BackfillOperator::new(
            store.clone(),
            config_store.clone(),
            queue,
        ));
        Self {
            store,
            config_store,
            ingest,
            scanner,
            backfill,
            settings,
        }
    }
}
