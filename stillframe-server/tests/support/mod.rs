use std::sync::Arc;

use axum_test::TestServer;
use tokio::sync::mpsc;

use stillframe_core::config::{InMemoryConfigStore, keys};
use stillframe_core::store::InMemoryAssetStore;
use stillframe_core::worker::{DispatchIntent, DispatchQueue};
use stillframe_server::infra::config::{AuthTokens, Config, DatabaseConfig, ServerConfig};
use stillframe_server::{AppState, routes};

pub const PIPELINE_TOKEN: &str = "pipeline-test-token";
pub const OPERATOR_TOKEN: &str = "operator-test-token";

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryAssetStore>,
    pub config: Arc<InMemoryConfigStore>,
    /// Held open so queue submissions succeed; no worker drains it, so jobs
    /// stay `pending` until a render-result report moves them.
    pub rx: mpsc::Receiver<DispatchIntent>,
}

pub fn build_test_app() -> TestApp {
    let store = Arc::new(InMemoryAssetStore::new());
    let config = Arc::new(InMemoryConfigStore::new());
    config.set(keys::GENERATION_ENABLED, "true");

    let settings = Arc::new(Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig { url: None },
        auth: AuthTokens {
            pipeline_token: Some(PIPELINE_TOKEN.to_string()),
            operator_token: Some(OPERATOR_TOKEN.to_string()),
        },
        recovery: Default::default(),
        queue_capacity: 16,
    });

    let (queue, rx) = DispatchQueue::bounded(16);
    let state = AppState::new(store.clone(), config.clone(), queue, settings);
    let server = TestServer::new(routes::create_app_router(state)).expect("test server");

    TestApp {
        server,
        store,
        config,
        rx,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
