//! Outbound dispatch to the rendering service.
//!
//! The call enqueues rendering work on the remote side and returns; it never
//! waits for a thumbnail. Endpoint, credentials, and the enablement flag are
//! resolved from the config store on every call, so flips take effect without
//! a restart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::Principal;
use crate::asset::AssetId;
use crate::config::{ConfigStore, DispatchSettings};
use crate::error::{Result, ThumbnailError};

/// Request body for the rendering endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct RenderRequest {
    pub asset_id: AssetId,
    pub source_url: String,
    /// When the dispatch decision was made; timing metadata for the renderer.
    pub requested_at: DateTime<Utc>,
}

impl RenderRequest {
    pub fn new(asset_id: AssetId, source_url: String) -> Self {
        Self {
            asset_id,
            source_url,
            requested_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Ask the rendering service to produce a thumbnail. `Ok` means the
    /// request was accepted, not that rendering finished.
    async fn dispatch(&self, request: &RenderRequest) -> Result<()>;
}

/// Default bound on one dispatch attempt, sized to cover a single retry
/// window inside the rendering service's admission path.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(75);

pub struct HttpDispatchClient {
    http: reqwest::Client,
    config: Arc<dyn ConfigStore>,
    principal: Principal,
}

impl HttpDispatchClient {
    pub fn new(config: Arc<dyn ConfigStore>) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_DISPATCH_TIMEOUT)
    }

    pub fn with_timeout(config: Arc<dyn ConfigStore>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ThumbnailError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            config,
            principal: Principal::dispatch_service(),
        })
    }
}

impl std::fmt::Debug for HttpDispatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatchClient")
            .field("principal", &self.principal.subject)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn dispatch(&self, request: &RenderRequest) -> Result<()> {
        let settings = DispatchSettings::load(self.config.as_ref(), &self.principal).await?;

        let response = self
            .http
            .post(&settings.endpoint)
            .bearer_auth(settings.token.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| ThumbnailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ThumbnailError::Transport(format!(
                "rendering endpoint returned {status}"
            )));
        }
        Ok(())
    }
}
