//! Configuration port and capability-gated accessors.
//!
//! The backing store is a small key/value table, read-only from this crate's
//! perspective. It doubles as a secret store, so there is no general-purpose
//! read surface: callers get exactly two narrow accessors. The enablement
//! flag ([`generation_enabled`]) is not sensitive and needs no capability;
//! the dispatch credentials ([`DispatchSettings::load`]) require
//! `config:secrets`, checked on every call rather than cached.

use std::fmt;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::access::{Principal, permissions};
use crate::error::{Result, ThumbnailError};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryConfigStore;
pub use postgres::PostgresConfigStore;

/// Well-known configuration keys.
pub mod keys {
    /// "true" enables automatic and manual thumbnail generation.
    pub const GENERATION_ENABLED: &str = "thumbnails.enabled";
    /// Rendering service endpoint for dispatch calls.
    pub const RENDER_ENDPOINT: &str = "thumbnails.render_endpoint";
    /// Bearer token for the rendering service. Sensitive.
    pub const RENDER_TOKEN: &str = "thumbnails.render_token";
}

/// Keys that must never leave the gated accessors.
pub fn is_sensitive_key(key: &str) -> bool {
    key == keys::RENDER_TOKEN
}

/// Raw keyed read over the config table.
///
/// Crate-internal seam: nothing outside this module should call [`get`]
/// directly for sensitive keys, and no HTTP surface exposes it at all.
///
/// [`get`]: ConfigStore::get
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Whether thumbnail generation is globally enabled. Absent key means
/// disabled.
pub async fn generation_enabled(store: &dyn ConfigStore) -> Result<bool> {
    let value = store.get(keys::GENERATION_ENABLED).await?;
    Ok(value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false))
}

/// Everything a dispatch call needs, resolved at call time.
pub struct DispatchSettings {
    pub endpoint: String,
    pub token: Zeroizing<String>,
}

impl DispatchSettings {
    /// Resolve the dispatch endpoint and credentials.
    ///
    /// Checks `config:secrets` on the calling principal first, then the
    /// enablement flag, then the required keys. Errors map one-to-one onto
    /// the worker's handling: [`ThumbnailError::FeatureDisabled`] and
    /// [`ThumbnailError::ConfigMissing`] are logged no-ops, everything else
    /// is a real failure.
    pub async fn load(store: &dyn ConfigStore, principal: &Principal) -> Result<Self> {
        if !principal.has_permission(permissions::CONFIG_SECRETS) {
            return Err(ThumbnailError::PermissionDenied(
                permissions::CONFIG_SECRETS.to_string(),
            ));
        }
        if !generation_enabled(store).await? {
            return Err(ThumbnailError::FeatureDisabled);
        }
        let endpoint = store
            .get(keys::RENDER_ENDPOINT)
            .await?
            .ok_or_else(|| ThumbnailError::ConfigMissing(keys::RENDER_ENDPOINT.to_string()))?;
        let token = store
            .get(keys::RENDER_TOKEN)
            .await?
            .ok_or_else(|| ThumbnailError::ConfigMissing(keys::RENDER_TOKEN.to_string()))?;
        Ok(Self {
            endpoint,
            token: Zeroizing::new(token),
        })
    }
}

impl fmt::Debug for DispatchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> InMemoryConfigStore {
        let store = InMemoryConfigStore::new();
        store.set(keys::GENERATION_ENABLED, "true");
        store.set(keys::RENDER_ENDPOINT, "https://render.example.com/jobs");
        store.set(keys::RENDER_TOKEN, "s3cret");
        store
    }

    #[tokio::test]
    async fn flag_accessor_needs_no_capability() {
        let store = seeded_store();
        assert!(generation_enabled(&store).await.unwrap());

        store.set(keys::GENERATION_ENABLED, "false");
        assert!(!generation_enabled(&store).await.unwrap());
    }

    #[tokio::test]
    async fn absent_flag_means_disabled() {
        let store = InMemoryConfigStore::new();
        assert!(!generation_enabled(&store).await.unwrap());
    }

    #[tokio::test]
    async fn settings_require_the_secrets_capability() {
        let store = seeded_store();
        let nobody = Principal::new("nobody");
        let err = DispatchSettings::load(&store, &nobody).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::PermissionDenied(_)));

        let service = Principal::dispatch_service();
        let settings = DispatchSettings::load(&store, &service).await.unwrap();
        assert_eq!(settings.endpoint, "https://render.example.com/jobs");
        assert_eq!(settings.token.as_str(), "s3cret");
    }

    #[tokio::test]
    async fn disabled_flag_rejects_before_reading_secrets() {
        let store = seeded_store();
        store.set(keys::GENERATION_ENABLED, "false");
        let err = DispatchSettings::load(&store, &Principal::dispatch_service())
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::FeatureDisabled));
    }

    #[tokio::test]
    async fn missing_endpoint_is_a_typed_config_error() {
        let store = seeded_store();
        store.remove(keys::RENDER_ENDPOINT);
        let err = DispatchSettings::load(&store, &Principal::dispatch_service())
            .await
            .unwrap_err();
        match err {
            ThumbnailError::ConfigMissing(key) => assert_eq!(key, keys::RENDER_ENDPOINT),
            other => panic!("expected ConfigMissing, got {other}"),
        }
    }

    #[test]
    fn token_key_is_sensitive() {
        assert!(is_sensitive_key(keys::RENDER_TOKEN));
        assert!(!is_sensitive_key(keys::GENERATION_ENABLED));
        assert!(!is_sensitive_key(keys::RENDER_ENDPOINT));
    }

    #[test]
    fn debug_never_prints_the_token() {
        let settings = DispatchSettings {
            endpoint: "https://render.example.com/jobs".to_string(),
            token: Zeroizing::new("s3cret".to_string()),
        };
        let rendered = format!("{settings:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("s3cret"));
    }
}
