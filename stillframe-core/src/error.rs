use thiserror::Error;

use crate::asset::{AssetId, GenerationStatus};

/// Why a backfill request was rejected without touching state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    #[error("asset processing is not completed")]
    NotCompleted,

    #[error("asset has no source url")]
    MissingSourceUrl,

    #[error("asset already has a thumbnail")]
    AlreadyHasThumbnail,
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("required configuration missing: {0}")]
    ConfigMissing(String),

    #[error("dispatch transport failure: {0}")]
    Transport(String),

    #[error("asset not found: {0}")]
    NotFound(AssetId),

    #[error("asset ineligible for backfill: {0}")]
    Ineligible(IneligibleReason),

    #[error("thumbnail generation is disabled")]
    FeatureDisabled,

    #[error("illegal generation transition: {from} -> {to}")]
    InvalidTransition {
        from: GenerationStatus,
        to: GenerationStatus,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;
