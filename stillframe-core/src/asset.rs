//! Asset records and the upstream status vocabulary.
//!
//! An [`Asset`] is a user-generated video tracked through transcoding, storage
//! migration, and thumbnail generation. The transcoding and migration
//! pipelines live elsewhere; they talk to this crate through
//! [`StatusReport`]s. The thumbnail-generation fields are owned by the job
//! state machine in [`crate::job`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ThumbnailError};

/// Unique identifier for assets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transcoding pipeline status, reported by an upstream collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(ThumbnailError::Internal(format!(
                "unknown processing status: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage/CDN migration status, reported by an upstream collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    None,
    Pending,
    Downloading,
    Uploading,
    Completed,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::None => "none",
            MigrationStatus::Pending => "pending",
            MigrationStatus::Downloading => "downloading",
            MigrationStatus::Uploading => "uploading",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(MigrationStatus::None),
            "pending" => Ok(MigrationStatus::Pending),
            "downloading" => Ok(MigrationStatus::Downloading),
            "uploading" => Ok(MigrationStatus::Uploading),
            "completed" => Ok(MigrationStatus::Completed),
            "failed" => Ok(MigrationStatus::Failed),
            other => Err(ThumbnailError::Internal(format!(
                "unknown migration status: {other}"
            ))),
        }
    }

    /// Migration work has started but not reached a terminal state.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Pending | MigrationStatus::Downloading | MigrationStatus::Uploading
        )
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thumbnail-generation job state. Owned exclusively by the state machine in
/// [`crate::job`]; everything else reads it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// No job has ever been requested. Stored as SQL NULL.
    Unset,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Unset => "unset",
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "unset" => Ok(GenerationStatus::Unset),
            "pending" => Ok(GenerationStatus::Pending),
            "processing" => Ok(GenerationStatus::Processing),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            other => Err(ThumbnailError::Internal(format!(
                "unknown generation status: {other}"
            ))),
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A thumbnail URL that is an inline generated graphic rather than a rendered
/// image. Treated as "no thumbnail yet" by every dispatch decision.
pub fn is_placeholder_thumbnail(url: &str) -> bool {
    url.starts_with("data:")
}

/// A user-generated video record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub processing_status: ProcessingStatus,
    pub migration_status: MigrationStatus,
    pub source_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_blur_url: Option<String>,
    pub generation_status: GenerationStatus,
    /// Times the job has entered `pending`, over the asset's lifetime.
    pub generation_attempts: i32,
    /// Last dispatch or render failure; cleared when a new job begins.
    pub generation_error: Option<String>,
    pub thumbnail_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(new: NewAsset, now: DateTime<Utc>) -> Self {
        Self {
            id: AssetId::new(),
            processing_status: ProcessingStatus::Pending,
            migration_status: MigrationStatus::None,
            source_url: new.source_url,
            thumbnail_url: None,
            thumbnail_blur_url: None,
            generation_status: GenerationStatus::Unset,
            generation_attempts: 0,
            generation_error: None,
            thumbnail_generated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a real (non-placeholder) thumbnail exists.
    pub fn has_real_thumbnail(&self) -> bool {
        match self.thumbnail_url.as_deref() {
            Some(url) => !is_placeholder_thumbnail(url),
            None => false,
        }
    }

    /// Produce the post-report snapshot without touching `self`. Fields absent
    /// from the report are left unchanged; `updated_at` is always bumped.
    pub fn with_report(&self, report: &StatusReport, now: DateTime<Utc>) -> Asset {
        let mut next = self.clone();
        if let Some(processing) = report.processing_status {
            next.processing_status = processing;
        }
        if let Some(migration) = report.migration_status {
            next.migration_status = migration;
        }
        if let Some(source_url) = &report.source_url {
            next.source_url = Some(source_url.clone());
        }
        next.updated_at = now;
        next
    }
}

/// Creation input for the seed surface and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewAsset {
    pub source_url: Option<String>,
}

/// Partial mutation reported by an upstream pipeline. Absent fields are left
/// unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub processing_status: Option<ProcessingStatus>,
    pub migration_status: Option<MigrationStatus>,
    pub source_url: Option<String>,
}
