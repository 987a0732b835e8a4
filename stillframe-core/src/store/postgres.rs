//! Postgres asset store.
//!
//! Row-level atomicity: every mutating operation locks the asset row with
//! `SELECT ... FOR UPDATE`, runs the same state-machine/policy code as the
//! in-memory adapter, and writes the whole mutable portion back before
//! committing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{AssetStore, MutationOutcome, resolve_report};
use crate::asset::{
    Asset, AssetId, GenerationStatus, MigrationStatus, NewAsset, ProcessingStatus, StatusReport,
};
use crate::error::{Result, ThumbnailError};
use crate::job::StartMode;

#[derive(Clone, Debug)]
pub struct PostgresAssetStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    processing_status: String,
    migration_status: String,
    source_url: Option<String>,
    thumbnail_url: Option<String>,
    thumbnail_blur_url: Option<String>,
    generation_status: Option<String>,
    generation_attempts: i32,
    generation_error: Option<String>,
    thumbnail_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_asset(self) -> Result<Asset> {
        Ok(Asset {
            id: AssetId(self.id),
            processing_status: ProcessingStatus::parse(&self.processing_status)?,
            migration_status: MigrationStatus::parse(&self.migration_status)?,
            source_url: self.source_url,
            thumbnail_url: self.thumbnail_url,
            thumbnail_blur_url: self.thumbnail_blur_url,
            generation_status: match self.generation_status.as_deref() {
                // NULL means no job was ever requested.
                None => GenerationStatus::Unset,
                Some(value) => GenerationStatus::parse(value)?,
            },
            generation_attempts: self.generation_attempts,
            generation_error: self.generation_error,
            thumbnail_generated_at: self.thumbnail_generated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn generation_to_db(status: GenerationStatus) -> Option<&'static str> {
    match status {
        GenerationStatus::Unset => None,
        other => Some(other.as_str()),
    }
}

const ASSET_COLUMNS: &str = r#"
    id, processing_status, migration_status, source_url,
    thumbnail_url, thumbnail_blur_url,
    generation_status, generation_attempts, generation_error,
    thumbnail_generated_at, created_at, updated_at
"#;

impl PostgresAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn select_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: AssetId,
    ) -> Result<Asset> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;
        row.ok_or(ThumbnailError::NotFound(id))?.into_asset()
    }

    async fn persist(tx: &mut Transaction<'_, Postgres>, asset: &Asset) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE assets
            SET processing_status = $2,
                migration_status = $3,
                source_url = $4,
                thumbnail_url = $5,
                thumbnail_blur_url = $6,
                generation_status = $7,
                generation_attempts = $8,
                generation_error = $9,
                thumbnail_generated_at = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(asset.id.0)
        .bind(asset.processing_status.as_str())
        .bind(asset.migration_status.as_str())
        .bind(asset.source_url.as_deref())
        .bind(asset.thumbnail_url.as_deref())
        .bind(asset.thumbnail_blur_url.as_deref())
        .bind(generation_to_db(asset.generation_status))
        .bind(asset.generation_attempts)
        .bind(asset.generation_error.as_deref())
        .bind(asset.thumbnail_generated_at)
        .bind(asset.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Lock, apply, write back, commit. The closure runs the same asset
    /// methods the in-memory adapter uses.
    async fn with_locked_asset<F>(&self, id: AssetId, apply: F) -> Result<Asset>
    where
        F: FnOnce(&mut Asset) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let mut asset = Self::select_for_update(&mut tx, id).await?;
        apply(&mut asset)?;
        Self::persist(&mut tx, &asset).await?;
        tx.commit().await?;
        Ok(asset)
    }
}

#[async_trait]
impl AssetStore for PostgresAssetStore {
    async fn create(&self, new: NewAsset) -> Result<Asset> {
        let asset = Asset::new(new, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO assets (
                id, processing_status, migration_status, source_url,
                thumbnail_url, thumbnail_blur_url,
                generation_status, generation_attempts, generation_error,
                thumbnail_generated_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(asset.id.0)
        .bind(asset.processing_status.as_str())
        .bind(asset.migration_status.as_str())
        .bind(asset.source_url.as_deref())
        .bind(asset.thumbnail_url.as_deref())
        .bind(asset.thumbnail_blur_url.as_deref())
        .bind(generation_to_db(asset.generation_status))
        .bind(asset.generation_attempts)
        .bind(asset.generation_error.as_deref())
        .bind(asset.thumbnail_generated_at)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(self.pool())
        .await?;
        Ok(asset)
    }

    async fn get(&self, id: AssetId) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;
        row.map(AssetRow::into_asset).transpose()
    }

    async fn apply_status(&self, id: AssetId, report: StatusReport) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await?;
        let old = Self::select_for_update(&mut tx, id).await?;
        let (next, decision) = resolve_report(&old, &report, Utc::now())?;
        Self::persist(&mut tx, &next).await?;
        tx.commit().await?;
        Ok(MutationOutcome {
            asset: next,
            decision,
        })
    }

    async fn begin_generation(&self, id: AssetId, mode: StartMode) -> Result<Asset> {
        self.with_locked_asset(id, |asset| asset.begin_generation(mode, Utc::now()))
            .await
    }

    async fn mark_generation_accepted(&self, id: AssetId) -> Result<Asset> {
        self.with_locked_asset(id, |asset| asset.accept_generation(Utc::now()))
            .await
    }

    async fn mark_generation_failed(&self, id: AssetId, error: &str) -> Result<Asset> {
        self.with_locked_asset(id, |asset| asset.fail_generation(error, Utc::now()))
            .await
    }

    async fn complete_generation(
        &self,
        id: AssetId,
        thumbnail_url: &str,
        thumbnail_blur_url: Option<&str>,
    ) -> Result<Asset> {
        self.with_locked_asset(id, |asset| {
            asset.complete_generation(thumbnail_url, thumbnail_blur_url, Utc::now())
        })
        .await
    }

    async fn stuck_assets(&self, stale_before: DateTime<Utc>) -> Result<Vec<Asset>> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            r#"
            SELECT {ASSET_COLUMNS}
            FROM assets
            WHERE migration_status IN ('pending', 'downloading', 'uploading')
              AND processing_status = 'completed'
              AND updated_at < $1
            ORDER BY updated_at ASC, id ASC
            "#
        ))
        .bind(stale_before)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(AssetRow::into_asset).collect()
    }

    async fn backfill_candidates(&self, limit: i64) -> Result<Vec<Asset>> {
        // thumbnail_url LIKE 'data:%' mirrors is_placeholder_thumbnail.
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            r#"
            SELECT {ASSET_COLUMNS}
            FROM assets
            WHERE processing_status = 'completed'
              AND source_url IS NOT NULL
              AND (thumbnail_url IS NULL OR thumbnail_url LIKE 'data:%')
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(AssetRow::into_asset).collect()
    }
}
