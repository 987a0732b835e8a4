//! # Stillframe Core
//!
//! Core library for the Stillframe thumbnail service: the trigger policy,
//! job state machine, dispatch pipeline, and recovery tooling for
//! user-generated video assets.
//!
//! ## Overview
//!
//! Upstream pipelines report transcoding and storage-migration status per
//! asset. `stillframe-core` turns those reports into thumbnail work:
//!
//! - **Edge-triggered dispatch**: a render job fires exactly once per
//!   readiness edge, never from steady state
//! - **Job tracking**: a five-state generation lifecycle stored alongside the
//!   asset, with at most one in-flight job per asset
//! - **Decoupled delivery**: mutations enqueue onto a bounded channel; a
//!   worker owns the HTTP call to the rendering service
//! - **Recovery**: a read-only stuck-job view plus operator backfill for
//!   everything the automatic path missed
//!
//! ## Architecture
//!
//! - [`asset`]: asset snapshots and upstream status reports
//! - [`trigger`]: the pure (old, new) edge-detection policy
//! - [`job`]: the generation-job state machine
//! - [`store`]: the asset store port and its Postgres/in-memory adapters
//! - [`worker`]: the bounded dispatch queue and worker
//! - [`ingest`]: the status-report entry point tying store and queue together
//! - [`recovery`] and [`backfill`]: the operator surface
//!
//! ## Examples
//!
//! ```
//! use stillframe_core::asset::{Asset, NewAsset, ProcessingStatus, StatusReport};
//! use stillframe_core::trigger;
//!
//! let now = chrono::Utc::now();
//! let old = Asset::new(
//!     NewAsset {
//!         source_url: Some("https://cdn.example.com/v.mp4".into()),
//!     },
//!     now,
//! );
//! let new = old.with_report(
//!     &StatusReport {
//!         processing_status: Some(ProcessingStatus::Completed),
//!         ..Default::default()
//!     },
//!     now,
//! );
//!
//! // The completed edge plus a present source and no thumbnail fires once.
//! let decision = trigger::evaluate(&old, &new).expect("readiness edge fires");
//! assert_eq!(decision.asset_id, old.id);
//! assert!(trigger::evaluate(&new, &new).is_none());
//! ```

#![allow(missing_docs)]

/// Principals and permission strings for the maintenance surface
pub mod access;

/// Asset snapshots, status enums, and upstream report types
pub mod asset;

/// Operator backfill for assets the automatic path missed
pub mod backfill;

/// Config port, feature flag, and dispatch settings (secrets included)
pub mod config;

/// HTTP client for the external rendering service
pub mod dispatch;

/// Error types shared across the crate
pub mod error;

/// Status-report ingestion: atomic mutation plus dispatch enqueue
pub mod ingest;

/// Generation-job state machine
pub mod job;

/// Stuck-job view and the background audit
pub mod recovery;

/// Asset store port with Postgres and in-memory adapters
pub mod store;

/// Edge-detection trigger policy
pub mod trigger;

/// Bounded dispatch queue and the draining worker
pub mod worker;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{Result, ThumbnailError};
