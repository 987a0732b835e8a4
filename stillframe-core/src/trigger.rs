//! Edge-triggered fire policy over asset mutations.
//!
//! [`evaluate`] is a pure function of the (old, new) snapshot pair. It never
//! consults job state or configuration; the store's atomic mutation step
//! applies the in-flight guard before acting on a decision, and the worker
//! applies the enablement flag at dispatch time.

use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetId, MigrationStatus, ProcessingStatus};

/// Which readiness edge produced a decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSignal {
    /// Transcoding finished. Takes precedence when both edges land in one
    /// mutation.
    ProcessingCompleted,
    /// Storage migration finished; the fallback readiness signal.
    MigrationCompleted,
}

/// The decision to dispatch, carrying what the worker needs downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FireDecision {
    pub asset_id: AssetId,
    pub source_url: String,
    pub signal: TriggerSignal,
}

/// Decide whether this mutation should fire a generation job.
///
/// Exactly one decision per qualifying transition:
/// - Signal A: `processing_status` entered `completed` on this mutation.
/// - Signal B: `migration_status` entered `completed` on this mutation.
/// - Guard for either: `source_url` present and no real thumbnail yet.
/// - Signal A suppresses Signal B within the same mutation.
///
/// Repeated writes that leave a status at `completed` do not refire; the
/// comparison is strictly edge-triggered.
pub fn evaluate(old: &Asset, new: &Asset) -> Option<FireDecision> {
    let source_url = new.source_url.as_deref()?;
    if new.has_real_thumbnail() {
        return None;
    }

    let processing_edge = new.processing_status == ProcessingStatus::Completed
        && old.processing_status != ProcessingStatus::Completed;
    let migration_edge = new.migration_status == MigrationStatus::Completed
        && old.migration_status != MigrationStatus::Completed;

    let signal = if processing_edge {
        TriggerSignal::ProcessingCompleted
    } else if migration_edge {
        TriggerSignal::MigrationCompleted
    } else {
        return None;
    };

    Some(FireDecision {
        asset_id: new.id,
        source_url: source_url.to_string(),
        signal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{NewAsset, StatusReport};
    use chrono::Utc;

    fn ready_asset() -> Asset {
        let mut asset = Asset::new(
            NewAsset {
                source_url: Some("https://media.example.com/v1.mp4".to_string()),
            },
            Utc::now(),
        );
        asset.processing_status = ProcessingStatus::Processing;
        asset
    }

    fn report(report: StatusReport, old: &Asset) -> Asset {
        old.with_report(&report, Utc::now())
    }

    #[test]
    fn processing_completion_edge_fires() {
        let old = ready_asset();
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                ..Default::default()
            },
            &old,
        );

        let decision = evaluate(&old, &new).unwrap();
        assert_eq!(decision.signal, TriggerSignal::ProcessingCompleted);
        assert_eq!(decision.asset_id, old.id);
        assert_eq!(decision.source_url, "https://media.example.com/v1.mp4");
    }

    #[test]
    fn repeated_completed_writes_do_not_refire() {
        let mut old = ready_asset();
        old.processing_status = ProcessingStatus::Completed;
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                ..Default::default()
            },
            &old,
        );

        assert!(evaluate(&old, &new).is_none());
    }

    #[test]
    fn migration_completion_is_the_fallback_signal() {
        let mut old = ready_asset();
        old.processing_status = ProcessingStatus::Completed;
        old.migration_status = MigrationStatus::Uploading;
        let new = report(
            StatusReport {
                migration_status: Some(MigrationStatus::Completed),
                ..Default::default()
            },
            &old,
        );

        let decision = evaluate(&old, &new).unwrap();
        assert_eq!(decision.signal, TriggerSignal::MigrationCompleted);
    }

    #[test]
    fn both_edges_in_one_mutation_fire_once_with_processing_precedence() {
        let mut old = ready_asset();
        old.migration_status = MigrationStatus::Uploading;
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                migration_status: Some(MigrationStatus::Completed),
                ..Default::default()
            },
            &old,
        );

        let decision = evaluate(&old, &new).unwrap();
        assert_eq!(decision.signal, TriggerSignal::ProcessingCompleted);
    }

    #[test]
    fn missing_source_url_blocks_the_guard() {
        let mut old = ready_asset();
        old.source_url = None;
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                ..Default::default()
            },
            &old,
        );

        assert!(evaluate(&old, &new).is_none());
    }

    #[test]
    fn source_url_arriving_with_the_edge_passes_the_guard() {
        let mut old = ready_asset();
        old.source_url = None;
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                source_url: Some("https://x/v1.mp4".to_string()),
                ..Default::default()
            },
            &old,
        );

        let decision = evaluate(&old, &new).unwrap();
        assert_eq!(decision.source_url, "https://x/v1.mp4");
    }

    #[test]
    fn real_thumbnail_blocks_but_placeholder_does_not() {
        let mut old = ready_asset();
        old.thumbnail_url = Some("https://cdn.example.com/thumbs/a.jpg".to_string());
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                ..Default::default()
            },
            &old,
        );
        assert!(evaluate(&old, &new).is_none());

        let mut old = ready_asset();
        old.thumbnail_url = Some("data:image/svg+xml;base64,PHN2Zz4=".to_string());
        let new = report(
            StatusReport {
                processing_status: Some(ProcessingStatus::Completed),
                ..Default::default()
            },
            &old,
        );
        assert!(evaluate(&old, &new).is_some());
    }

    #[test]
    fn unrelated_mutations_never_fire() {
        let old = ready_asset();
        let new = report(
            StatusReport {
                migration_status: Some(MigrationStatus::Downloading),
                ..Default::default()
            },
            &old,
        );

        assert!(evaluate(&old, &new).is_none());
    }
}
