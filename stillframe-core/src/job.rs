//! Generation-job state machine.
//!
//! Legal transitions over [`GenerationStatus`]:
//!
//! ```text
//! unset|failed|completed --begin--> pending --accept--> processing
//! pending|processing --fail--> failed
//! pending|processing --complete--> completed
//! ```
//!
//! The automatic path ([`StartMode::Triggered`]) may not begin while a job is
//! in flight; the manual backfill override ([`StartMode::Manual`]) may begin
//! from any state. All asset-level bookkeeping tied to a transition (attempt
//! counting, error clearing, `thumbnail_generated_at`) lives here so the two
//! store adapters cannot drift apart.

use chrono::{DateTime, Utc};

use crate::asset::{Asset, GenerationStatus};
use crate::error::{Result, ThumbnailError};

/// How a new job is being started.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartMode {
    /// Edge-triggered, from a readiness signal. Blocked while in flight.
    Triggered,
    /// Operator backfill. Allowed from any state, including in flight.
    Manual,
}

impl GenerationStatus {
    /// A job exists and has not reached a terminal state.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, GenerationStatus::Pending | GenerationStatus::Processing)
    }

    /// Whether a new job may enter `pending` under the given mode.
    pub fn can_begin(&self, mode: StartMode) -> bool {
        match mode {
            StartMode::Triggered => !self.is_in_flight(),
            StartMode::Manual => true,
        }
    }

    fn transition(self, to: GenerationStatus, legal: bool) -> Result<GenerationStatus> {
        if legal {
            Ok(to)
        } else {
            Err(ThumbnailError::InvalidTransition { from: self, to })
        }
    }

    /// `unset|failed|completed -> pending` (any state under `Manual`).
    pub fn begin(self, mode: StartMode) -> Result<GenerationStatus> {
        self.transition(GenerationStatus::Pending, self.can_begin(mode))
    }

    /// `pending -> processing`, once the dispatch call was accepted.
    pub fn accept(self) -> Result<GenerationStatus> {
        self.transition(
            GenerationStatus::Processing,
            self == GenerationStatus::Pending,
        )
    }

    /// `pending|processing -> failed`.
    pub fn fail(self) -> Result<GenerationStatus> {
        self.transition(GenerationStatus::Failed, self.is_in_flight())
    }

    /// `pending|processing -> completed`.
    pub fn complete(self) -> Result<GenerationStatus> {
        self.transition(GenerationStatus::Completed, self.is_in_flight())
    }
}

impl Asset {
    /// Enter `pending`: bump the attempt counter, clear the previous error and
    /// `thumbnail_generated_at` (non-null iff completed).
    pub fn begin_generation(&mut self, mode: StartMode, now: DateTime<Utc>) -> Result<()> {
        self.generation_status = self.generation_status.begin(mode)?;
        self.generation_attempts += 1;
        self.generation_error = None;
        self.thumbnail_generated_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// The dispatch call was accepted by the rendering service.
    pub fn accept_generation(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.generation_status = self.generation_status.accept()?;
        self.updated_at = now;
        Ok(())
    }

    /// Dispatch or rendering failed; record why.
    pub fn fail_generation(&mut self, error: &str, now: DateTime<Utc>) -> Result<()> {
        self.generation_status = self.generation_status.fail()?;
        self.generation_error = Some(error.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Rendering succeeded; store the thumbnail and stamp the completion time.
    pub fn complete_generation(
        &mut self,
        thumbnail_url: &str,
        thumbnail_blur_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.generation_status = self.generation_status.complete()?;
        self.thumbnail_url = Some(thumbnail_url.to_string());
        self.thumbnail_blur_url = thumbnail_blur_url.map(str::to_string);
        self.thumbnail_generated_at = Some(now);
        self.generation_error = None;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::NewAsset;

    #[test]
    fn triggered_begin_is_blocked_while_in_flight() {
        assert!(GenerationStatus::Unset.begin(StartMode::Triggered).is_ok());
        assert!(GenerationStatus::Failed.begin(StartMode::Triggered).is_ok());
        assert!(GenerationStatus::Completed.begin(StartMode::Triggered).is_ok());
        assert!(GenerationStatus::Pending.begin(StartMode::Triggered).is_err());
        assert!(GenerationStatus::Processing.begin(StartMode::Triggered).is_err());
    }

    #[test]
    fn manual_begin_is_allowed_from_any_state() {
        for status in [
            GenerationStatus::Unset,
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert_eq!(
                status.begin(StartMode::Manual).unwrap(),
                GenerationStatus::Pending
            );
        }
    }

    #[test]
    fn accept_only_from_pending() {
        assert!(GenerationStatus::Pending.accept().is_ok());
        for status in [
            GenerationStatus::Unset,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert!(status.accept().is_err());
        }
    }

    #[test]
    fn terminal_states_reject_fail_and_complete() {
        assert!(GenerationStatus::Completed.fail().is_err());
        assert!(GenerationStatus::Failed.complete().is_err());
        assert!(GenerationStatus::Unset.complete().is_err());
        assert!(GenerationStatus::Pending.fail().is_ok());
        assert!(GenerationStatus::Processing.complete().is_ok());
    }

    #[test]
    fn generated_at_is_non_null_iff_completed() {
        let now = Utc::now();
        let mut asset = Asset::new(NewAsset::default(), now);

        asset.begin_generation(StartMode::Triggered, now).unwrap();
        assert!(asset.thumbnail_generated_at.is_none());

        asset.accept_generation(now).unwrap();
        asset
            .complete_generation("https://cdn.example.com/t.jpg", None, now)
            .unwrap();
        assert_eq!(asset.generation_status, GenerationStatus::Completed);
        assert!(asset.thumbnail_generated_at.is_some());

        // A manual re-trigger clears the stamp again.
        asset.begin_generation(StartMode::Manual, now).unwrap();
        assert_eq!(asset.generation_status, GenerationStatus::Pending);
        assert!(asset.thumbnail_generated_at.is_none());
    }

    #[test]
    fn begin_counts_attempts_and_clears_error() {
        let now = Utc::now();
        let mut asset = Asset::new(NewAsset::default(), now);

        asset.begin_generation(StartMode::Triggered, now).unwrap();
        asset.fail_generation("connect timeout", now).unwrap();
        assert_eq!(asset.generation_attempts, 1);
        assert_eq!(asset.generation_error.as_deref(), Some("connect timeout"));

        asset.begin_generation(StartMode::Triggered, now).unwrap();
        assert_eq!(asset.generation_attempts, 2);
        assert!(asset.generation_error.is_none());
    }
}
