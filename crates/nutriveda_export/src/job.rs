use chrono::{DateTime, Utc};
use nutriveda_docs::ExportFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Building,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

impl JobState {
    /// Progress range a job may report while in this state.
    pub fn band(self) -> (u8, u8) {
        match self {
            Self::Idle => (0, 0),
            Self::Building => (0, 30),
            Self::Rendering => (30, 90),
            Self::Finalizing => (90, 100),
            Self::Complete => (100, 100),
            Self::Failed => (0, 100),
        }
    }

    /// The state a successful job moves to next.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Building),
            Self::Building => Some(Self::Rendering),
            Self::Rendering => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Complete),
            Self::Complete | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobScope {
    Single,
    Bulk,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Export job {job_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}

// ---------------------------------------------------------------------------
// ExportJob
// ---------------------------------------------------------------------------

/// What observers of a running export see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub job_id: String,
    pub state: JobState,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub format: ExportFormat,
    pub scope: JobScope,
    pub state: JobState,
    pub progress: u8,
    pub target_plan_ids: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExportJob {
    pub fn new(
        format: ExportFormat,
        scope: JobScope,
        target_plan_ids: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            format,
            scope,
            state: JobState::Idle,
            progress: 0,
            target_plan_ids,
            error: None,
            created_at,
        }
    }

    /// Move to `to`. Only the next stage or `Failed` (from a non-terminal
    /// state) is accepted. Entering a stage lifts progress to the start of
    /// its band.
    pub fn transition(&mut self, to: JobState) -> Result<(), JobError> {
        let allowed = if to == JobState::Failed {
            !self.state.is_terminal()
        } else {
            self.state.next() == Some(to)
        };
        if !allowed {
            return Err(JobError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        if to != JobState::Failed {
            self.progress = self.progress.max(to.band().0);
        }
        Ok(())
    }

    /// Report progress within the current band. Values are clamped to the
    /// band and never lower the current progress. Returns the effective value.
    pub fn set_progress(&mut self, value: u8) -> u8 {
        if self.state.is_terminal() || self.state == JobState::Idle {
            return self.progress;
        }
        let (low, high) = self.state.band();
        self.progress = self.progress.max(value.clamp(low, high));
        self.progress
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn update(&self) -> JobUpdate {
        JobUpdate {
            job_id: self.id.clone(),
            state: self.state,
            progress: self.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ExportJob {
        ExportJob::new(
            ExportFormat::Pdf,
            JobScope::Single,
            vec!["plan-1".into()],
            DateTime::from_timestamp(0, 0).unwrap(),
        )
    }

    #[test]
    fn happy_path_walks_every_stage() {
        let mut job = job();
        for state in [
            JobState::Building,
            JobState::Rendering,
            JobState::Finalizing,
            JobState::Complete,
        ] {
            job.transition(state).unwrap();
            assert_eq!(job.progress, state.band().0);
        }
        assert_eq!(job.progress, 100);
        assert!(job.is_terminal());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut job = job();
        job.transition(JobState::Building).unwrap();
        let err = job.transition(JobState::Finalizing).unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobState::Building,
                to: JobState::Finalizing,
                ..
            }
        ));
        assert_eq!(job.state, JobState::Building);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = job();
        job.transition(JobState::Building).unwrap();
        job.fail("boom").unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.transition(JobState::Building).is_err());
        assert!(job.fail("again").is_err());
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut job = job();
        assert_eq!(job.set_progress(50), 0);
        job.transition(JobState::Building).unwrap();
        assert_eq!(job.set_progress(50), 30);
        assert_eq!(job.set_progress(10), 30);
        job.transition(JobState::Rendering).unwrap();
        assert_eq!(job.set_progress(5), 30);
        assert_eq!(job.set_progress(75), 75);
        assert_eq!(job.set_progress(60), 75);
    }

    #[test]
    fn failure_keeps_last_progress() {
        let mut job = job();
        job.transition(JobState::Building).unwrap();
        job.set_progress(20);
        job.fail("bad plan").unwrap();
        assert_eq!(job.update().progress, 20);
        assert_eq!(job.update().state, JobState::Failed);
    }
}
