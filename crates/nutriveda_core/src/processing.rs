//! Prescription upload processing simulation.
//!
//! An uploaded prescription moves through an ordered list of stages. Exactly
//! one stage advances at a time and stage `n + 1` never receives progress
//! before stage `n` reaches 100 and is marked complete.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::observer::{DetachHandle, Subscription};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("A processing pipeline needs at least one stage")]
    NoStages,
    #[error("Step size must be within 1..=100, got {0}")]
    InvalidStep(u8),
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStage {
    pub name: String,
    pub description: String,
    pub progress: u8,
    pub complete: bool,
}

impl ProcessingStage {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            progress: 0,
            complete: false,
        }
    }
}

/// The stages a prescription image goes through before a diet
/// recommendation can be drafted.
pub fn prescription_stages() -> Vec<ProcessingStage> {
    vec![
        ProcessingStage::new("Upload", "Receiving prescription file"),
        ProcessingStage::new("Image Analysis", "Detecting layout and handwriting regions"),
        ProcessingStage::new("Text Extraction", "Reading prescription text"),
        ProcessingStage::new(
            "Medical Entity Recognition",
            "Identifying conditions, medications and dosages",
        ),
        ProcessingStage::new(
            "Diet Recommendation",
            "Matching findings against dietary guidelines",
        ),
    ]
}

/// Returns `true` when no stage has progressed while an earlier stage is
/// still incomplete.
pub fn stages_in_order(stages: &[ProcessingStage]) -> bool {
    let mut earlier_incomplete = false;
    for stage in stages {
        if earlier_incomplete && (stage.progress > 0 || stage.complete) {
            return false;
        }
        if !stage.complete {
            earlier_incomplete = true;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Point-in-time view handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub stages: Vec<ProcessingStage>,
    /// Index of the stage currently advancing; `None` once finished.
    pub current: Option<usize>,
    pub overall_progress: u8,
}

#[derive(Debug, Clone)]
pub struct ProcessingPipeline {
    stages: Vec<ProcessingStage>,
    current: usize,
    step: u8,
}

impl ProcessingPipeline {
    pub fn new(stages: Vec<ProcessingStage>, step: u8) -> Result<Self, ProcessingError> {
        if stages.is_empty() {
            return Err(ProcessingError::NoStages);
        }
        if step == 0 || step > 100 {
            return Err(ProcessingError::InvalidStep(step));
        }
        let stages = stages
            .into_iter()
            .map(|s| ProcessingStage {
                progress: 0,
                complete: false,
                ..s
            })
            .collect();
        Ok(Self {
            stages,
            current: 0,
            step,
        })
    }

    pub fn stages(&self) -> &[ProcessingStage] {
        &self.stages
    }

    pub fn current_stage(&self) -> Option<&ProcessingStage> {
        self.stages.get(self.current)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.stages.len()
    }

    /// Mean progress across all stages.
    pub fn overall_progress(&self) -> u8 {
        let total: u32 = self.stages.iter().map(|s| s.progress as u32).sum();
        (total / self.stages.len() as u32) as u8
    }

    /// Advance the current stage by one step. When it reaches 100 it is
    /// marked complete and the next stage becomes current. Returns `false`
    /// once every stage is complete.
    pub fn advance(&mut self) -> bool {
        let step = self.step;
        let Some(stage) = self.stages.get_mut(self.current) else {
            return false;
        };
        stage.progress = stage.progress.saturating_add(step).min(100);
        if stage.progress == 100 {
            stage.complete = true;
            debug!(stage = %stage.name, "Processing stage complete");
            self.current += 1;
        }
        debug_assert!(stages_in_order(&self.stages));
        true
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            stages: self.stages.clone(),
            current: (!self.is_complete()).then_some(self.current),
            overall_progress: self.overall_progress(),
        }
    }

    /// Drive the pipeline to completion, pausing `tick` between steps and
    /// reporting a snapshot after each one. Stops reporting (but keeps
    /// running) once the subscription is detached.
    pub async fn run(
        mut self,
        tick: Duration,
        observer: Subscription<PipelineSnapshot>,
    ) -> PipelineSnapshot {
        observer.notify(&self.snapshot());
        while self.advance() {
            observer.notify(&self.snapshot());
            if !self.is_complete() && !tick.is_zero() {
                tokio::time::sleep(tick).await;
            }
        }
        self.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Upload tracking
// ---------------------------------------------------------------------------

struct ActiveUpload {
    id: String,
    file_name: String,
    detach: DetachHandle<PipelineSnapshot>,
    task: JoinHandle<PipelineSnapshot>,
}

/// Owns the single in-progress upload of a screen. Starting a new upload
/// replaces (and silences) the previous one.
#[derive(Default)]
pub struct UploadTracker {
    active: Option<ActiveUpload>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start simulating processing for `file_name`. Must be called inside a
    /// tokio runtime. Returns the upload id.
    pub fn begin(
        &mut self,
        file_name: impl Into<String>,
        tick: Duration,
        step: u8,
        observer: Subscription<PipelineSnapshot>,
    ) -> Result<String, ProcessingError> {
        let pipeline = ProcessingPipeline::new(prescription_stages(), step)?;
        self.cancel();

        let id = Uuid::new_v4().to_string();
        let file_name = file_name.into();
        info!(upload_id = %id, file = %file_name, "Prescription upload started");

        let detach = observer.detach_handle();
        let task = tokio::spawn(pipeline.run(tick, observer));
        self.active = Some(ActiveUpload {
            id: id.clone(),
            file_name,
            detach,
            task,
        });
        Ok(id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    pub fn active_file(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.file_name.as_str())
    }

    /// Silence and abort the current upload, if any. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.detach.detach();
            active.task.abort();
            debug!(upload_id = %active.id, "Prescription upload replaced");
        }
    }

    /// Wait for the current upload to finish and return its final snapshot.
    /// Returns `None` when there is no upload or it was aborted.
    pub async fn finish(&mut self) -> Option<PipelineSnapshot> {
        let active = self.active.take()?;
        active.task.await.ok()
    }
}

impl Drop for UploadTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
