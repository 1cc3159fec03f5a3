//! Post-calibration accuracy check.
//!
//! Validation targets are shown one after another for a fixed dwell time while
//! gaze samples stream in; each sample's distance to the visible target is
//! accumulated per target.

use serde::Serialize;
use std::time::Duration;

use super::sequencer::{Target, TargetSequence};
use crate::engine::GazeSample;

#[derive(Debug, Clone, Copy, Default)]
struct ErrorAccumulator {
    sum_px: f64,
    samples: u32,
}

impl ErrorAccumulator {
    fn mean(&self) -> Option<f32> {
        (self.samples > 0).then(|| (self.sum_px / f64::from(self.samples)) as f32)
    }
}

/// Accuracy measured on one validation target
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetError {
    pub target: Target,
    pub mean_error_px: Option<f32>,
    pub samples: u32,
}

/// Result of a completed validation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub targets: Vec<TargetError>,
    pub overall_mean_px: Option<f32>,
}

impl ValidationSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![match self.overall_mean_px {
            Some(mean) => format!("Validation mean error: {:.1} px", mean),
            None => "Validation recorded no gaze samples".to_string(),
        }];
        for (i, t) in self.targets.iter().enumerate() {
            lines.push(match t.mean_error_px {
                Some(mean) => format!(
                    "Target {} ({}, {}): {:.1} px over {} samples",
                    i + 1,
                    t.target.x,
                    t.target.y,
                    mean,
                    t.samples
                ),
                None => format!("Target {} ({}, {}): no samples", i + 1, t.target.x, t.target.y),
            });
        }
        lines
    }
}

/// Steps through validation targets and accumulates gaze error
#[derive(Debug, Clone)]
pub struct ValidationTracker {
    targets: TargetSequence,
    dwell: Duration,
    index: usize,
    on_target: Duration,
    errors: Vec<ErrorAccumulator>,
}

impl ValidationTracker {
    pub fn new(targets: TargetSequence, dwell: Duration) -> Self {
        let errors = vec![ErrorAccumulator::default(); targets.len()];
        Self {
            targets,
            dwell,
            index: 0,
            on_target: Duration::ZERO,
            errors,
        }
    }

    /// Target currently on screen, `None` once every target was shown
    pub fn current(&self) -> Option<&Target> {
        self.targets.get(self.index)
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Time the current target has been visible
    pub fn on_target(&self) -> Duration {
        self.on_target
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.targets.len()
    }

    /// Attribute a gaze sample to the visible target
    pub fn record(&mut self, sample: &GazeSample) {
        if let (Some(target), Some(acc)) = (self.targets.get(self.index), self.errors.get_mut(self.index)) {
            let dx = f64::from(sample.gaze_x) - f64::from(target.x);
            let dy = f64::from(sample.gaze_y) - f64::from(target.y);
            acc.sum_px += dx.hypot(dy);
            acc.samples += 1;
        }
    }

    /// Advance the dwell clock, returning `true` when a new target appeared
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.is_finished() {
            return false;
        }
        self.on_target += dt;
        if self.on_target >= self.dwell {
            self.index += 1;
            self.on_target = Duration::ZERO;
            return !self.is_finished();
        }
        false
    }

    pub fn summary(&self) -> ValidationSummary {
        let targets: Vec<TargetError> = self
            .targets
            .iter()
            .zip(&self.errors)
            .map(|(target, acc)| TargetError {
                target: *target,
                mean_error_px: acc.mean(),
                samples: acc.samples,
            })
            .collect();

        let (sum, samples) = self
            .errors
            .iter()
            .fold((0.0, 0u32), |(sum, n), acc| (sum + acc.sum_px, n + acc.samples));
        let overall_mean_px = (samples > 0).then(|| (sum / f64::from(samples)) as f32);

        ValidationSummary {
            targets,
            overall_mean_px,
        }
    }
}
