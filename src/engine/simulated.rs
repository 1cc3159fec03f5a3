//! In-process stand-in for the vendor engine.
//!
//! Walks a fixed list of calibration targets, reports a scripted result and
//! produces gaze samples orbiting the screen centre. Runs are fully
//! deterministic, which makes it usable for headless smoke runs and tests.

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    license_days, CalibrationMode, CalibrationPoint, CalibrationResult, GazeSample, InitParams,
    PreviewFrame, ScreenSetup, TrackingEngine, TrackingRegion, PREVIEW_HEIGHT, PREVIEW_WIDTH,
};
use crate::error::{EngineError, EngineResult};

/// Behaviour of a [`SimulatedEngine`]
#[derive(Debug, Clone)]
pub struct SimulationScript {
    /// Calibration targets in screen pixels, visited in order
    pub targets: Vec<(f32, f32)>,
    /// Progress added on every point poll
    pub progress_step: i32,
    /// Result reported after the last target
    pub result: CalibrationResult,
    /// Value returned by license registration
    pub license_days: i32,
    /// Make `start_calibration` fail with this status
    pub start_failure: Option<i32>,
    /// Radius of the simulated gaze orbit, pixels
    pub gaze_radius: f32,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            targets: vec![
                (960.0, 540.0),
                (192.0, 108.0),
                (1728.0, 108.0),
                (192.0, 972.0),
                (1728.0, 972.0),
            ],
            progress_step: 5,
            result: CalibrationResult {
                status: super::CALIBRATION_SUCCESS,
                fitting_error: 23.5,
                sample_size: 120,
            },
            license_days: 365,
            start_failure: None,
            gaze_radius: 200.0,
        }
    }
}

#[derive(Debug, Default)]
struct CalibrationRun {
    index: usize,
    progress: i32,
    finished: bool,
}

/// Deterministic software engine
#[derive(Debug)]
pub struct SimulatedEngine {
    script: SimulationScript,
    screen: (u32, u32),
    run: Option<CalibrationRun>,
    previewing: bool,
    sampling: bool,
    frame_counter: u32,
    sample_counter: u64,
    calibration_blob: Option<String>,
    calibration_starts: u32,
    saved_paths: Vec<PathBuf>,
}

impl SimulatedEngine {
    pub fn new(script: SimulationScript) -> Self {
        Self {
            script,
            screen: (1920, 1080),
            run: None,
            previewing: false,
            sampling: false,
            frame_counter: 0,
            sample_counter: 0,
            calibration_blob: None,
            calibration_starts: 0,
            saved_paths: Vec::new(),
        }
    }

    /// How many times calibration was started
    pub fn calibration_starts(&self) -> u32 {
        self.calibration_starts
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Paths passed to `save_data`, in call order
    pub fn saved_paths(&self) -> &[PathBuf] {
        &self.saved_paths
    }

    pub fn loaded_calibration(&self) -> Option<&str> {
        self.calibration_blob.as_deref()
    }

    fn current_target(&self, index: usize) -> (f32, f32) {
        self.script
            .targets
            .get(index)
            .or_else(|| self.script.targets.last())
            .copied()
            .unwrap_or((self.screen.0 as f32 / 2.0, self.screen.1 as f32 / 2.0))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulationScript::default())
    }
}

impl TrackingEngine for SimulatedEngine {
    fn init(&mut self, params: &InitParams) -> EngineResult<()> {
        info!("Simulated engine initialised with {:?}", params);
        Ok(())
    }

    fn register(&mut self, _license_key: &str) -> EngineResult<u32> {
        license_days(self.script.license_days)
    }

    fn configure(&mut self, setup: &ScreenSetup) -> EngineResult<()> {
        self.screen = (setup.width_px, setup.height_px);
        Ok(())
    }

    fn set_calibration_mode(&mut self, mode: CalibrationMode) -> EngineResult<()> {
        debug!("Simulated calibration mode: {} points", mode.points());
        Ok(())
    }

    fn set_tracking_region(&mut self, region: TrackingRegion) -> EngineResult<()> {
        debug!("Simulated tracking region: {:?}", region);
        Ok(())
    }

    fn start_preview(&mut self) -> EngineResult<()> {
        self.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> EngineResult<()> {
        self.previewing = false;
        Ok(())
    }

    fn preview_frame(&mut self) -> EngineResult<PreviewFrame> {
        if !self.previewing {
            return Err(EngineError::NotReady("preview_frame"));
        }
        self.frame_counter = self.frame_counter.wrapping_add(1);
        let shift = (self.frame_counter % 256) as u8;
        let mut rgb = Vec::with_capacity((PREVIEW_WIDTH * PREVIEW_HEIGHT * 3) as usize);
        for y in 0..PREVIEW_HEIGHT {
            for x in 0..PREVIEW_WIDTH {
                let r = (x * 255 / PREVIEW_WIDTH) as u8;
                let g = (y * 255 / PREVIEW_HEIGHT) as u8;
                rgb.extend_from_slice(&[r, g, shift]);
            }
        }
        Ok(PreviewFrame {
            width: PREVIEW_WIDTH,
            height: PREVIEW_HEIGHT,
            rgb,
        })
    }

    fn start_calibration(&mut self) -> EngineResult<()> {
        if let Some(code) = self.script.start_failure {
            return Err(EngineError::Status {
                op: "start_calibration",
                code,
            });
        }
        self.calibration_starts += 1;
        self.calibration_blob = None;
        self.run = Some(CalibrationRun::default());
        Ok(())
    }

    fn is_calibration_finished(&mut self) -> EngineResult<bool> {
        Ok(self.run.as_ref().is_some_and(|run| run.finished))
    }

    fn calibration_point(&mut self) -> EngineResult<CalibrationPoint> {
        let step = self.script.progress_step.max(1);
        let count = self.script.targets.len();
        let run = self
            .run
            .as_mut()
            .ok_or(EngineError::NotReady("calibration_point"))?;

        let (index, progress) = (run.index, run.progress);
        if !run.finished {
            run.progress += step;
            if run.progress > 100 {
                run.progress = 0;
                run.index += 1;
                if run.index >= count {
                    run.index = count.saturating_sub(1);
                    run.progress = 100;
                    run.finished = true;
                }
            }
        }

        let (x, y) = self.current_target(index);
        Ok(CalibrationPoint::new(x, y, progress.min(100)))
    }

    fn calibration_result(&mut self) -> EngineResult<CalibrationResult> {
        match &self.run {
            Some(run) if run.finished => Ok(self.script.result),
            _ => Err(EngineError::NotReady("calibration_result")),
        }
    }

    fn start_sampling(&mut self) -> EngineResult<()> {
        self.sampling = true;
        Ok(())
    }

    fn stop_sampling(&mut self) -> EngineResult<()> {
        self.sampling = false;
        Ok(())
    }

    fn gaze_sample(&mut self) -> EngineResult<GazeSample> {
        if !self.sampling {
            return Err(EngineError::NotReady("gaze_sample"));
        }
        self.sample_counter += 1;
        let angle = (self.sample_counter as f32 * 0.05) % TAU;
        let (cx, cy) = (self.screen.0 as f32 / 2.0, self.screen.1 as f32 / 2.0);
        Ok(GazeSample {
            status: 1,
            timestamp: self.sample_counter * 16_667,
            gaze_x: cx + self.script.gaze_radius * angle.cos(),
            gaze_y: cy + self.script.gaze_radius * angle.sin(),
            left_openness: 0.9,
            right_openness: 0.9,
        })
    }

    fn save_data(&mut self, path: &Path) -> EngineResult<()> {
        self.saved_paths.push(path.to_path_buf());
        Ok(())
    }

    fn load_calibration(&mut self, blob: &str) -> EngineResult<()> {
        if blob.is_empty() {
            return Err(EngineError::Status {
                op: "load_calibration",
                code: -1,
            });
        }
        self.calibration_blob = Some(blob.to_string());
        Ok(())
    }

    fn export_calibration(&mut self) -> EngineResult<String> {
        match (&self.calibration_blob, &self.run) {
            (Some(blob), _) => Ok(blob.clone()),
            (None, Some(run)) if run.finished && self.script.result.is_success() => Ok(format!(
                "simulated-calibration;targets={};error={}",
                self.script.targets.len(),
                self.script.result.fitting_error
            )),
            _ => Err(EngineError::Status {
                op: "export_calibration",
                code: 0,
            }),
        }
    }

    fn version(&mut self) -> EngineResult<String> {
        Ok(format!("simulated-{}", env!("CARGO_PKG_VERSION")))
    }
}
