//! Tracking engine interface
//!
//! The gaze estimation itself lives in the vendor's native library. This module
//! declares the capability the rest of the application talks to, the plain value
//! types that cross that boundary, and two implementations: the runtime-loaded
//! native binding and a deterministic simulation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, EngineError, EngineResult};

pub mod native;
pub mod simulated;
pub mod worker;

pub use native::NativeEngine;
pub use simulated::{SimulatedEngine, SimulationScript};
pub use worker::{BackgroundSampler, Mailbox};

/// Status code the engine reports for a successful calibration
pub const CALIBRATION_SUCCESS: i32 = 1;

/// Fitting error value meaning "no error metric available"
pub const FITTING_ERROR_UNAVAILABLE: f32 = -1.0;

/// Width of the engine's camera preview buffer
pub const PREVIEW_WIDTH: u32 = 640;

/// Height of the engine's camera preview buffer
pub const PREVIEW_HEIGHT: u32 = 480;

/// Current calibration target as reported by the engine.
///
/// Equality looks at the position only. Two polls of the same target with
/// different progress compare equal, which is what the controller uses to
/// tell "new target" apart from "same target, more progress".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Screen x in pixels
    pub x: f32,
    /// Screen y in pixels
    pub y: f32,
    /// Progress on this target, 0-100
    pub progress: i32,
}

impl CalibrationPoint {
    pub fn new(x: f32, y: f32, progress: i32) -> Self {
        Self { x, y, progress }
    }
}

impl PartialEq for CalibrationPoint {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// Outcome of one calibration attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Engine status code, [`CALIBRATION_SUCCESS`] on success
    pub status: i32,
    /// Model residual in pixels, [`FITTING_ERROR_UNAVAILABLE`] when not reported
    pub fitting_error: f32,
    /// Number of samples the model was fitted on
    pub sample_size: i32,
}

impl CalibrationResult {
    /// Result used when calibration could not even be started
    pub fn failed() -> Self {
        Self {
            status: 0,
            fitting_error: FITTING_ERROR_UNAVAILABLE,
            sample_size: 0,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == CALIBRATION_SUCCESS
    }

    /// Fitting error in pixels, `None` when the engine reported the sentinel
    pub fn fitting_error_px(&self) -> Option<f32> {
        if self.fitting_error == FITTING_ERROR_UNAVAILABLE {
            None
        } else {
            Some(self.fitting_error)
        }
    }
}

/// One gaze estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub status: i32,
    /// Monotonic engine timestamp
    pub timestamp: u64,
    pub gaze_x: f32,
    pub gaze_y: f32,
    /// Eyelid openness, roughly 0.0-1.0
    pub left_openness: f32,
    pub right_openness: f32,
}

/// Camera preview image, tightly packed RGB24 rows
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl PreviewFrame {
    /// Black frame in the engine's preview resolution
    pub fn blank() -> Self {
        Self {
            width: PREVIEW_WIDTH,
            height: PREVIEW_HEIGHT,
            rgb: vec![0; (PREVIEW_WIDTH * PREVIEW_HEIGHT * 3) as usize],
        }
    }

    /// Expand to RGBA8 with an opaque alpha channel
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.rgb.len() / 3 * 4);
        for px in self.rgb.chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        rgba
    }
}

/// Arguments for engine initialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    pub camera_id: i32,
    pub look_ahead: i32,
    pub preprocessing_type: i32,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            camera_id: 0,
            look_ahead: 2,
            preprocessing_type: 1,
        }
    }
}

/// Camera placement and screen geometry handed to the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSetup {
    /// Camera offset from the screen's top centre, centimetres
    pub camera_x_cm: f32,
    pub camera_y_cm: f32,
    pub width_px: u32,
    pub height_px: u32,
    /// Physical screen size, inches
    pub width_inch: f32,
    pub height_inch: f32,
}

impl ScreenSetup {
    /// Dots per inch along each axis
    pub fn dpi(&self) -> (f32, f32) {
        (
            self.width_px as f32 / self.width_inch,
            self.height_px as f32 / self.height_inch,
        )
    }
}

/// Number of targets the engine uses for a calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CalibrationMode {
    Five,
    Nine,
    Thirteen,
}

impl CalibrationMode {
    pub fn points(self) -> u32 {
        match self {
            CalibrationMode::Five => 5,
            CalibrationMode::Nine => 9,
            CalibrationMode::Thirteen => 13,
        }
    }

    /// Normalized target layout used when no explicit points are configured.
    ///
    /// Five is the centre plus the corners, nine a 3x3 grid, thirteen the grid
    /// plus an inner square.
    pub fn default_targets(self) -> Vec<(f64, f64)> {
        const EDGE: [f64; 2] = [0.1, 0.9];
        const GRID: [f64; 3] = [0.1, 0.5, 0.9];
        const INNER: [f64; 2] = [0.3, 0.7];

        match self {
            CalibrationMode::Five => {
                let mut targets: Vec<(f64, f64)> = EDGE
                    .iter()
                    .flat_map(|&y| EDGE.iter().map(move |&x| (x, y)))
                    .collect();
                targets.insert(2, (0.5, 0.5));
                targets
            }
            CalibrationMode::Nine => GRID
                .iter()
                .flat_map(|&y| GRID.iter().map(move |&x| (x, y)))
                .collect(),
            CalibrationMode::Thirteen => {
                let mut targets = CalibrationMode::Nine.default_targets();
                targets.extend(INNER.iter().flat_map(|&y| INNER.iter().map(move |&x| (x, y))));
                targets
            }
        }
    }
}

impl Default for CalibrationMode {
    fn default() -> Self {
        CalibrationMode::Nine
    }
}

impl TryFrom<u32> for CalibrationMode {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(CalibrationMode::Five),
            9 => Ok(CalibrationMode::Nine),
            13 => Ok(CalibrationMode::Thirteen),
            other => Err(ConfigError::InvalidCalibrationMode(other)),
        }
    }
}

impl From<CalibrationMode> for u32 {
    fn from(mode: CalibrationMode) -> Self {
        mode.points()
    }
}

/// Region of the camera image the engine should search for the face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Interpret the value returned by license registration.
///
/// A positive value is the number of days the license remains valid.
pub fn license_days(days: i32) -> EngineResult<u32> {
    if days > 0 {
        Ok(days as u32)
    } else {
        Err(EngineError::LicenseRejected { days })
    }
}

/// Capability offered by an eye-tracking engine.
///
/// Every call is a bounded-latency query; implementations must not block on
/// camera I/O. Engines that can block are wrapped in [`BackgroundSampler`].
pub trait TrackingEngine {
    fn init(&mut self, params: &InitParams) -> EngineResult<()>;

    /// Register the license, returning the number of days it remains valid
    fn register(&mut self, license_key: &str) -> EngineResult<u32>;

    fn configure(&mut self, setup: &ScreenSetup) -> EngineResult<()>;

    fn set_calibration_mode(&mut self, mode: CalibrationMode) -> EngineResult<()>;

    fn set_tracking_region(&mut self, region: TrackingRegion) -> EngineResult<()>;

    fn start_preview(&mut self) -> EngineResult<()>;

    fn stop_preview(&mut self) -> EngineResult<()>;

    fn preview_frame(&mut self) -> EngineResult<PreviewFrame>;

    fn start_calibration(&mut self) -> EngineResult<()>;

    fn is_calibration_finished(&mut self) -> EngineResult<bool>;

    fn calibration_point(&mut self) -> EngineResult<CalibrationPoint>;

    fn calibration_result(&mut self) -> EngineResult<CalibrationResult>;

    fn start_sampling(&mut self) -> EngineResult<()>;

    fn stop_sampling(&mut self) -> EngineResult<()>;

    fn gaze_sample(&mut self) -> EngineResult<GazeSample>;

    /// Ask the engine to write the data it recorded to `path`
    fn save_data(&mut self, path: &Path) -> EngineResult<()>;

    /// Restore a previously exported calibration blob
    fn load_calibration(&mut self, blob: &str) -> EngineResult<()>;

    /// Export the current calibration as an opaque blob
    fn export_calibration(&mut self) -> EngineResult<String>;

    fn version(&mut self) -> EngineResult<String>;
}

impl<T: TrackingEngine + ?Sized> TrackingEngine for Box<T> {
    fn init(&mut self, params: &InitParams) -> EngineResult<()> {
        (**self).init(params)
    }

    fn register(&mut self, license_key: &str) -> EngineResult<u32> {
        (**self).register(license_key)
    }

    fn configure(&mut self, setup: &ScreenSetup) -> EngineResult<()> {
        (**self).configure(setup)
    }

    fn set_calibration_mode(&mut self, mode: CalibrationMode) -> EngineResult<()> {
        (**self).set_calibration_mode(mode)
    }

    fn set_tracking_region(&mut self, region: TrackingRegion) -> EngineResult<()> {
        (**self).set_tracking_region(region)
    }

    fn start_preview(&mut self) -> EngineResult<()> {
        (**self).start_preview()
    }

    fn stop_preview(&mut self) -> EngineResult<()> {
        (**self).stop_preview()
    }

    fn preview_frame(&mut self) -> EngineResult<PreviewFrame> {
        (**self).preview_frame()
    }

    fn start_calibration(&mut self) -> EngineResult<()> {
        (**self).start_calibration()
    }

    fn is_calibration_finished(&mut self) -> EngineResult<bool> {
        (**self).is_calibration_finished()
    }

    fn calibration_point(&mut self) -> EngineResult<CalibrationPoint> {
        (**self).calibration_point()
    }

    fn calibration_result(&mut self) -> EngineResult<CalibrationResult> {
        (**self).calibration_result()
    }

    fn start_sampling(&mut self) -> EngineResult<()> {
        (**self).start_sampling()
    }

    fn stop_sampling(&mut self) -> EngineResult<()> {
        (**self).stop_sampling()
    }

    fn gaze_sample(&mut self) -> EngineResult<GazeSample> {
        (**self).gaze_sample()
    }

    fn save_data(&mut self, path: &Path) -> EngineResult<()> {
        (**self).save_data(path)
    }

    fn load_calibration(&mut self, blob: &str) -> EngineResult<()> {
        (**self).load_calibration(blob)
    }

    fn export_calibration(&mut self) -> EngineResult<String> {
        (**self).export_calibration()
    }

    fn version(&mut self) -> EngineResult<String> {
        (**self).version()
    }
}

/// Engine object that can live in a Bevy resource or move to a worker thread
pub type DynEngine = Box<dyn TrackingEngine + Send + Sync>;
