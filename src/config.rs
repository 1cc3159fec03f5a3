//! Application configuration
//!
//! Loaded from TOML. Every value is validated up front; anything out of range
//! is reported with a descriptive error instead of being clamped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::engine::{CalibrationMode, InitParams, ScreenSetup, TrackingRegion};
use crate::error::{ConfigError, ConfigResult};
use crate::session::sequencer::validate_normalized;
use crate::session::SessionOptions;
use crate::store::CalibrationStore;

/// Engine loading and initialisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vendor library location, platform default when unset
    pub library_path: Option<PathBuf>,
    pub camera_id: i32,
    pub look_ahead: i32,
    pub preprocessing_type: i32,
    pub license_key: String,
    /// Number of calibration targets: 5, 9 or 13
    pub calibration_mode: u32,
    pub tracking_region: Option<TrackingRegion>,
    /// Poll gaze samples on a worker thread
    pub background_polling: bool,
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let init = InitParams::default();
        Self {
            library_path: None,
            camera_id: init.camera_id,
            look_ahead: init.look_ahead,
            preprocessing_type: init.preprocessing_type,
            license_key: String::new(),
            calibration_mode: CalibrationMode::default().points(),
            tracking_region: None,
            background_polling: false,
            poll_interval_ms: 8,
        }
    }
}

impl EngineConfig {
    pub fn init_params(&self) -> InitParams {
        InitParams {
            camera_id: self.camera_id,
            look_ahead: self.look_ahead,
            preprocessing_type: self.preprocessing_type,
        }
    }

    pub fn calibration_mode(&self) -> ConfigResult<CalibrationMode> {
        CalibrationMode::try_from(self.calibration_mode)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Screen geometry and camera placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub width_inch: f32,
    pub height_inch: f32,
    pub camera_x_cm: f32,
    pub camera_y_cm: f32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            width_inch: 34.4 / 2.54,
            height_inch: 19.4 / 2.54,
            camera_x_cm: 17.09,
            camera_y_cm: -0.65,
        }
    }
}

impl ScreenConfig {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn setup(&self) -> ScreenSetup {
        ScreenSetup {
            camera_x_cm: self.camera_x_cm,
            camera_y_cm: self.camera_y_cm,
            width_px: self.width,
            height_px: self.height,
            width_inch: self.width_inch,
            height_inch: self.height_inch,
        }
    }
}

/// Workflow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Normalized calibration targets, `[x, y]` in `[0, 1]`. One per target the
    /// calibration mode shows; the mode's default layout when unset
    pub calibration_points: Option<Vec<[f64; 2]>>,
    /// Normalized validation targets, `[x, y]` in `[0, 1]`
    pub validation_points: Vec<[f64; 2]>,
    pub validation_dwell_ms: u64,
    pub continue_ends_sampling: bool,
    /// Engine data written here when sampling ends
    pub data_path: Option<PathBuf>,
    /// Accepted calibrations exported here
    pub calibration_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calibration_points: None,
            validation_points: vec![[0.3, 0.3], [0.7, 0.3], [0.5, 0.5], [0.3, 0.7], [0.7, 0.7]],
            validation_dwell_ms: 1500,
            continue_ends_sampling: true,
            data_path: None,
            calibration_file: None,
        }
    }
}

fn pairs(points: &[[f64; 2]]) -> Vec<(f64, f64)> {
    points.iter().map(|p| (p[0], p[1])).collect()
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub screen: ScreenConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// `<config dir>/gazecal/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gazecal").join("config.toml"))
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the configuration at `path`
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        info!("✅ Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Load `explicit` if given, else the default location if it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                info!("No configuration file found, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Calibration targets in the order the engine shows them
    pub fn calibration_points(&self) -> Vec<(f64, f64)> {
        match &self.session.calibration_points {
            Some(points) => pairs(points),
            None => self
                .engine
                .calibration_mode()
                .unwrap_or_default()
                .default_targets(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let mode = self.engine.calibration_mode()?;

        if self.engine.background_polling && self.engine.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSession(
                "engine.poll_interval_ms must be positive when background polling is enabled"
                    .to_string(),
            ));
        }

        if let Some(region) = self.engine.tracking_region {
            if region.width <= 0 || region.height <= 0 || region.x < 0 || region.y < 0 {
                return Err(ConfigError::InvalidSession(format!(
                    "tracking region {:?} must have a non-negative origin and positive size",
                    region
                )));
            }
        }

        let s = &self.screen;
        if s.width == 0 || s.height == 0 {
            return Err(ConfigError::InvalidScreen(format!(
                "{}x{} px has a zero dimension",
                s.width, s.height
            )));
        }
        for (name, value) in [
            ("width_inch", s.width_inch),
            ("height_inch", s.height_inch),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidScreen(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !s.camera_x_cm.is_finite() || !s.camera_y_cm.is_finite() {
            return Err(ConfigError::InvalidScreen(
                "camera position must be finite".to_string(),
            ));
        }

        let calibration_points = self.calibration_points();
        validate_normalized(&calibration_points)?;
        if calibration_points.len() != mode.points() as usize {
            return Err(ConfigError::CalibrationPointCount {
                mode: mode.points(),
                points: calibration_points.len(),
            });
        }
        validate_normalized(&pairs(&self.session.validation_points))?;

        if !self.session.validation_points.is_empty() && self.session.validation_dwell_ms == 0 {
            return Err(ConfigError::InvalidSession(
                "session.validation_dwell_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Controller options derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            screen: self.screen.size(),
            calibration_points: self.calibration_points(),
            validation_points: pairs(&self.session.validation_points),
            validation_dwell: Duration::from_millis(self.session.validation_dwell_ms),
            continue_ends_sampling: self.session.continue_ends_sampling,
            data_path: self.session.data_path.clone(),
            calibration_store: self.session.calibration_file.clone().map(CalibrationStore::new),
        }
    }
}
