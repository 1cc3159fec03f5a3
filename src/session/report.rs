//! Human-readable calibration outcome

use std::path::PathBuf;

use crate::engine::CalibrationResult;

/// Text shown in place of the fitting error when the engine reports none
pub const ERROR_UNAVAILABLE: &str = "Fitting error unavailable";

/// Display lines for one calibration attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub headline: String,
    pub fitting_error: String,
    pub sample_size: String,
}

impl CalibrationReport {
    pub fn new(result: &CalibrationResult) -> Self {
        let headline = if result.is_success() {
            "Calibration succeeded".to_string()
        } else {
            format!(
                "Calibration failed, the model could not be fitted (status {})",
                result.status
            )
        };

        // The -1 sentinel means "no metric", never "zero error".
        let fitting_error = match result.fitting_error_px() {
            Some(error) => format!("Fitting error: {:.4} px", error),
            None => ERROR_UNAVAILABLE.to_string(),
        };

        Self {
            headline,
            fitting_error,
            sample_size: format!("Samples used: {}", result.sample_size),
        }
    }

    /// Lines for the result review screen, including the key prompt
    pub fn review_lines(&self) -> Vec<String> {
        vec![
            self.headline.clone(),
            self.fitting_error.clone(),
            self.sample_size.clone(),
            "Press \"Enter\" to continue or \"R\" to recalibrate".to_string(),
        ]
    }

    /// Lines shown above the gaze cursor while sampling
    pub fn sampling_lines(&self, success: bool) -> Vec<String> {
        if success {
            vec![self.headline.clone(), self.fitting_error.clone()]
        } else {
            vec![
                self.headline.clone(),
                "Gaze sampling is unavailable without a valid calibration".to_string(),
            ]
        }
    }
}

/// Where the accepted calibration ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationSave {
    Saved(PathBuf),
    /// Export or write failed; the calibration only lives in the engine
    Failed(PathBuf),
}

impl CalibrationSave {
    pub fn line(&self) -> String {
        match self {
            CalibrationSave::Saved(path) => format!("Calibration saved to {}", path.display()),
            CalibrationSave::Failed(path) => {
                format!("Calibration could not be saved to {}", path.display())
            }
        }
    }
}

impl From<&CalibrationResult> for CalibrationReport {
    fn from(result: &CalibrationResult) -> Self {
        Self::new(result)
    }
}
