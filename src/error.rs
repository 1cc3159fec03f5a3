use std::path::PathBuf;
use thiserror::Error;

/// Error type for calls into the tracking engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The vendor library could not be opened
    #[error("Failed to load tracking library {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A required export is missing from the vendor library
    #[error("Tracking library is missing symbol `{0}`")]
    Symbol(String),

    /// The engine answered with a failure status
    #[error("Engine call `{op}` failed with status {code}")]
    Status { op: &'static str, code: i32 },

    /// License registration was refused; nothing else can run
    #[error("License rejected by the tracking engine (days remaining: {days})")]
    LicenseRejected { days: i32 },

    /// The engine returned bytes that could not be interpreted
    #[error("Engine returned invalid data from `{op}`: {reason}")]
    InvalidData { op: &'static str, reason: String },

    /// The operation is not valid in the engine's current state
    #[error("Engine is not ready for `{0}`")]
    NotReady(&'static str),
}

impl EngineError {
    /// Map a raw status code where `0` means success.
    pub fn check_zero(op: &'static str, code: i32) -> EngineResult<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(EngineError::Status { op, code })
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error type for configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid calibration mode: {0}, you need to choose from 5, 9, and 13")]
    InvalidCalibrationMode(u32),

    #[error("Invalid cue `{0}`, expected `left` or `right`")]
    InvalidCue(String),

    #[error("Target point {index} ({x}, {y}) is outside the normalized range [0, 1]")]
    CoordinateOutOfRange { index: usize, x: f64, y: f64 },

    #[error("Invalid screen geometry: {0}")]
    InvalidScreen(String),

    #[error("Invalid session setting: {0}")]
    InvalidSession(String),

    /// Explicit calibration targets disagree with the engine's calibration mode
    #[error(
        "session.calibration_points lists {points} targets but calibration mode {mode} needs exactly {mode}"
    )]
    CalibrationPointCount { mode: u32, points: usize },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Error type for calibration blob persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Calibration file operation failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Calibration file {0} is empty")]
    Empty(PathBuf),

    #[error("Calibration file {path} is not valid UTF-8")]
    Encoding { path: PathBuf },
}
