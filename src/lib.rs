//! Eye Tracking Calibration Library
//!
//! This library drives an eye-tracking calibration session: engine bring-up,
//! the preview / calibration / review / sampling workflow, target sequencing,
//! validation and the Bevy display front end.

pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod session;
pub mod startup;
pub mod store;
pub mod surface;
pub mod ui;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{
    CalibrationPoint, CalibrationResult, DynEngine, GazeSample, NativeEngine, SimulatedEngine,
    TrackingEngine,
};
pub use error::{ConfigError, EngineError, StoreError};
pub use frame::{FeedbackCue, Frame};
pub use session::{Phase, SessionController, SessionOptions, Signal, Tick};
pub use store::CalibrationStore;
pub use surface::{run_session, AutopilotSurface, DisplaySurface, FramePacing};
