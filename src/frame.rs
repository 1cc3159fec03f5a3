//! Renderer-agnostic description of one UI frame.
//!
//! The session controller produces a [`Frame`] every tick; display surfaces
//! only translate it into pixels, sound and text.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use crate::engine::PreviewFrame;
use crate::session::sequencer::Cue;

/// RGB colour
pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];
pub const BLACK: Rgb = [0, 0, 0];
pub const RED: Rgb = [255, 0, 0];
pub const GREEN: Rgb = [0, 255, 0];
pub const BLUE: Rgb = [0, 0, 255];

/// Radius of a calibration target, pixels
pub const TARGET_RADIUS: f32 = 30.0;

/// Outer radius the breathing pulse starts from, pixels
pub const PULSE_OUTER_RADIUS: f32 = 80.0;

/// Radius of the gaze cursor ring, pixels
pub const GAZE_CURSOR_RADIUS: f32 = 50.0;

/// Length of the breathing pulse on a new target
pub const PULSE_PERIOD: Duration = Duration::from_secs(4);

/// One-shot feedback the surface should play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCue {
    /// A new calibration or validation target appeared
    TargetChanged,
}

/// Calibration or validation target to draw
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMarker {
    /// Centre in screen pixels
    pub center: (f32, f32),
    /// Label drawn inside the target, usually the progress percentage
    pub label: Option<String>,
    pub cue: Option<Cue>,
    /// Outer radius of the breathing pulse, `None` once the pulse is over
    pub pulse_radius: Option<f32>,
}

/// Line from a validation target to the current gaze estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBar {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

/// Everything a surface needs to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub background: Rgb,
    pub preview: Option<PreviewFrame>,
    pub text: Vec<String>,
    pub target: Option<TargetMarker>,
    pub gaze_cursor: Option<(f32, f32)>,
    pub error_bar: Option<ErrorBar>,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            background: WHITE,
            preview: None,
            text: Vec::new(),
            target: None,
            gaze_cursor: None,
            error_bar: None,
        }
    }
}

impl Frame {
    pub fn with_text<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Outer radius of the breathing pulse `elapsed` after a target appeared.
///
/// Shrinks from `outer` to `inner` over [`PULSE_PERIOD`]; `None` afterwards.
pub fn breathing_radius(elapsed: Duration, outer: f32, inner: f32) -> Option<f32> {
    if elapsed > PULSE_PERIOD {
        return None;
    }
    let phase = elapsed.as_secs_f32() / PULSE_PERIOD.as_secs_f32();
    let offset = (phase * FRAC_PI_2).sin();
    Some(inner + (outer - inner) * (1.0 - offset))
}
