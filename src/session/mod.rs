//! Calibration session controller
//!
//! Drives the preview → calibration → result review → sampling workflow on
//! top of a [`TrackingEngine`]. Each UI frame calls [`SessionController::tick`],
//! which runs four stages in order:
//!
//! 1. apply the user signals drained from the surface,
//! 2. poll the engine for whatever the current phase needs,
//! 3. update session state from the polled values,
//! 4. describe the frame to draw.
//!
//! Nothing here blocks; engine calls are treated as bounded-latency queries.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod report;
pub mod sequencer;
pub mod validation;

pub use report::{CalibrationReport, CalibrationSave};
pub use sequencer::{Cue, Target, TargetSequence, CALIBRATION_CUE_SEED, VALIDATION_CUE_SEED};
pub use validation::{TargetError, ValidationSummary, ValidationTracker};

use crate::engine::{CalibrationPoint, CalibrationResult, GazeSample, PreviewFrame, TrackingEngine};
use crate::error::ConfigResult;
use crate::frame::{
    breathing_radius, ErrorBar, FeedbackCue, Frame, TargetMarker, PULSE_OUTER_RADIUS,
    TARGET_RADIUS,
};
use crate::store::CalibrationStore;

/// Workflow phase; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Previewing,
    AwaitingStart,
    Calibrating,
    ResultReview,
    Sampling,
    Terminated,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Phase::Terminated
    }
}

/// Abstract user input, independent of the key that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Continue,
    Abort,
    Accept,
    Retry,
}

/// Session settings fixed at construction
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Screen size in pixels
    pub screen: (u32, u32),
    /// Normalized calibration target positions
    pub calibration_points: Vec<(f64, f64)>,
    /// Normalized validation target positions
    pub validation_points: Vec<(f64, f64)>,
    /// How long each validation target stays on screen
    pub validation_dwell: Duration,
    /// `Continue` ends sampling; otherwise only `Abort` does
    pub continue_ends_sampling: bool,
    /// Where the engine should save its recorded data on exit
    pub data_path: Option<PathBuf>,
    /// Where an accepted calibration is exported to
    pub calibration_store: Option<CalibrationStore>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            screen: (1920, 1080),
            calibration_points: Vec::new(),
            validation_points: Vec::new(),
            validation_dwell: Duration::from_millis(1500),
            continue_ends_sampling: true,
            data_path: None,
            calibration_store: None,
        }
    }
}

/// State owned by the controller for one session
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    running: bool,
    last_point: Option<CalibrationPoint>,
    distinct_points: usize,
    phase_elapsed: Duration,
    point_elapsed: Duration,
    calibration_targets: TargetSequence,
    validation_targets: TargetSequence,
    result: Option<CalibrationResult>,
    attempts: u32,
    sampling_started: bool,
    validation: Option<ValidationTracker>,
    pending_cue: bool,
    calibration_save: Option<CalibrationSave>,
}

impl Session {
    fn new(calibration_targets: TargetSequence, validation_targets: TargetSequence) -> Self {
        Self {
            phase: Phase::Idle,
            running: true,
            last_point: None,
            distinct_points: 0,
            phase_elapsed: Duration::ZERO,
            point_elapsed: Duration::ZERO,
            calibration_targets,
            validation_targets,
            result: None,
            attempts: 0,
            sampling_started: false,
            validation: None,
            pending_cue: false,
            calibration_save: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last distinct calibration point seen in the current attempt
    pub fn last_point(&self) -> Option<CalibrationPoint> {
        self.last_point
    }

    /// Distinct calibration points seen in the current attempt
    pub fn distinct_points(&self) -> usize {
        self.distinct_points
    }

    pub fn phase_elapsed(&self) -> Duration {
        self.phase_elapsed
    }

    pub fn calibration_targets(&self) -> &TargetSequence {
        &self.calibration_targets
    }

    pub fn validation_targets(&self) -> &TargetSequence {
        &self.validation_targets
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    /// Number of calibration attempts started
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn sampling_started(&self) -> bool {
        self.sampling_started
    }

    /// Outcome of exporting the accepted calibration, if a store is configured
    pub fn calibration_save(&self) -> Option<&CalibrationSave> {
        self.calibration_save.as_ref()
    }

    fn calibration_succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(CalibrationResult::is_success)
    }
}

/// Values read from the engine during one tick
#[derive(Debug, Default)]
struct Polled {
    preview: Option<PreviewFrame>,
    point: Option<CalibrationPoint>,
    result: Option<CalibrationResult>,
    gaze: Option<GazeSample>,
}

/// Output of one tick
#[derive(Debug, Clone)]
pub struct Tick {
    pub frame: Frame,
    /// Feedback to play this frame, at most once per new target
    pub cues: Vec<FeedbackCue>,
    /// Phase change caused by this tick, `(from, to)`
    pub transition: Option<(Phase, Phase)>,
}

/// Sequences one calibration session against a tracking engine
pub struct SessionController<E> {
    engine: E,
    options: SessionOptions,
    session: Session,
    validation_summary: Option<ValidationSummary>,
}

impl<E: TrackingEngine> SessionController<E> {
    /// Build a controller, generating the target sequences for this session
    pub fn new(engine: E, options: SessionOptions) -> ConfigResult<Self> {
        let calibration = TargetSequence::calibration(&options.calibration_points, options.screen)?;
        let validation = TargetSequence::validation(&options.validation_points, options.screen)?;
        Ok(Self {
            engine,
            options,
            session: Session::new(calibration, validation),
            validation_summary: None,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn is_terminated(&self) -> bool {
        self.session.phase.is_terminal()
    }

    /// Accuracy summary once every validation target was shown
    pub fn validation_summary(&self) -> Option<&ValidationSummary> {
        self.validation_summary.as_ref()
    }

    /// Run one frame: signals, engine poll, state update, frame description
    pub fn tick(&mut self, signals: &[Signal], dt: Duration) -> Tick {
        let before = self.session.phase;
        let mut cues = Vec::new();

        if before.is_terminal() {
            return Tick {
                frame: Frame::default(),
                cues,
                transition: None,
            };
        }

        if before == Phase::Idle {
            self.begin();
            // Input queued before the first frame may only abort.
            if signals.contains(&Signal::Abort) {
                self.abort();
            }
        } else {
            self.apply_signals(signals);
        }

        let polled = self.poll();
        self.update(&polled, dt, &mut cues);
        let frame = render(&self.session, polled, self.validation_summary.as_ref());

        let after = self.session.phase;
        Tick {
            frame,
            cues,
            transition: (before != after).then_some((before, after)),
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!("Session phase {:?} -> {:?}", self.session.phase, phase);
        self.session.phase = phase;
        self.session.phase_elapsed = Duration::ZERO;
        self.session.point_elapsed = Duration::ZERO;
        if phase.is_terminal() {
            self.session.running = false;
        }
    }

    fn begin(&mut self) {
        if let Err(e) = self.engine.start_preview() {
            warn!("Camera preview could not be started: {}", e);
        }
        self.enter(Phase::Previewing);
    }

    fn apply_signals(&mut self, signals: &[Signal]) {
        if signals.contains(&Signal::Abort) {
            self.abort();
            return;
        }
        // One signal-driven transition per frame; the rest of the batch is stale.
        for &signal in signals {
            if self.handle_signal(signal) {
                break;
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) -> bool {
        match (self.session.phase, signal) {
            (Phase::Previewing, Signal::Continue) => {
                if let Err(e) = self.engine.stop_preview() {
                    warn!("Camera preview did not stop cleanly: {}", e);
                }
                self.enter(Phase::AwaitingStart);
                true
            }
            (Phase::AwaitingStart, Signal::Continue) | (Phase::ResultReview, Signal::Retry) => {
                self.start_calibration();
                true
            }
            (Phase::ResultReview, Signal::Accept) => {
                self.start_sampling();
                true
            }
            (Phase::Sampling, Signal::Continue) if self.options.continue_ends_sampling => {
                self.leave_sampling();
                self.enter(Phase::Terminated);
                true
            }
            _ => false,
        }
    }

    fn abort(&mut self) {
        info!("Session aborted during {:?}", self.session.phase);
        match self.session.phase {
            Phase::Previewing => {
                if let Err(e) = self.engine.stop_preview() {
                    warn!("Camera preview did not stop cleanly: {}", e);
                }
            }
            Phase::Sampling => self.leave_sampling(),
            _ => {}
        }
        self.enter(Phase::Terminated);
    }

    fn start_calibration(&mut self) {
        self.session.last_point = None;
        self.session.distinct_points = 0;
        self.session.result = None;
        self.session.attempts += 1;

        match self.engine.start_calibration() {
            Ok(()) => {
                info!("Calibration attempt {} started", self.session.attempts);
                self.enter(Phase::Calibrating);
            }
            Err(e) => {
                error!("Calibration could not be started: {}", e);
                self.session.result = Some(CalibrationResult::failed());
                self.enter(Phase::ResultReview);
            }
        }
    }

    fn start_sampling(&mut self) {
        if self.session.calibration_succeeded() {
            match self.engine.start_sampling() {
                Ok(()) => {
                    self.session.sampling_started = true;
                    if !self.session.validation_targets.is_empty() {
                        self.session.validation = Some(ValidationTracker::new(
                            self.session.validation_targets.clone(),
                            self.options.validation_dwell,
                        ));
                        self.session.pending_cue = true;
                    }
                }
                Err(e) => error!("Gaze sampling could not be started: {}", e),
            }
            self.persist_calibration();
        }
        self.enter(Phase::Sampling);
    }

    fn persist_calibration(&mut self) {
        let Some(store) = &self.options.calibration_store else {
            return;
        };
        let path = store.path().to_path_buf();
        let saved = match self.engine.export_calibration() {
            Ok(blob) => match store.save(&blob) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Calibration could not be saved: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Calibration could not be exported: {}", e);
                false
            }
        };
        self.session.calibration_save = Some(if saved {
            CalibrationSave::Saved(path)
        } else {
            CalibrationSave::Failed(path)
        });
    }

    fn leave_sampling(&mut self) {
        if !self.session.sampling_started {
            return;
        }
        if let Err(e) = self.engine.stop_sampling() {
            warn!("Gaze sampling did not stop cleanly: {}", e);
        }
        self.session.sampling_started = false;

        if let Some(path) = &self.options.data_path {
            match self.engine.save_data(path) {
                Ok(()) => info!("✅ Engine data saved to {:?}", path),
                Err(e) => warn!("Engine data could not be saved to {:?}: {}", path, e),
            }
        }
    }

    fn poll(&mut self) -> Polled {
        let mut polled = Polled::default();
        match self.session.phase {
            Phase::Previewing => match self.engine.preview_frame() {
                Ok(frame) => polled.preview = Some(frame),
                Err(e) => debug!("No preview frame: {}", e),
            },
            Phase::Calibrating => {
                match self.engine.calibration_point() {
                    Ok(point) => polled.point = Some(point),
                    Err(e) => debug!("No calibration point: {}", e),
                }
                match self.engine.is_calibration_finished() {
                    Ok(true) => {
                        let result = self.engine.calibration_result().unwrap_or_else(|e| {
                            warn!("Calibration result unavailable: {}", e);
                            CalibrationResult::failed()
                        });
                        polled.result = Some(result);
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Calibration status query failed: {}", e),
                }
            }
            Phase::Sampling if self.session.sampling_started => match self.engine.gaze_sample() {
                Ok(sample) => polled.gaze = Some(sample),
                Err(e) => debug!("No gaze sample: {}", e),
            },
            _ => {}
        }
        polled
    }

    fn update(&mut self, polled: &Polled, dt: Duration, cues: &mut Vec<FeedbackCue>) {
        self.session.phase_elapsed += dt;
        self.session.point_elapsed += dt;

        match self.session.phase {
            Phase::Calibrating => {
                if let Some(point) = polled.point {
                    // Edge-triggered: progress changes on the same target stay silent.
                    if self.session.last_point != Some(point) {
                        debug!("New calibration point ({}, {})", point.x, point.y);
                        cues.push(FeedbackCue::TargetChanged);
                        self.session.last_point = Some(point);
                        self.session.distinct_points += 1;
                        self.session.point_elapsed = Duration::ZERO;
                    }
                }
                if let Some(result) = polled.result {
                    info!(
                        "Calibration finished: status {}, fitting error {}, {} samples",
                        result.status, result.fitting_error, result.sample_size
                    );
                    self.session.result = Some(result);
                    self.enter(Phase::ResultReview);
                }
            }
            Phase::Sampling => {
                if std::mem::take(&mut self.session.pending_cue) {
                    cues.push(FeedbackCue::TargetChanged);
                    self.session.point_elapsed = Duration::ZERO;
                }
                if let Some(tracker) = self.session.validation.as_mut() {
                    if tracker.is_finished() {
                        return;
                    }
                    if let Some(sample) = &polled.gaze {
                        tracker.record(sample);
                    }
                    if tracker.advance(dt) {
                        cues.push(FeedbackCue::TargetChanged);
                        self.session.point_elapsed = Duration::ZERO;
                    }
                    if tracker.is_finished() {
                        let summary = tracker.summary();
                        info!("Validation finished: mean error {:?} px", summary.overall_mean_px);
                        self.validation_summary = Some(summary);
                    }
                }
            }
            _ => {}
        }
    }
}

fn target_marker(
    center: (f32, f32),
    label: Option<String>,
    cue: Option<Cue>,
    point_elapsed: Duration,
) -> TargetMarker {
    TargetMarker {
        center,
        label,
        cue,
        pulse_radius: breathing_radius(point_elapsed, PULSE_OUTER_RADIUS, TARGET_RADIUS),
    }
}

/// Describe the frame for the current session state and this tick's polls
fn render(session: &Session, polled: Polled, summary: Option<&ValidationSummary>) -> Frame {
    match session.phase {
        Phase::Idle | Phase::Terminated => Frame::default(),
        Phase::Previewing => Frame {
            preview: polled.preview,
            text: vec![
                "Adjust your seat until your face is centred in the preview".to_string(),
                "Press \"Space\" to continue".to_string(),
            ],
            ..Default::default()
        },
        Phase::AwaitingStart => Frame::with_text([
            "Please keep looking at the blue dot at all times.",
            "Press \"Space\" to start.",
        ]),
        Phase::Calibrating => {
            let target = polled.point.map(|point| {
                let cue = session
                    .distinct_points
                    .checked_sub(1)
                    .and_then(|n| session.calibration_targets.cycled(n))
                    .map(|t| t.cue);
                target_marker(
                    (point.x, point.y),
                    Some(point.progress.to_string()),
                    cue,
                    session.point_elapsed,
                )
            });
            Frame {
                target,
                ..Default::default()
            }
        }
        Phase::ResultReview => {
            let result = session.result.unwrap_or_else(CalibrationResult::failed);
            Frame::with_text(CalibrationReport::new(&result).review_lines())
        }
        Phase::Sampling => {
            let result = session.result.unwrap_or_else(CalibrationResult::failed);
            let report = CalibrationReport::new(&result);
            let mut frame = Frame::with_text(report.sampling_lines(result.is_success()));
            if result.is_success() && !session.sampling_started && polled.gaze.is_none() {
                frame.text.push("Gaze sampling is not running".to_string());
            }
            if let Some(save) = &session.calibration_save {
                frame.text.push(save.line());
            }

            let gaze = polled.gaze.map(|g| (g.gaze_x, g.gaze_y));
            frame.gaze_cursor = gaze;

            if let Some(target) = session.validation.as_ref().and_then(ValidationTracker::current) {
                let center = (target.x as f32, target.y as f32);
                frame.target = Some(target_marker(center, None, Some(target.cue), session.point_elapsed));
                frame.error_bar = gaze.map(|to| ErrorBar { from: center, to });
            } else if let Some(summary) = summary {
                frame.text.extend(summary.lines());
            }
            frame
        }
    }
}
