//! Display surfaces and the frame loop that drives a session through them

use instant::Instant;
use std::time::Duration;
use tracing::{debug, info};

use crate::engine::TrackingEngine;
use crate::frame::{FeedbackCue, Frame};
use crate::session::{SessionController, Signal};

/// Window, keyboard and speaker the session is shown on.
///
/// Surfaces own their windowing, font and audio resources for their whole
/// lifetime; the controller never touches them directly.
pub trait DisplaySurface {
    /// Collect the signals issued since the previous call, without blocking
    fn drain_signals(&mut self) -> Vec<Signal>;

    fn present(&mut self, frame: &Frame);

    fn play_cue(&mut self, cue: FeedbackCue);
}

/// Timing of the frame loop
#[derive(Debug, Clone, Copy)]
pub struct FramePacing {
    pub interval: Duration,
    /// Sleep to hold `interval` and measure real frame times; otherwise every
    /// frame advances the session clock by exactly `interval`
    pub realtime: bool,
    /// Abort the session after this many frames
    pub max_frames: Option<u64>,
}

impl Default for FramePacing {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(16),
            realtime: true,
            max_frames: None,
        }
    }
}

impl FramePacing {
    /// Fixed-step pacing that never sleeps
    pub fn stepped(interval: Duration, max_frames: u64) -> Self {
        Self {
            interval,
            realtime: false,
            max_frames: Some(max_frames),
        }
    }
}

/// Drive `controller` until it terminates, returning the number of frames run.
///
/// Each iteration drains input, ticks the controller, plays the cues it
/// produced and presents the frame.
pub fn run_session<E, S>(
    controller: &mut SessionController<E>,
    surface: &mut S,
    pacing: FramePacing,
) -> u64
where
    E: TrackingEngine,
    S: DisplaySurface,
{
    let mut frames = 0u64;
    let mut last = Instant::now();

    while !controller.is_terminated() {
        let frame_start = Instant::now();
        let dt = if pacing.realtime {
            frame_start.duration_since(last)
        } else {
            pacing.interval
        };
        last = frame_start;

        let mut signals = surface.drain_signals();
        if pacing.max_frames.is_some_and(|max| frames >= max) {
            info!("Frame limit reached, aborting session");
            signals.push(Signal::Abort);
        }

        let tick = controller.tick(&signals, dt);
        for cue in &tick.cues {
            surface.play_cue(*cue);
        }
        surface.present(&tick.frame);
        if let Some((from, to)) = tick.transition {
            debug!("Frame {}: {:?} -> {:?}", frames, from, to);
        }
        frames += 1;

        if pacing.realtime {
            if let Some(rest) = pacing.interval.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    info!("Session finished after {} frames", frames);
    frames
}

/// Headless surface that walks through the workflow by itself.
///
/// Once the same text has been on screen for `frames_per_screen` frames with
/// no target visible it issues `Continue` and `Accept`; the controller applies
/// whichever one the current phase understands.
#[derive(Debug, Clone)]
pub struct AutopilotSurface {
    frames_per_screen: u32,
    unchanged_frames: u32,
    last_text: Vec<String>,
    target_visible: bool,
    presented: u64,
    cues_played: u64,
}

impl AutopilotSurface {
    pub fn new(frames_per_screen: u32) -> Self {
        Self {
            frames_per_screen: frames_per_screen.max(1),
            unchanged_frames: 0,
            last_text: Vec::new(),
            target_visible: false,
            presented: 0,
            cues_played: 0,
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn cues_played(&self) -> u64 {
        self.cues_played
    }
}

impl DisplaySurface for AutopilotSurface {
    fn drain_signals(&mut self) -> Vec<Signal> {
        if self.target_visible
            || self.last_text.is_empty()
            || self.unchanged_frames < self.frames_per_screen
        {
            return Vec::new();
        }
        self.unchanged_frames = 0;
        vec![Signal::Continue, Signal::Accept]
    }

    fn present(&mut self, frame: &Frame) {
        self.presented += 1;
        self.target_visible = frame.target.is_some();
        if frame.text == self.last_text {
            self.unchanged_frames += 1;
        } else {
            for line in &frame.text {
                info!("[screen] {}", line);
            }
            self.last_text = frame.text.clone();
            self.unchanged_frames = 1;
        }
    }

    fn play_cue(&mut self, cue: FeedbackCue) {
        self.cues_played += 1;
        debug!("[cue] {:?}", cue);
    }
}
