use bevy::audio::Pitch;
use bevy::prelude::*;

use crate::engine::DynEngine;
use crate::frame::{FeedbackCue, Frame};
use crate::session::{SessionController, Signal};

/// The running session, ticked once per Bevy frame
#[derive(Resource)]
pub struct ActiveSession(pub SessionController<DynEngine>);

/// Signals collected from the keyboard and window since the last tick
#[derive(Debug, Default, Resource)]
pub struct PendingSignals(pub Vec<Signal>);

/// Output of the latest tick, waiting to be drawn
#[derive(Debug, Default, Resource)]
pub struct CurrentFrame {
    pub frame: Frame,
    pub cues: Vec<FeedbackCue>,
}

/// Pixel size of the screen the session coordinates refer to
#[derive(Debug, Clone, Copy, Resource)]
pub struct SessionScreen {
    pub width: u32,
    pub height: u32,
}

/// Texture the camera preview is uploaded into
#[derive(Resource)]
pub struct PreviewTexture(pub Handle<Image>);

/// Synthesized beep played on every new target
#[derive(Resource)]
pub struct FeedbackTone(pub Handle<Pitch>);

#[derive(Component)]
pub struct GuidanceText;

#[derive(Component)]
pub struct TargetLabel;

#[derive(Component)]
pub struct PreviewSprite;
