//! Bevy front end
//!
//! Maps keys to session signals, ticks the controller once per frame and turns
//! the resulting [`Frame`] into gizmos, text, a preview sprite and a beep.
//! Window, font and audio resources belong to Bevy's plugins and live exactly
//! as long as the app.

pub mod state;

use bevy::audio::Pitch;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::render::{
    render_asset::RenderAssetUsages,
    render_resource::{Extent3d, TextureDimension, TextureFormat},
};
use bevy::window::{MonitorSelection, PrimaryWindow, WindowCloseRequested, WindowMode};
use std::time::Duration;
use tracing::info;

use self::state::{
    ActiveSession, CurrentFrame, FeedbackTone, GuidanceText, PendingSignals, PreviewSprite,
    PreviewTexture, SessionScreen, TargetLabel,
};
use crate::engine::{DynEngine, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::frame::{Rgb, BLACK, BLUE, GAZE_CURSOR_RADIUS, GREEN, RED, TARGET_RADIUS, WHITE};
use crate::session::{Cue, SessionController, Signal};

const GUIDANCE_FONT_SIZE: f32 = 20.0;
const TONE_FREQUENCY_HZ: f32 = 880.0;
const TONE_LENGTH: Duration = Duration::from_millis(90);
const ARROW_GAP: f32 = 12.0;
const ARROW_LENGTH: f32 = 60.0;

#[inline]
fn color(rgb: Rgb) -> Color {
    Color::srgb_u8(rgb[0], rgb[1], rgb[2])
}

/// Map a session pixel position (origin top-left, y down) into the 2D world
/// of a window of `window` logical size (origin centre, y up)
pub fn to_world(point: (f32, f32), screen: (u32, u32), window: Vec2) -> Vec2 {
    Vec2::new(
        (point.0 / screen.0 as f32 - 0.5) * window.x,
        (0.5 - point.1 / screen.1 as f32) * window.y,
    )
}

/// System set for the per-frame session pipeline
#[derive(Debug, Hash, PartialEq, Eq, Clone, SystemSet)]
pub struct SessionSystemSet;

/// Registers the session pipeline; expects [`ActiveSession`] and [`SessionScreen`]
pub struct CalibrationUiPlugin;

impl Plugin for CalibrationUiPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(color(WHITE)))
            .init_resource::<PendingSignals>()
            .init_resource::<CurrentFrame>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    collect_signals,
                    advance_session,
                    play_cues,
                    draw_frame,
                    sync_text,
                    sync_preview,
                    exit_when_terminated,
                )
                    .chain()
                    .in_set(SessionSystemSet),
            );
    }
}

/// Build the Bevy app that shows `controller` on screen
pub fn build_app(
    controller: SessionController<DynEngine>,
    screen: (u32, u32),
    fullscreen: bool,
) -> App {
    let mode = if fullscreen {
        WindowMode::BorderlessFullscreen(MonitorSelection::Primary)
    } else {
        WindowMode::Windowed
    };

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Eye Tracking Calibration".into(),
                    resolution: (screen.0 as f32, screen.1 as f32).into(),
                    mode,
                    resizable: false,
                    ..default()
                }),
                // Closing the window is an abort signal; the session decides when to exit.
                close_when_requested: false,
                ..default()
            })
            // The binary installs its own tracing subscriber.
            .disable::<LogPlugin>(),
    )
    .insert_resource(ActiveSession(controller))
    .insert_resource(SessionScreen {
        width: screen.0,
        height: screen.1,
    })
    .add_plugins(CalibrationUiPlugin);
    app
}

fn setup_scene(
    mut commands: Commands,
    mut images: ResMut<Assets<Image>>,
    mut pitches: ResMut<Assets<Pitch>>,
) {
    commands.spawn(Camera2d);

    let preview = images.add(Image::new_fill(
        Extent3d {
            width: PREVIEW_WIDTH,
            height: PREVIEW_HEIGHT,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 255],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    ));
    commands.spawn((
        Sprite::from_image(preview.clone()),
        Transform::from_xyz(0.0, 0.0, 0.0),
        Visibility::Hidden,
        PreviewSprite,
    ));
    commands.insert_resource(PreviewTexture(preview));

    commands.spawn((
        Text2d::new(""),
        TextFont {
            font_size: GUIDANCE_FONT_SIZE,
            ..default()
        },
        TextColor(color(BLACK)),
        TextLayout::new_with_justify(JustifyText::Center),
        Transform::from_xyz(0.0, 0.0, 2.0),
        GuidanceText,
    ));

    commands.spawn((
        Text2d::new(""),
        TextFont {
            font_size: GUIDANCE_FONT_SIZE,
            ..default()
        },
        TextColor(color(WHITE)),
        Transform::from_xyz(0.0, 0.0, 3.0),
        Visibility::Hidden,
        TargetLabel,
    ));

    commands.insert_resource(FeedbackTone(
        pitches.add(Pitch::new(TONE_FREQUENCY_HZ, TONE_LENGTH)),
    ));
    info!("✅ Calibration scene ready");
}

fn collect_signals(
    keys: Res<ButtonInput<KeyCode>>,
    mut close_requests: EventReader<WindowCloseRequested>,
    mut pending: ResMut<PendingSignals>,
) {
    if keys.just_pressed(KeyCode::Escape) || close_requests.read().next().is_some() {
        pending.0.push(Signal::Abort);
    }
    if keys.just_pressed(KeyCode::Space) {
        pending.0.push(Signal::Continue);
    }
    if keys.any_just_pressed([KeyCode::Enter, KeyCode::NumpadEnter]) {
        pending.0.push(Signal::Accept);
    }
    if keys.just_pressed(KeyCode::KeyR) {
        pending.0.push(Signal::Retry);
    }
}

fn advance_session(
    time: Res<Time>,
    mut session: ResMut<ActiveSession>,
    mut pending: ResMut<PendingSignals>,
    mut current: ResMut<CurrentFrame>,
) {
    let signals = std::mem::take(&mut pending.0);
    let tick = session.0.tick(&signals, time.delta());
    current.frame = tick.frame;
    current.cues = tick.cues;
}

fn play_cues(mut commands: Commands, mut current: ResMut<CurrentFrame>, tone: Res<FeedbackTone>) {
    for _ in current.cues.drain(..) {
        commands.spawn((AudioPlayer::<Pitch>(tone.0.clone()), PlaybackSettings::DESPAWN));
    }
}

fn draw_frame(
    mut gizmos: Gizmos,
    mut clear_color: ResMut<ClearColor>,
    current: Res<CurrentFrame>,
    screen: Res<SessionScreen>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let frame = &current.frame;
    let size = Vec2::new(window.width(), window.height());
    let screen = (screen.width, screen.height);
    clear_color.0 = color(frame.background);

    if let Some(target) = &frame.target {
        let center = to_world(target.center, screen, size);
        if let Some(radius) = target.pulse_radius {
            gizmos.circle_2d(Isometry2d::from_translation(center), radius, color(RED));
        }
        // Concentric rings read as a solid dot at calibration distance.
        let mut radius = TARGET_RADIUS;
        while radius > 1.0 {
            gizmos.circle_2d(Isometry2d::from_translation(center), radius, color(BLUE));
            radius -= 2.0;
        }
        if let Some(cue) = target.cue {
            let direction = match cue {
                Cue::Left => Vec2::NEG_X,
                Cue::Right => Vec2::X,
            };
            let start = center + direction * (TARGET_RADIUS + ARROW_GAP);
            gizmos.arrow_2d(start, start + direction * ARROW_LENGTH, color(BLACK));
        }
    }

    if let Some(bar) = frame.error_bar {
        let from = to_world(bar.from, screen, size);
        let to = to_world(bar.to, screen, size);
        gizmos.line_2d(from, to, color(GREEN));
        gizmos.circle_2d(Isometry2d::from_translation(to), GAZE_CURSOR_RADIUS, color(RED));
    } else if let Some(gaze) = frame.gaze_cursor {
        let at = to_world(gaze, screen, size);
        gizmos.circle_2d(Isometry2d::from_translation(at), GAZE_CURSOR_RADIUS, color(BLUE));
    }
}

fn sync_text(
    current: Res<CurrentFrame>,
    screen: Res<SessionScreen>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut guidance: Query<(&mut Text2d, &mut Transform), (With<GuidanceText>, Without<TargetLabel>)>,
    mut labels: Query<
        (&mut Text2d, &mut Transform, &mut Visibility),
        (With<TargetLabel>, Without<GuidanceText>),
    >,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let size = Vec2::new(window.width(), window.height());
    let frame = &current.frame;

    if let Ok((mut text, mut transform)) = guidance.single_mut() {
        let joined = frame.text.join("\n");
        if text.0 != joined {
            text.0 = joined;
        }
        // Keep instructions clear of the camera preview.
        let y = if frame.preview.is_some() {
            -(PREVIEW_HEIGHT as f32) / 2.0 - 40.0
        } else {
            0.0
        };
        transform.translation.y = y;
    }

    if let Ok((mut text, mut transform, mut visibility)) = labels.single_mut() {
        match frame.target.as_ref().and_then(|t| t.label.as_ref().map(|l| (t, l))) {
            Some((target, label)) => {
                let at = to_world(target.center, (screen.width, screen.height), size);
                if &text.0 != label {
                    text.0 = label.clone();
                }
                transform.translation.x = at.x;
                transform.translation.y = at.y;
                *visibility = Visibility::Visible;
            }
            None => *visibility = Visibility::Hidden,
        }
    }
}

fn sync_preview(
    current: Res<CurrentFrame>,
    texture: Res<PreviewTexture>,
    mut images: ResMut<Assets<Image>>,
    mut sprites: Query<&mut Visibility, With<PreviewSprite>>,
) {
    let Ok(mut visibility) = sprites.single_mut() else {
        return;
    };
    match &current.frame.preview {
        Some(preview) => {
            let image = Image::new(
                Extent3d {
                    width: preview.width,
                    height: preview.height,
                    depth_or_array_layers: 1,
                },
                TextureDimension::D2,
                preview.to_rgba(),
                TextureFormat::Rgba8UnormSrgb,
                RenderAssetUsages::default(),
            );
            images.insert(&texture.0, image);
            *visibility = Visibility::Visible;
        }
        None => *visibility = Visibility::Hidden,
    }
}

fn exit_when_terminated(session: Res<ActiveSession>, mut exit: EventWriter<AppExit>) {
    if session.0.is_terminated() {
        info!("Session terminated, closing the window");
        exit.write(AppExit::Success);
    }
}
