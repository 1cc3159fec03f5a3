//! Tests for the session controller state machine

use std::time::Duration;

use gazecal::config::AppConfig;
use gazecal::engine::{CalibrationMode, CalibrationResult, SimulatedEngine, TrackingEngine};
use gazecal::frame::FeedbackCue;
use gazecal::session::{CalibrationSave, Cue, Phase, SessionController, SessionOptions, Signal};
use gazecal::startup::simulation_script;
use gazecal::store::CalibrationStore;

use crate::test_utils::{
    constants, controller, create_temp_dir, grid_options, run_until, start_calibrating, success,
    tick, ScriptedEngine,
};

fn cue_count(ticks: &[gazecal::Tick]) -> usize {
    ticks.iter().map(|t| t.cues.len()).sum()
}

/// Drive a controller through calibration and into result review
fn reviewed(engine: ScriptedEngine) -> SessionController<ScriptedEngine> {
    let mut controller = controller(engine);
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);
    controller
}

#[test]
fn test_first_tick_starts_preview() {
    let mut controller = controller(ScriptedEngine::two_targets());
    assert_eq!(controller.phase(), Phase::Idle);
    assert!(controller.session().is_running());

    let t = tick(&mut controller, &[]);
    assert_eq!(t.transition, Some((Phase::Idle, Phase::Previewing)));
    assert!(controller.engine().called("start_preview"));
    assert!(t.frame.preview.is_some());
    assert!(t.frame.text.iter().any(|line| line.contains("Space")));
}

#[test]
fn test_first_tick_ignores_queued_continue() {
    let mut controller = controller(ScriptedEngine::two_targets());

    let t = tick(&mut controller, &[Signal::Continue, Signal::Continue]);
    assert_eq!(t.transition, Some((Phase::Idle, Phase::Previewing)));
    assert!(t.frame.preview.is_some());
    assert!(!controller.engine().called("stop_preview"));

    let t = tick(&mut controller, &[Signal::Continue]);
    assert_eq!(t.transition, Some((Phase::Previewing, Phase::AwaitingStart)));
}

#[test]
fn test_first_tick_honours_abort() {
    let mut controller = controller(ScriptedEngine::two_targets());
    let t = tick(&mut controller, &[Signal::Continue, Signal::Abort]);
    assert_eq!(t.transition, Some((Phase::Idle, Phase::Terminated)));
    assert_eq!(controller.engine().count("stop_preview"), 1);
}

#[test]
fn test_continue_walks_to_calibration() {
    let mut controller = controller(ScriptedEngine::two_targets());
    tick(&mut controller, &[]);

    let t = tick(&mut controller, &[Signal::Continue]);
    assert_eq!(t.transition, Some((Phase::Previewing, Phase::AwaitingStart)));
    assert!(controller.engine().called("stop_preview"));
    assert!(t.frame.preview.is_none());
    assert!(t
        .frame
        .text
        .iter()
        .any(|line| line.contains("keep looking at the blue dot")));

    let t = tick(&mut controller, &[Signal::Continue]);
    assert_eq!(t.transition, Some((Phase::AwaitingStart, Phase::Calibrating)));
    assert_eq!(controller.session().attempts(), 1);
    assert_eq!(controller.engine().count("start_calibration"), 1);
}

#[test]
fn test_unrelated_signals_are_ignored() {
    let mut controller = controller(ScriptedEngine::two_targets());
    tick(&mut controller, &[]);

    let t = tick(&mut controller, &[Signal::Accept, Signal::Retry]);
    assert_eq!(t.transition, None);
    assert_eq!(controller.phase(), Phase::Previewing);
}

#[test]
fn test_one_transition_per_tick() {
    let mut controller = controller(ScriptedEngine::two_targets());
    tick(&mut controller, &[]);

    // The second Continue arrives in the same frame and must not skip AwaitingStart.
    tick(&mut controller, &[Signal::Continue, Signal::Continue]);
    assert_eq!(controller.phase(), Phase::AwaitingStart);
}

#[test]
fn test_cue_fires_once_per_distinct_point() {
    let mut controller = controller(ScriptedEngine::two_targets());
    let start = start_calibrating(&mut controller);
    assert_eq!(start.cues, vec![FeedbackCue::TargetChanged]);

    let mut ticks = run_until(&mut controller, Phase::ResultReview, 50);
    ticks.insert(0, start);

    // Five polls over two distinct positions.
    assert_eq!(cue_count(&ticks), 2);
    assert_eq!(controller.session().distinct_points(), 2);
}

/// Calibrate once, returning the cue drawn on each target as it appears
fn shown_cues<E: TrackingEngine>(controller: &mut SessionController<E>) -> Vec<Cue> {
    let start = start_calibrating(controller);
    let mut ticks = run_until(controller, Phase::ResultReview, 2_000);
    ticks.insert(0, start);
    ticks
        .iter()
        .filter(|t| !t.cues.is_empty())
        .filter_map(|t| t.frame.target.as_ref().and_then(|target| target.cue))
        .collect()
}

fn split(cues: &[Cue]) -> (usize, usize) {
    let lefts = cues.iter().filter(|c| **c == Cue::Left).count();
    (lefts, cues.len() - lefts)
}

#[test]
fn test_shown_targets_split_cues_evenly() {
    let points = CalibrationMode::Five.default_targets();
    // Each target is polled twice so the last one is drawn before calibration ends.
    let script: Vec<(f32, f32, i32)> = points
        .iter()
        .flat_map(|&(x, y)| {
            let (x, y) = ((x * 1920.0) as f32, (y * 1080.0) as f32);
            [(x, y, 50), (x, y, 100)]
        })
        .collect();
    let options = SessionOptions {
        calibration_points: points,
        ..grid_options()
    };
    let engine = ScriptedEngine::new(&script, success(0.3));
    let mut controller = SessionController::new(engine, options).expect("valid options");

    let cues = shown_cues(&mut controller);
    assert_eq!(cues.len(), 5);
    assert_eq!(split(&cues), (2, 3));
    assert_eq!(controller.session().calibration_targets().cues(), cues);
}

#[test]
fn test_configured_modes_split_cues_evenly() {
    for mode in [5u32, 9, 13] {
        let mut config = AppConfig::default();
        config.engine.calibration_mode = mode;
        config.validate().expect("mode with its default targets is valid");

        let engine = SimulatedEngine::new(simulation_script(&config));
        let mut controller =
            SessionController::new(engine, config.session_options()).expect("valid options");

        let cues = shown_cues(&mut controller);
        let n = mode as usize;
        assert_eq!(cues.len(), n, "targets shown in mode {}", mode);
        assert_eq!(split(&cues), (n / 2, n - n / 2), "cue split in mode {}", mode);
    }
}

#[test]
fn test_progress_label_follows_engine() {
    let mut controller = controller(ScriptedEngine::two_targets());
    let start = start_calibrating(&mut controller);
    let target = start.frame.target.expect("target is drawn while calibrating");
    assert_eq!(target.center, (192.0, 108.0));
    assert_eq!(target.label.as_deref(), Some("0"));

    let next = tick(&mut controller, &[]);
    let target = next.frame.target.expect("target is drawn while calibrating");
    assert_eq!(target.label.as_deref(), Some("50"));
    assert!(next.cues.is_empty());
}

#[test]
fn test_target_cue_comes_from_calibration_sequence() {
    let mut controller = controller(ScriptedEngine::two_targets());
    let start = start_calibrating(&mut controller);
    let expected = controller
        .session()
        .calibration_targets()
        .get(0)
        .map(|t| t.cue);
    assert_eq!(start.frame.target.and_then(|t| t.cue), expected);
}

#[test]
fn test_result_review_entered_once_per_attempt() {
    let mut controller = controller(ScriptedEngine::two_targets());
    let mut ticks = vec![start_calibrating(&mut controller)];
    ticks.extend(run_until(&mut controller, Phase::ResultReview, 50));
    for _ in 0..10 {
        ticks.push(tick(&mut controller, &[]));
    }

    let entries = ticks
        .iter()
        .filter(|t| matches!(t.transition, Some((_, Phase::ResultReview))))
        .count();
    assert_eq!(entries, 1);
    assert_eq!(controller.engine().count("calibration_result"), 1);
    assert_eq!(controller.session().result(), Some(&success(0.42)));
}

#[test]
fn test_review_shows_metrics_and_prompt() {
    let mut controller = reviewed(ScriptedEngine::two_targets());
    let t = tick(&mut controller, &[]);
    let text = t.frame.text.join("\n");
    assert!(text.contains("Calibration succeeded"));
    assert!(text.contains("Fitting error: 0.4200 px"));
    assert!(text.contains("Samples used: 240"));
    assert!(text.contains("\"R\" to recalibrate"));
}

#[test]
fn test_retry_restarts_calibration() {
    let mut controller = reviewed(ScriptedEngine::two_targets());

    let t = tick(&mut controller, &[Signal::Retry]);
    assert_eq!(t.transition, Some((Phase::ResultReview, Phase::Calibrating)));
    assert_eq!(controller.session().attempts(), 2);
    assert_eq!(controller.engine().count("start_calibration"), 2);
    assert!(controller.session().result().is_none());

    // The first point of the new attempt cues even though it repeats the old one.
    assert_eq!(t.cues, vec![FeedbackCue::TargetChanged]);
    let ticks = run_until(&mut controller, Phase::ResultReview, 50);
    assert_eq!(cue_count(&ticks), 1);
}

#[test]
fn test_accept_after_success_starts_sampling() {
    let mut controller = reviewed(ScriptedEngine::two_targets());

    let t = tick(&mut controller, &[Signal::Accept]);
    assert_eq!(t.transition, Some((Phase::ResultReview, Phase::Sampling)));
    assert!(controller.session().sampling_started());
    assert!(controller.engine().called("start_sampling"));
    assert_eq!(t.frame.gaze_cursor, Some((960.0, 540.0)));

    let t = tick(&mut controller, &[Signal::Continue]);
    assert_eq!(t.transition, Some((Phase::Sampling, Phase::Terminated)));
    assert!(controller.engine().called("stop_sampling"));
    assert!(!controller.session().is_running());
}

#[test]
fn test_accept_after_failure_skips_sampling() {
    let failed = CalibrationResult {
        status: 0,
        fitting_error: 87.0,
        sample_size: 3,
    };
    let mut engine = ScriptedEngine::two_targets();
    engine.result = failed;
    let mut controller = reviewed(engine);

    let review = tick(&mut controller, &[]);
    assert!(review.frame.text[0].contains("Calibration failed"));

    let t = tick(&mut controller, &[Signal::Accept]);
    assert_eq!(controller.phase(), Phase::Sampling);
    assert!(!controller.engine().called("start_sampling"));
    assert!(t.frame.gaze_cursor.is_none());
    assert!(t
        .frame
        .text
        .iter()
        .any(|line| line.contains("without a valid calibration")));

    tick(&mut controller, &[Signal::Continue]);
    assert_eq!(controller.phase(), Phase::Terminated);
    assert!(!controller.engine().called("stop_sampling"));
}

#[test]
fn test_unavailable_fitting_error_is_not_printed_as_number() {
    let mut engine = ScriptedEngine::two_targets();
    engine.result = CalibrationResult {
        status: 1,
        fitting_error: -1.0,
        sample_size: 12,
    };
    let mut controller = reviewed(engine);
    let t = tick(&mut controller, &[]);
    let text = t.frame.text.join("\n");
    assert!(text.contains("unavailable"));
    assert!(!text.contains("-1"));
}

#[test]
fn test_start_failure_reports_failed_result() {
    let mut engine = ScriptedEngine::two_targets();
    engine.fail_start_calibration = true;
    let mut controller = controller(engine);

    let t = start_calibrating(&mut controller);
    assert_eq!(t.transition, Some((Phase::AwaitingStart, Phase::ResultReview)));
    assert_eq!(controller.session().result(), Some(&CalibrationResult::failed()));
    assert!(t.cues.is_empty());
}

#[test]
fn test_abort_from_every_phase() {
    let phases = [
        Phase::Idle,
        Phase::Previewing,
        Phase::AwaitingStart,
        Phase::Calibrating,
        Phase::ResultReview,
        Phase::Sampling,
    ];

    for phase in phases {
        let mut controller = controller(ScriptedEngine::two_targets());
        match phase {
            Phase::Idle => {}
            Phase::Previewing => {
                tick(&mut controller, &[]);
            }
            Phase::AwaitingStart => {
                tick(&mut controller, &[]);
                tick(&mut controller, &[Signal::Continue]);
            }
            Phase::Calibrating => {
                start_calibrating(&mut controller);
            }
            Phase::ResultReview => {
                start_calibrating(&mut controller);
                run_until(&mut controller, Phase::ResultReview, 50);
            }
            Phase::Sampling => {
                start_calibrating(&mut controller);
                run_until(&mut controller, Phase::ResultReview, 50);
                tick(&mut controller, &[Signal::Accept]);
            }
            Phase::Terminated => unreachable!(),
        }
        assert_eq!(controller.phase(), phase);

        let t = tick(&mut controller, &[Signal::Abort]);
        assert_eq!(controller.phase(), Phase::Terminated, "abort from {:?}", phase);
        assert!(t.transition.is_some());
        assert!(!controller.session().is_running());

        if phase == Phase::Sampling {
            assert!(controller.engine().called("stop_sampling"));
        }
    }
}

#[test]
fn test_abort_wins_over_other_signals() {
    let mut controller = controller(ScriptedEngine::two_targets());
    tick(&mut controller, &[]);

    tick(&mut controller, &[Signal::Continue, Signal::Abort]);
    assert_eq!(controller.phase(), Phase::Terminated);
    assert_eq!(controller.engine().count("stop_preview"), 1);
}

#[test]
fn test_terminated_is_final() {
    let mut controller = controller(ScriptedEngine::two_targets());
    tick(&mut controller, &[Signal::Abort]);
    assert!(controller.is_terminated());

    let t = tick(&mut controller, &[Signal::Continue]);
    assert_eq!(t.transition, None);
    assert!(t.cues.is_empty());
    assert!(t.frame.text.is_empty());
    assert_eq!(controller.phase(), Phase::Terminated);
}

#[test]
fn test_sampling_end_saves_engine_data() {
    let dir = create_temp_dir();
    let data_path = dir.path().join("session.dat");
    let options = SessionOptions {
        data_path: Some(data_path.clone()),
        ..grid_options()
    };
    let mut controller =
        SessionController::new(ScriptedEngine::two_targets(), options).expect("valid options");
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);
    tick(&mut controller, &[Signal::Accept]);
    tick(&mut controller, &[Signal::Continue]);

    assert_eq!(controller.engine().saved, vec![data_path]);
}

#[test]
fn test_accepted_calibration_is_exported() {
    let dir = create_temp_dir();
    let store = CalibrationStore::new(dir.path().join("calibration.txt"));
    let options = SessionOptions {
        calibration_store: Some(store.clone()),
        ..grid_options()
    };
    let mut controller =
        SessionController::new(ScriptedEngine::two_targets(), options).expect("valid options");
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);
    tick(&mut controller, &[Signal::Accept]);

    assert_eq!(store.load().expect("calibration stored"), "scripted-calibration");
    assert_eq!(
        controller.session().calibration_save(),
        Some(&CalibrationSave::Saved(store.path().to_path_buf()))
    );

    let t = tick(&mut controller, &[]);
    let expected = format!("Calibration saved to {}", store.path().display());
    assert!(t.frame.text.contains(&expected));
}

#[test]
fn test_failed_export_is_shown_while_sampling() {
    let dir = create_temp_dir();
    let store = CalibrationStore::new(dir.path().join("calibration.txt"));
    let options = SessionOptions {
        calibration_store: Some(store.clone()),
        ..grid_options()
    };
    let mut engine = ScriptedEngine::two_targets();
    engine.export_blob = None;
    let mut controller = SessionController::new(engine, options).expect("valid options");
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);

    let t = tick(&mut controller, &[Signal::Accept]);
    assert_eq!(controller.phase(), Phase::Sampling);
    assert!(!store.exists());
    assert!(t
        .frame
        .text
        .iter()
        .any(|line| line.starts_with("Calibration could not be saved")));
}

#[test]
fn test_no_save_line_without_store() {
    let mut controller = reviewed(ScriptedEngine::two_targets());
    let t = tick(&mut controller, &[Signal::Accept]);
    assert!(controller.session().calibration_save().is_none());
    assert!(!t.frame.text.iter().any(|line| line.contains("saved")));
}

#[test]
fn test_continue_kept_in_sampling_when_disabled() {
    let options = SessionOptions {
        continue_ends_sampling: false,
        ..grid_options()
    };
    let mut controller =
        SessionController::new(ScriptedEngine::two_targets(), options).expect("valid options");
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);
    tick(&mut controller, &[Signal::Accept]);

    tick(&mut controller, &[Signal::Continue]);
    assert_eq!(controller.phase(), Phase::Sampling);
    tick(&mut controller, &[Signal::Abort]);
    assert_eq!(controller.phase(), Phase::Terminated);
}

#[test]
fn test_validation_measures_gaze_error() {
    let options = SessionOptions {
        screen: constants::SCREEN,
        calibration_points: constants::GRID_3X3.to_vec(),
        validation_points: vec![(0.5, 0.5), (0.25, 0.5)],
        validation_dwell: Duration::from_millis(160),
        ..Default::default()
    };
    let mut controller =
        SessionController::new(ScriptedEngine::two_targets(), options).expect("valid options");
    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 50);

    let accept = tick(&mut controller, &[Signal::Accept]);
    assert!(accept.frame.target.is_some());
    assert!(accept.frame.error_bar.is_some());
    let mut cues = accept.cues.len();

    for _ in 0..100 {
        if controller.validation_summary().is_some() {
            break;
        }
        cues += tick(&mut controller, &[]).cues.len();
    }

    let summary = controller.validation_summary().expect("validation finished");
    assert_eq!(cues, 2);
    assert_eq!(summary.targets.len(), 2);
    assert_eq!(summary.targets[0].mean_error_px, Some(0.0));
    assert_eq!(summary.targets[0].samples, 10);
    assert_eq!(summary.targets[1].mean_error_px, Some(480.0));
    assert_eq!(summary.overall_mean_px, Some(240.0));

    let t = tick(&mut controller, &[]);
    assert!(t.frame.target.is_none());
    assert!(t
        .frame
        .text
        .iter()
        .any(|line| line.starts_with("Validation mean error")));
}
