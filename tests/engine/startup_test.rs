//! Tests for engine selection and the start-up sequence

use gazecal::config::AppConfig;
use gazecal::engine::{SimulatedEngine, SimulationScript, TrackingEngine, TrackingRegion};
use gazecal::error::EngineError;
use gazecal::session::{Phase, SessionController, Signal};
use gazecal::startup::{bring_up, import_calibration, open_engine, simulation_script, EngineKind};
use gazecal::store::CalibrationStore;

use crate::test_utils::{create_temp_dir, run_until, start_calibrating, tick, ScriptedEngine};

#[test]
fn test_bring_up_reports_status() {
    let mut engine = SimulatedEngine::default();
    let status = bring_up(&mut engine, &AppConfig::default()).expect("bring-up succeeds");
    assert_eq!(status.license_days, 365);
    assert!(status.version.starts_with("simulated-"));
}

#[test]
fn test_bring_up_call_order() {
    let mut config = AppConfig::default();
    config.engine.tracking_region = Some(TrackingRegion {
        x: 0,
        y: 0,
        width: 640,
        height: 480,
    });
    let mut engine = ScriptedEngine::two_targets();
    bring_up(&mut engine, &config).expect("bring-up succeeds");
    assert_eq!(
        engine.calls,
        vec![
            "init",
            "register",
            "configure",
            "set_calibration_mode",
            "set_tracking_region"
        ]
    );
}

#[test]
fn test_rejected_license_is_fatal() {
    let mut engine = SimulatedEngine::new(SimulationScript {
        license_days: -5,
        ..Default::default()
    });
    let err = bring_up(&mut engine, &AppConfig::default()).expect_err("license is rejected");
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::LicenseRejected { days: -5 })
    ));
}

#[test]
fn test_simulation_follows_configured_targets() {
    let config = AppConfig::default();
    let script = simulation_script(&config);
    assert_eq!(script.targets.len(), config.calibration_points().len());
    assert_eq!(script.targets[4], (960.0, 540.0));
}

#[test]
fn test_open_simulated_engine_with_background_polling() {
    let mut config = AppConfig::default();
    config.engine.background_polling = true;
    let mut engine = open_engine(&config, EngineKind::Simulated).expect("simulated engine opens");
    bring_up(&mut engine, &config).expect("bring-up succeeds");
    engine.start_sampling().expect("sampling starts");
    engine.stop_sampling().expect("sampling stops");
}

#[test]
fn test_missing_native_library_fails() {
    let dir = crate::test_utils::create_temp_dir();
    let missing = dir.path().join("libmissing-tracker.so");
    let result = open_engine(&AppConfig::default(), EngineKind::Native(Some(missing.as_path())));
    assert!(result.is_err());
}

#[test]
fn test_imported_calibration_reaches_session_engine() {
    let dir = create_temp_dir();
    let file = dir.path().join("saved.cal");
    CalibrationStore::new(&file)
        .save("simulated-calibration;imported")
        .expect("calibration file written");

    let config = AppConfig::default();
    let mut engine = SimulatedEngine::new(simulation_script(&config));
    bring_up(&mut engine, &config).expect("bring-up succeeds");
    import_calibration(&mut engine, &file).expect("import succeeds");

    let mut controller =
        SessionController::new(engine, config.session_options()).expect("valid options");
    assert_eq!(
        controller.engine().loaded_calibration(),
        Some("simulated-calibration;imported")
    );

    // The imported calibration is what the session would export until recalibrated.
    tick(&mut controller, &[]);
    assert_eq!(
        controller.engine_mut().export_calibration().expect("export"),
        "simulated-calibration;imported"
    );

    start_calibrating(&mut controller);
    run_until(&mut controller, Phase::ResultReview, 2_000);
    tick(&mut controller, &[Signal::Accept]);
    assert!(controller.engine().loaded_calibration().is_none());
}

#[test]
fn test_import_of_missing_file_fails() {
    let dir = create_temp_dir();
    let mut engine = SimulatedEngine::default();
    let result = import_calibration(&mut engine, &dir.path().join("absent.cal"));
    crate::assert_error_contains!(result, "absent.cal");
    assert!(engine.loaded_calibration().is_none());
}
