//! Engine selection and bring-up
//!
//! Opens the configured engine and runs the fixed start-up sequence:
//! initialise, register the license, describe the screen, pick the calibration
//! mode. A rejected license stops start-up; nothing else is fatal here.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::engine::native::default_library_path;
use crate::engine::{
    BackgroundSampler, DynEngine, NativeEngine, SimulatedEngine, SimulationScript, TrackingEngine,
};
use crate::session::sequencer::to_pixels;
use crate::store::CalibrationStore;

/// Facts reported by the engine after a successful bring-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub version: String,
    pub license_days: u32,
}

/// Which engine implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind<'a> {
    Native(Option<&'a Path>),
    Simulated,
}

/// Simulation script that visits the configured calibration targets
pub fn simulation_script(config: &AppConfig) -> SimulationScript {
    let mut script = SimulationScript::default();
    let screen = config.screen.size();
    let targets: Vec<(f32, f32)> = config
        .calibration_points()
        .into_iter()
        .map(|point| {
            let (x, y) = to_pixels(point, screen);
            (x as f32, y as f32)
        })
        .collect();
    if !targets.is_empty() {
        script.targets = targets;
    }
    script
}

/// Open the engine selected by `kind`, wrapped for background polling if configured
pub fn open_engine(config: &AppConfig, kind: EngineKind<'_>) -> Result<DynEngine> {
    let engine: DynEngine = match kind {
        EngineKind::Simulated => {
            info!("Using the simulated tracking engine");
            Box::new(SimulatedEngine::new(simulation_script(config)))
        }
        EngineKind::Native(override_path) => {
            let path = override_path
                .map(Path::to_path_buf)
                .or_else(|| config.engine.library_path.clone())
                .unwrap_or_else(default_library_path);
            Box::new(NativeEngine::load(&path).context("Tracking library unavailable")?)
        }
    };

    if config.engine.background_polling {
        Ok(Box::new(BackgroundSampler::new(
            engine,
            config.engine.poll_interval(),
        )))
    } else {
        Ok(engine)
    }
}

/// Run the start-up sequence against `engine`
pub fn bring_up<E: TrackingEngine + ?Sized>(
    engine: &mut E,
    config: &AppConfig,
) -> Result<EngineStatus> {
    info!("🔍 Initialising eye tracking...");
    engine
        .init(&config.engine.init_params())
        .context("Eye tracking initialisation failed")?;

    info!("Starting eye tracking registration process...");
    let license_days = engine
        .register(&config.engine.license_key)
        .context("Registration failed, the license has expired or is invalid")?;
    info!("✅ Registration successful! License valid for {} days.", license_days);

    engine
        .configure(&config.screen.setup())
        .context("Camera and screen setup was refused by the engine")?;

    let mode = config.engine.calibration_mode()?;
    engine
        .set_calibration_mode(mode)
        .context("Calibration mode was refused by the engine")?;

    if let Some(region) = config.engine.tracking_region {
        if let Err(e) = engine.set_tracking_region(region) {
            warn!("Tracking region {:?} was refused: {}", region, e);
        }
    }

    let version = engine.version().unwrap_or_else(|e| {
        warn!("Engine version unavailable: {}", e);
        "unknown".to_string()
    });
    info!("✅ Eye tracking engine {} ready ({}-point calibration)", version, mode.points());

    Ok(EngineStatus {
        version,
        license_days,
    })
}

/// Load a previously exported calibration into a brought-up engine.
///
/// The session then starts from that calibration; it stays loaded until a new
/// calibration attempt replaces it.
pub fn import_calibration<E: TrackingEngine + ?Sized>(engine: &mut E, file: &Path) -> Result<()> {
    let blob = CalibrationStore::new(file)
        .load()
        .with_context(|| format!("Cannot import calibration from {:?}", file))?;
    engine
        .load_calibration(&blob)
        .context("Engine refused the calibration")?;
    info!("✅ Calibration imported from {:?}", file);
    Ok(())
}
