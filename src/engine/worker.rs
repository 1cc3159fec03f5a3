//! Background gaze polling.
//!
//! When the engine's sample query may block, polling moves to a worker thread
//! and the UI thread reads the most recent sample from a single-slot mailbox.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    CalibrationMode, CalibrationPoint, CalibrationResult, GazeSample, InitParams, PreviewFrame,
    ScreenSetup, TrackingEngine, TrackingRegion,
};
use crate::error::{EngineError, EngineResult};

/// Single-slot, latest-value-wins handoff between one producer and one consumer.
///
/// Writing replaces whatever is in the slot; reading returns a copy of the
/// last value written and leaves it in place, so repeated reads may be stale.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    pub fn latest(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Engine wrapper that serves `gaze_sample` from a worker thread.
///
/// Every other call is forwarded to the wrapped engine on the caller's thread.
pub struct BackgroundSampler<E> {
    engine: Arc<Mutex<E>>,
    mailbox: Mailbox<GazeSample>,
    interval: Duration,
    worker: Option<Worker>,
}

impl<E: TrackingEngine + Send + 'static> BackgroundSampler<E> {
    pub fn new(engine: E, interval: Duration) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            mailbox: Mailbox::new(),
            interval,
            worker: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.worker.is_some()
    }

    fn spawn_worker(&mut self) {
        let (stop, stop_rx) = bounded::<()>(1);
        let engine = Arc::clone(&self.engine);
        let mailbox = self.mailbox.clone();
        let interval = self.interval;

        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match engine.lock().gaze_sample() {
                    Ok(sample) => mailbox.post(sample),
                    Err(e) => debug!("Background gaze poll failed: {}", e),
                },
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        info!("Background gaze polling started every {:?}", interval);
        self.worker = Some(Worker { stop, handle });
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(());
            if worker.handle.join().is_err() {
                warn!("Background gaze worker panicked");
            }
            self.mailbox.clear();
            info!("Background gaze polling stopped");
        }
    }
}

impl<E> Drop for BackgroundSampler<E> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(());
            let _ = worker.handle.join();
        }
    }
}

impl<E: TrackingEngine + Send + 'static> TrackingEngine for BackgroundSampler<E> {
    fn init(&mut self, params: &InitParams) -> EngineResult<()> {
        self.engine.lock().init(params)
    }

    fn register(&mut self, license_key: &str) -> EngineResult<u32> {
        self.engine.lock().register(license_key)
    }

    fn configure(&mut self, setup: &ScreenSetup) -> EngineResult<()> {
        self.engine.lock().configure(setup)
    }

    fn set_calibration_mode(&mut self, mode: CalibrationMode) -> EngineResult<()> {
        self.engine.lock().set_calibration_mode(mode)
    }

    fn set_tracking_region(&mut self, region: TrackingRegion) -> EngineResult<()> {
        self.engine.lock().set_tracking_region(region)
    }

    fn start_preview(&mut self) -> EngineResult<()> {
        self.engine.lock().start_preview()
    }

    fn stop_preview(&mut self) -> EngineResult<()> {
        self.engine.lock().stop_preview()
    }

    fn preview_frame(&mut self) -> EngineResult<PreviewFrame> {
        self.engine.lock().preview_frame()
    }

    fn start_calibration(&mut self) -> EngineResult<()> {
        self.engine.lock().start_calibration()
    }

    fn is_calibration_finished(&mut self) -> EngineResult<bool> {
        self.engine.lock().is_calibration_finished()
    }

    fn calibration_point(&mut self) -> EngineResult<CalibrationPoint> {
        self.engine.lock().calibration_point()
    }

    fn calibration_result(&mut self) -> EngineResult<CalibrationResult> {
        self.engine.lock().calibration_result()
    }

    fn start_sampling(&mut self) -> EngineResult<()> {
        self.engine.lock().start_sampling()?;
        self.spawn_worker();
        Ok(())
    }

    fn stop_sampling(&mut self) -> EngineResult<()> {
        self.stop_worker();
        self.engine.lock().stop_sampling()
    }

    fn gaze_sample(&mut self) -> EngineResult<GazeSample> {
        self.mailbox
            .latest()
            .ok_or(EngineError::NotReady("gaze_sample"))
    }

    fn save_data(&mut self, path: &Path) -> EngineResult<()> {
        self.engine.lock().save_data(path)
    }

    fn load_calibration(&mut self, blob: &str) -> EngineResult<()> {
        self.engine.lock().load_calibration(blob)
    }

    fn export_calibration(&mut self) -> EngineResult<String> {
        self.engine.lock().export_calibration()
    }

    fn version(&mut self) -> EngineResult<String> {
        self.engine.lock().version()
    }
}
