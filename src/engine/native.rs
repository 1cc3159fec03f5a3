//! Runtime binding to the vendor's `tccidesktopet` library.
//!
//! Symbols are resolved once when the library is opened and kept as plain
//! function pointers next to the [`Library`] handle that owns them.

use libloading::{Library, Symbol};
use std::ffi::{c_char, c_float, c_int, CStr, CString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    license_days, CalibrationMode, CalibrationPoint, CalibrationResult, GazeSample, InitParams,
    PreviewFrame, ScreenSetup, TrackingEngine, TrackingRegion, PREVIEW_HEIGHT, PREVIEW_WIDTH,
};
use crate::error::{EngineError, EngineResult};

type IntFn = unsafe extern "C" fn() -> c_int;
type BoolFn = unsafe extern "C" fn() -> bool;
type InitFn = unsafe extern "C" fn(c_int, c_int, c_int) -> c_int;
type RegisterFn = unsafe extern "C" fn(*const c_char) -> c_int;
type ScreenInfoFn =
    unsafe extern "C" fn(c_float, c_float, c_int, c_int, c_float, c_float) -> c_int;
type RegionFn = unsafe extern "C" fn(c_int, c_int, c_int, c_int) -> c_int;
type ModeFn = unsafe extern "C" fn(c_int) -> c_int;
type ResultFn = unsafe extern "C" fn(*mut c_int, *mut c_float, *mut c_int) -> c_float;
type PointFn = unsafe extern "C" fn(*mut c_float, *mut c_float, *mut c_int) -> c_int;
type ImageFn = unsafe extern "C" fn(*mut u8) -> c_int;
type GazeFn = unsafe extern "C" fn(
    *mut c_int,
    *mut u64,
    *mut c_float,
    *mut c_float,
    *mut c_float,
    *mut c_float,
) -> c_int;
type PathFn = unsafe extern "C" fn(*const c_char) -> c_int;
type ExportFn = unsafe extern "C" fn(*mut *const c_char) -> c_int;
type VersionFn = unsafe extern "C" fn() -> *const c_char;

/// Status `export_calibration` reports on success
const EXPORT_SUCCESS: c_int = 1;

/// Resolved entry points of the vendor library
struct Api {
    init: InitFn,
    register: RegisterFn,
    set_camera_screen_info: ScreenInfoFn,
    set_tracing_region: RegionFn,
    set_calibration_mode: ModeFn,
    start_previewing: IntFn,
    stop_previewing: IntFn,
    get_previewer_image: ImageFn,
    start_calibration: IntFn,
    is_calibration_finished: BoolFn,
    get_calibration_point_info: PointFn,
    get_calibration_result: ResultFn,
    start_sampling: IntFn,
    stop_sampling: IntFn,
    get_gaze_info: GazeFn,
    save_data: PathFn,
    load_calibration: PathFn,
    export_calibration: ExportFn,
    get_version: VersionFn,
}

/// Tracking engine backed by the native vendor library
pub struct NativeEngine {
    api: Api,
    preview: Vec<u8>,
    path: PathBuf,
    // Must outlive every pointer in `api`.
    _library: Library,
}

/// Platform file name of the vendor library
pub fn default_library_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("libtccidesktopet.dll")
    } else {
        PathBuf::from(libloading::library_filename("tccidesktopet"))
    }
}

unsafe fn resolve<T: Copy>(library: &Library, name: &'static str) -> EngineResult<T> {
    let symbol: Symbol<T> = library
        .get(name.as_bytes())
        .map_err(|_| EngineError::Symbol(name.to_string()))?;
    Ok(*symbol)
}

fn c_string(op: &'static str, value: &str) -> EngineResult<CString> {
    CString::new(value).map_err(|e| EngineError::InvalidData {
        op,
        reason: e.to_string(),
    })
}

impl NativeEngine {
    /// Open the vendor library at `path` and resolve all of its exports
    pub fn load(path: &Path) -> EngineResult<Self> {
        info!("Loading tracking library from: {:?}", path);

        let library = unsafe {
            Library::new(path).map_err(|e| EngineError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        let api = unsafe {
            Api {
                init: resolve(&library, "eye_tracking_init")?,
                register: resolve(&library, "eye_tracking_register")?,
                set_camera_screen_info: resolve(&library, "set_camera_screen_info")?,
                set_tracing_region: resolve(&library, "set_tracing_region")?,
                set_calibration_mode: resolve(&library, "set_calibration_mode")?,
                start_previewing: resolve(&library, "start_previewing")?,
                stop_previewing: resolve(&library, "stop_previewing")?,
                get_previewer_image: resolve(&library, "get_previewer_image")?,
                start_calibration: resolve(&library, "start_calibration")?,
                is_calibration_finished: resolve(&library, "is_calibration_finished")?,
                get_calibration_point_info: resolve(&library, "get_calibration_point_info")?,
                get_calibration_result: resolve(&library, "get_calibration_result")?,
                start_sampling: resolve(&library, "start_sampling")?,
                stop_sampling: resolve(&library, "stop_sampling")?,
                get_gaze_info: resolve(&library, "get_gaze_info")?,
                save_data: resolve(&library, "save_data")?,
                load_calibration: resolve(&library, "load_calibration")?,
                export_calibration: resolve(&library, "export_calibration")?,
                get_version: resolve(&library, "get_version")?,
            }
        };

        info!("✅ Tracking library loaded: {}", path.display());
        Ok(Self {
            api,
            preview: vec![0; (PREVIEW_WIDTH * PREVIEW_HEIGHT * 3) as usize],
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrackingEngine for NativeEngine {
    fn init(&mut self, params: &InitParams) -> EngineResult<()> {
        let code = unsafe {
            (self.api.init)(params.camera_id, params.look_ahead, params.preprocessing_type)
        };
        EngineError::check_zero("eye_tracking_init", code)
    }

    fn register(&mut self, license_key: &str) -> EngineResult<u32> {
        let key = c_string("eye_tracking_register", license_key)?;
        let days = unsafe { (self.api.register)(key.as_ptr()) };
        license_days(days)
    }

    fn configure(&mut self, setup: &ScreenSetup) -> EngineResult<()> {
        let (dpi_x, dpi_y) = setup.dpi();
        debug!(
            "Camera at ({}, {}) cm, screen {}x{} px, dpi {:.2}x{:.2}",
            setup.camera_x_cm, setup.camera_y_cm, setup.width_px, setup.height_px, dpi_x, dpi_y
        );
        let code = unsafe {
            (self.api.set_camera_screen_info)(
                setup.camera_x_cm,
                setup.camera_y_cm,
                setup.width_px as c_int,
                setup.height_px as c_int,
                dpi_x,
                dpi_y,
            )
        };
        EngineError::check_zero("set_camera_screen_info", code)
    }

    fn set_calibration_mode(&mut self, mode: CalibrationMode) -> EngineResult<()> {
        let code = unsafe { (self.api.set_calibration_mode)(mode.points() as c_int) };
        EngineError::check_zero("set_calibration_mode", code)
    }

    fn set_tracking_region(&mut self, region: TrackingRegion) -> EngineResult<()> {
        let code = unsafe {
            (self.api.set_tracing_region)(region.x, region.y, region.width, region.height)
        };
        EngineError::check_zero("set_tracing_region", code)
    }

    fn start_preview(&mut self) -> EngineResult<()> {
        let code = unsafe { (self.api.start_previewing)() };
        EngineError::check_zero("start_previewing", code)
    }

    fn stop_preview(&mut self) -> EngineResult<()> {
        let code = unsafe { (self.api.stop_previewing)() };
        EngineError::check_zero("stop_previewing", code)
    }

    fn preview_frame(&mut self) -> EngineResult<PreviewFrame> {
        // The engine fills exactly PREVIEW_WIDTH * PREVIEW_HEIGHT * 3 bytes.
        let code = unsafe { (self.api.get_previewer_image)(self.preview.as_mut_ptr()) };
        EngineError::check_zero("get_previewer_image", code)?;
        Ok(PreviewFrame {
            width: PREVIEW_WIDTH,
            height: PREVIEW_HEIGHT,
            rgb: self.preview.clone(),
        })
    }

    fn start_calibration(&mut self) -> EngineResult<()> {
        let code = unsafe { (self.api.start_calibration)() };
        EngineError::check_zero("start_calibration", code)
    }

    fn is_calibration_finished(&mut self) -> EngineResult<bool> {
        Ok(unsafe { (self.api.is_calibration_finished)() })
    }

    fn calibration_point(&mut self) -> EngineResult<CalibrationPoint> {
        let mut x: c_float = 0.0;
        let mut y: c_float = 0.0;
        let mut progress: c_int = 0;
        unsafe {
            (self.api.get_calibration_point_info)(&mut x, &mut y, &mut progress);
        }
        Ok(CalibrationPoint { x, y, progress })
    }

    fn calibration_result(&mut self) -> EngineResult<CalibrationResult> {
        let mut status: c_int = 0;
        let mut fitting_error: c_float = 0.0;
        let mut sample_size: c_int = 0;
        unsafe {
            (self.api.get_calibration_result)(&mut status, &mut fitting_error, &mut sample_size);
        }
        Ok(CalibrationResult {
            status,
            fitting_error,
            sample_size,
        })
    }

    fn start_sampling(&mut self) -> EngineResult<()> {
        let code = unsafe { (self.api.start_sampling)() };
        EngineError::check_zero("start_sampling", code)
    }

    fn stop_sampling(&mut self) -> EngineResult<()> {
        let code = unsafe { (self.api.stop_sampling)() };
        EngineError::check_zero("stop_sampling", code)
    }

    fn gaze_sample(&mut self) -> EngineResult<GazeSample> {
        let mut sample = GazeSample::default();
        unsafe {
            (self.api.get_gaze_info)(
                &mut sample.status,
                &mut sample.timestamp,
                &mut sample.gaze_x,
                &mut sample.gaze_y,
                &mut sample.left_openness,
                &mut sample.right_openness,
            );
        }
        Ok(sample)
    }

    fn save_data(&mut self, path: &Path) -> EngineResult<()> {
        let path = c_string("save_data", &path.to_string_lossy())?;
        let code = unsafe { (self.api.save_data)(path.as_ptr()) };
        EngineError::check_zero("save_data", code)
    }

    fn load_calibration(&mut self, blob: &str) -> EngineResult<()> {
        let blob = c_string("load_calibration", blob)?;
        let code = unsafe { (self.api.load_calibration)(blob.as_ptr()) };
        EngineError::check_zero("load_calibration", code)
    }

    fn export_calibration(&mut self) -> EngineResult<String> {
        let mut blob: *const c_char = std::ptr::null();
        let code = unsafe { (self.api.export_calibration)(&mut blob) };
        if code != EXPORT_SUCCESS || blob.is_null() {
            return Err(EngineError::Status {
                op: "export_calibration",
                code,
            });
        }
        // The engine keeps ownership of the returned buffer.
        let text = unsafe { CStr::from_ptr(blob) };
        text.to_str()
            .map(str::to_owned)
            .map_err(|e| EngineError::InvalidData {
                op: "export_calibration",
                reason: e.to_string(),
            })
    }

    fn version(&mut self) -> EngineResult<String> {
        let raw = unsafe { (self.api.get_version)() };
        if raw.is_null() {
            return Err(EngineError::InvalidData {
                op: "get_version",
                reason: "null version string".to_string(),
            });
        }
        let version = unsafe { CStr::from_ptr(raw) };
        Ok(version.to_string_lossy().into_owned())
    }
}
