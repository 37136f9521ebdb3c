use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::adb::input::{
    escape_input_text, round_coordinate, swipe_path, Button, SwipeDirection, SWIPE_DURATION_MS,
};
use crate::app::adb::parse::{
    parse_display_rotation, parse_launchable_apps, parse_running_processes,
    parse_system_features, parse_user_rotation, parse_wm_density, parse_wm_size,
};
use crate::app::adb::runner::{CommandExecutor, ExecLimits, SystemExecutor};
use crate::app::config::{BridgeConfig, OrientationSettings, UiDumpSettings};
use crate::app::error::AppError;
use crate::app::models::{InstalledApp, Orientation, ScreenSize, UiElement};
use crate::app::ui_capture::png_bytes_to_data_url;
use crate::app::ui_xml::{collect_elements, parse_hierarchy, strip_to_xml_prolog, NULL_ROOT_NODE_MARKER};

#[cfg(test)]
mod tests;

pub const BASELINE_DENSITY: u32 = 160;

pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required"), trace_id));
    }
    Ok(())
}

/// Issues adb actions against a single device. Each call is an independent subprocess.
pub struct DeviceRunner {
    serial: String,
    adb_program: String,
    limits: ExecLimits,
    ui_dump: UiDumpSettings,
    orientation: OrientationSettings,
    executor: Arc<dyn CommandExecutor>,
}

impl DeviceRunner {
    pub fn new(serial: impl Into<String>, adb_program: impl Into<String>, config: &BridgeConfig) -> Self {
        Self::with_executor(serial, adb_program, config, Arc::new(SystemExecutor))
    }

    pub fn with_executor(
        serial: impl Into<String>,
        adb_program: impl Into<String>,
        config: &BridgeConfig,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            serial: serial.into(),
            adb_program: adb_program.into(),
            limits: ExecLimits::from(&config.adb),
            ui_dump: config.ui_dump.clone(),
            orientation: config.orientation.clone(),
            executor,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn adb_program(&self) -> &str {
        &self.adb_program
    }

    /// Runs `adb -s <serial> <args…>` and returns raw stdout.
    pub fn execute(&self, args: &[&str]) -> Result<Vec<u8>, AppError> {
        let trace_id = new_trace_id();
        self.run(&trace_id, args)
    }

    fn run(&self, trace_id: &str, args: &[&str]) -> Result<Vec<u8>, AppError> {
        let mut full_args = Vec::with_capacity(args.len() + 2);
        full_args.push("-s".to_string());
        full_args.push(self.serial.clone());
        full_args.extend(args.iter().map(|arg| arg.to_string()));
        let output = self
            .executor
            .run(&self.adb_program, &full_args, self.limits, trace_id)?;
        if output.exit_code != Some(0) {
            warn!(
                trace_id = %trace_id,
                serial = %self.serial,
                exit_code = ?output.exit_code,
                args = ?args,
                "adb command failed"
            );
        }
        output.into_success(trace_id)
    }

    fn run_text(&self, trace_id: &str, args: &[&str]) -> Result<String, AppError> {
        let stdout = self.run(trace_id, args)?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    pub fn list_system_features(&self) -> Result<Vec<String>, AppError> {
        let trace_id = new_trace_id();
        let output = self.run_text(&trace_id, &["shell", "pm", "list", "features"])?;
        Ok(parse_system_features(&output))
    }

    pub fn get_screen_size(&self) -> Result<ScreenSize, AppError> {
        let trace_id = new_trace_id();
        let size_output = self.run_text(&trace_id, &["shell", "wm", "size"])?;
        let (physical_width, physical_height) = parse_wm_size(&size_output).ok_or_else(|| {
            AppError::system(
                format!("Unexpected wm size output: {}", size_output.trim()),
                &trace_id,
            )
        })?;
        let density_output = self.run_text(&trace_id, &["shell", "wm", "density"])?;
        let density = parse_wm_density(&density_output).unwrap_or(BASELINE_DENSITY);
        let scale = f64::from(density) / f64::from(BASELINE_DENSITY);

        let native_portrait = physical_height > physical_width;
        let current_portrait = self.get_orientation() == Orientation::Portrait;
        let (width, height) = if native_portrait == current_portrait {
            (physical_width, physical_height)
        } else {
            (physical_height, physical_width)
        };
        debug!(
            trace_id = %trace_id,
            serial = %self.serial,
            width,
            height,
            scale,
            "screen size"
        );
        Ok(ScreenSize {
            width,
            height,
            scale,
        })
    }

    pub fn list_installed_apps(&self) -> Result<Vec<InstalledApp>, AppError> {
        let trace_id = new_trace_id();
        let output = self.run_text(
            &trace_id,
            &[
                "shell",
                "cmd",
                "package",
                "query-activities",
                "-a",
                "android.intent.action.MAIN",
                "-c",
                "android.intent.category.LAUNCHER",
            ],
        )?;
        Ok(parse_launchable_apps(&output))
    }

    pub fn launch_app(&self, package_name: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        ensure_non_empty(package_name, "package_name", &trace_id)?;
        info!(trace_id = %trace_id, serial = %self.serial, package = %package_name, "launch_app");
        self.run(
            &trace_id,
            &[
                "shell",
                "monkey",
                "-p",
                package_name,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ],
        )?;
        Ok(())
    }

    pub fn terminate_app(&self, package_name: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        ensure_non_empty(package_name, "package_name", &trace_id)?;
        info!(trace_id = %trace_id, serial = %self.serial, package = %package_name, "terminate_app");
        self.run(&trace_id, &["shell", "am", "force-stop", package_name])?;
        Ok(())
    }

    pub fn open_url(&self, url: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        ensure_non_empty(url, "url", &trace_id)?;
        info!(trace_id = %trace_id, serial = %self.serial, "open_url");
        self.run(
            &trace_id,
            &["shell", "am", "start", "-a", "android.intent.action.VIEW", "-d", url],
        )?;
        Ok(())
    }

    pub fn list_running_processes(&self) -> Result<Vec<String>, AppError> {
        let trace_id = new_trace_id();
        let output = self.run_text(&trace_id, &["shell", "ps", "-e"])?;
        Ok(parse_running_processes(&output))
    }

    pub fn swipe(&self, direction: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        let direction = direction
            .parse::<SwipeDirection>()
            .map_err(|message| AppError::actionable(message, &trace_id))?;
        let size = self.get_screen_size()?;
        let path = swipe_path(size, direction);
        info!(trace_id = %trace_id, serial = %self.serial, ?direction, "swipe");
        let (x0, y0, x1, y1, duration) = (
            path.x0.to_string(),
            path.y0.to_string(),
            path.x1.to_string(),
            path.y1.to_string(),
            SWIPE_DURATION_MS.to_string(),
        );
        self.run(
            &trace_id,
            &["shell", "input", "swipe", &x0, &y0, &x1, &y1, &duration],
        )?;
        Ok(())
    }

    /// Coordinates are rounded only; no logical-to-physical scaling is applied.
    pub fn tap(&self, x: f64, y: f64) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        let x = round_coordinate(x).to_string();
        let y = round_coordinate(y).to_string();
        info!(trace_id = %trace_id, serial = %self.serial, x = %x, y = %y, "tap");
        self.run(&trace_id, &["shell", "input", "tap", &x, &y])?;
        Ok(())
    }

    pub fn press_button(&self, button: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        let button = button
            .parse::<Button>()
            .map_err(|message| AppError::actionable(message, &trace_id))?;
        info!(trace_id = %trace_id, serial = %self.serial, %button, "press_button");
        self.run(&trace_id, &["shell", "input", "keyevent", button.keycode()])?;
        Ok(())
    }

    pub fn send_keys(&self, text: &str) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        let escaped = escape_input_text(text);
        info!(trace_id = %trace_id, serial = %self.serial, length = text.len(), "send_keys");
        self.run(&trace_id, &["shell", "input", "text", &escaped])?;
        Ok(())
    }

    fn put_accelerometer_rotation(&self, trace_id: &str, value: &str) -> Result<(), AppError> {
        self.run(
            trace_id,
            &["shell", "settings", "put", "system", "accelerometer_rotation", value],
        )?;
        Ok(())
    }

    fn write_user_rotation(&self, trace_id: &str, orientation: Orientation) -> Result<(), AppError> {
        let rotation = orientation.user_rotation().to_string();
        self.put_accelerometer_rotation(trace_id, "0")?;
        self.run(
            trace_id,
            &["shell", "settings", "put", "system", "user_rotation", &rotation],
        )?;
        let bind_value = format!("value:i:{rotation}");
        self.run(
            trace_id,
            &[
                "shell",
                "content",
                "insert",
                "--uri",
                "content://settings/system",
                "--bind",
                "name:s:user_rotation",
                "--bind",
                &bind_value,
            ],
        )?;
        Ok(())
    }

    /// Some builds only re-read `user_rotation` when auto-rotate flips; failures here are ignored.
    fn nudge_auto_rotation(&self, trace_id: &str) {
        let delay = Duration::from_millis(self.orientation.nudge_delay_ms);
        for value in ["0", "1", "0"] {
            std::thread::sleep(delay);
            if let Err(err) = self.put_accelerometer_rotation(trace_id, value) {
                debug!(trace_id = %trace_id, serial = %self.serial, error = %err, "auto-rotation nudge failed");
            }
        }
    }

    pub fn set_orientation(&self, orientation: Orientation) -> Result<(), AppError> {
        let trace_id = new_trace_id();
        info!(
            trace_id = %trace_id,
            serial = %self.serial,
            orientation = orientation.as_str(),
            "set_orientation"
        );
        if let Err(err) = self.write_user_rotation(&trace_id, orientation) {
            warn!(trace_id = %trace_id, serial = %self.serial, error = %err, "set_orientation failed");
            return Err(AppError::actionable(
                format!(
                    "Failed to set orientation to {}: {}",
                    orientation.as_str(),
                    err.error
                ),
                &trace_id,
            ));
        }
        self.nudge_auto_rotation(&trace_id);
        std::thread::sleep(Duration::from_millis(self.orientation.settle_delay_ms));
        Ok(())
    }

    /// `user_rotation` first, then the display dump; `None` when neither yields a rotation.
    fn query_orientation(&self, trace_id: &str) -> Option<Orientation> {
        match self.run_text(trace_id, &["shell", "settings", "get", "system", "user_rotation"]) {
            Ok(output) => {
                if let Some(rotation) = parse_user_rotation(&output) {
                    return Some(Orientation::from_rotation(rotation));
                }
            }
            Err(err) => {
                debug!(trace_id = %trace_id, serial = %self.serial, error = %err, "user_rotation unavailable");
            }
        }
        match self.run_text(trace_id, &["shell", "dumpsys", "display"]) {
            Ok(output) => parse_display_rotation(&output).map(Orientation::from_rotation),
            Err(err) => {
                debug!(trace_id = %trace_id, serial = %self.serial, error = %err, "dumpsys display unavailable");
                None
            }
        }
    }

    /// Never fails: falls back to portrait when the device reports nothing usable.
    pub fn get_orientation(&self) -> Orientation {
        let trace_id = new_trace_id();
        match self.query_orientation(&trace_id) {
            Some(orientation) => orientation,
            None => {
                debug!(trace_id = %trace_id, serial = %self.serial, "orientation unknown, assuming portrait");
                Orientation::Portrait
            }
        }
    }

    pub fn get_screenshot(&self) -> Result<Vec<u8>, AppError> {
        let trace_id = new_trace_id();
        self.run(&trace_id, &["exec-out", "screencap", "-p"])
    }

    pub fn get_screenshot_data_url(&self) -> Result<String, AppError> {
        let trace_id = new_trace_id();
        let bytes = self.run(&trace_id, &["exec-out", "screencap", "-p"])?;
        png_bytes_to_data_url(&bytes).map_err(|message| AppError::actionable(message, &trace_id))
    }

    fn fetch_ui_dump(&self, trace_id: &str) -> Result<String, AppError> {
        let max_attempts = self.ui_dump.max_attempts;
        for attempt in 1..=max_attempts {
            let dump = self.run_text(trace_id, &["exec-out", "uiautomator", "dump", "/dev/tty"])?;
            if dump.contains(NULL_ROOT_NODE_MARKER) {
                debug!(trace_id = %trace_id, serial = %self.serial, attempt, "ui dump not ready");
                continue;
            }
            return Ok(strip_to_xml_prolog(&dump).to_string());
        }
        warn!(trace_id = %trace_id, serial = %self.serial, max_attempts, "ui dump retries exhausted");
        Err(AppError::actionable(
            format!("Failed to obtain UI dump after {max_attempts} attempts"),
            trace_id,
        ))
    }

    pub fn get_ui_dump_xml(&self) -> Result<String, AppError> {
        let trace_id = new_trace_id();
        self.fetch_ui_dump(&trace_id)
    }

    pub fn get_elements_on_screen(&self) -> Result<Vec<UiElement>, AppError> {
        let trace_id = new_trace_id();
        let xml = self.fetch_ui_dump(&trace_id)?;
        let root = parse_hierarchy(&xml).map_err(|message| {
            AppError::system(format!("Failed to parse UI dump: {message}"), &trace_id)
        })?;
        Ok(collect_elements(&root))
    }
}
