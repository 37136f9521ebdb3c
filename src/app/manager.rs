use std::sync::Arc;

use tracing::{info, warn};

use crate::app::adb::locator::resolve_adb_program_from_env;
use crate::app::adb::parse::parse_device_ids;
use crate::app::adb::runner::{CommandExecutor, ExecLimits, SystemExecutor};
use crate::app::config::BridgeConfig;
use crate::app::device::{new_trace_id, DeviceRunner};
use crate::app::error::AppError;
use crate::app::models::{DeviceDescriptor, DeviceType};

pub const LEANBACK_FEATURE: &str = "android.software.leanback";
pub const TELEVISION_FEATURE: &str = "android.hardware.type.television";

pub fn classify_device_type(features: &[String]) -> DeviceType {
    let is_tv = features
        .iter()
        .any(|feature| feature == LEANBACK_FEATURE || feature == TELEVISION_FEATURE);
    if is_tv {
        DeviceType::Tv
    } else {
        DeviceType::Mobile
    }
}

/// Lists connected devices and hands out per-device runners sharing one adb program.
pub struct DeviceManager {
    config: BridgeConfig,
    adb_program: String,
    executor: Arc<dyn CommandExecutor>,
}

impl DeviceManager {
    /// Resolves the adb program once, from `config.adb.command_path` or `ANDROID_HOME`.
    pub fn from_config(config: BridgeConfig) -> Self {
        let adb_program = resolve_adb_program_from_env(&config.adb.command_path);
        Self::with_executor(config, adb_program, Arc::new(SystemExecutor))
    }

    pub fn with_executor(
        config: BridgeConfig,
        adb_program: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            config,
            adb_program: adb_program.into(),
            executor,
        }
    }

    pub fn adb_program(&self) -> &str {
        &self.adb_program
    }

    pub fn runner(&self, device_id: &str) -> DeviceRunner {
        DeviceRunner::with_executor(
            device_id,
            self.adb_program.clone(),
            &self.config,
            Arc::clone(&self.executor),
        )
    }

    fn list_device_ids(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        let args = vec!["devices".to_string()];
        let output = self.executor.run(
            &self.adb_program,
            &args,
            ExecLimits::from(&self.config.adb),
            trace_id,
        )?;
        let stdout = output.into_success(trace_id)?;
        Ok(parse_device_ids(&String::from_utf8_lossy(&stdout)))
    }

    fn try_list_connected_devices(&self, trace_id: &str) -> Result<Vec<DeviceDescriptor>, AppError> {
        let device_ids = self.list_device_ids(trace_id)?;
        let mut devices = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            let features = self.runner(&device_id).list_system_features()?;
            devices.push(DeviceDescriptor {
                device_type: classify_device_type(&features),
                device_id,
            });
        }
        Ok(devices)
    }

    /// Never fails: an unusable adb yields an empty list and a warning.
    pub fn list_connected_devices(&self) -> Vec<DeviceDescriptor> {
        let trace_id = new_trace_id();
        match self.try_list_connected_devices(&trace_id) {
            Ok(devices) => {
                info!(trace_id = %trace_id, count = devices.len(), "list_connected_devices");
                devices
            }
            Err(err) => {
                warn!(
                    trace_id = %trace_id,
                    adb_program = %self.adb_program,
                    code = %err.code,
                    error = %err.error,
                    "Could not execute adb command, maybe ANDROID_HOME is not set?"
                );
                Vec::new()
            }
        }
    }
}
