pub mod app;

pub use app::adb::input::{Button, SwipeDirection};
pub use app::adb::runner::{CommandExecutor, CommandOutput, ExecLimits, SystemExecutor};
pub use app::config::BridgeConfig;
pub use app::device::DeviceRunner;
pub use app::error::AppError;
pub use app::manager::DeviceManager;
pub use app::models::{
    DeviceDescriptor, DeviceType, ElementRect, InstalledApp, Orientation, ScreenSize, UiElement,
};
