pub mod adb;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod manager;
pub mod models;
pub mod ui_capture;
pub mod ui_xml;

#[cfg(test)]
pub(crate) mod testing;
