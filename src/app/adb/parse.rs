use std::collections::HashSet;

use regex::Regex;

use crate::app::models::InstalledApp;

pub const FEATURE_PREFIX: &str = "feature:";
pub const PACKAGE_NAME_PREFIX: &str = "packageName=";

/// Serials from `adb devices`: header and blank lines dropped, first tab field kept.
pub fn parse_device_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.starts_with("List of devices attached"))
        .filter_map(|line| line.split('\t').next())
        .map(|serial| serial.trim().to_string())
        .filter(|serial| !serial.is_empty())
        .collect()
}

pub fn parse_system_features(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(FEATURE_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Last `WxH` pair wins, so an `Override size:` line takes precedence over `Physical size:`.
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let size_re = Regex::new(r"(\d+)x(\d+)").ok()?;
    let caps = size_re.captures_iter(output).last()?;
    let width = caps[1].parse::<u32>().ok()?;
    let height = caps[2].parse::<u32>().ok()?;
    Some((width, height))
}

pub fn parse_wm_density(output: &str) -> Option<u32> {
    let density_re = Regex::new(r"(?i)density:\s*(\d+)").ok()?;
    let caps = density_re.captures_iter(output).last()?;
    caps[1].parse::<u32>().ok()
}

/// `settings get` prints the integer value, or `null` when the key was never written.
pub fn parse_user_rotation(output: &str) -> Option<i64> {
    let value = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?;
    value.parse::<i64>().ok()
}

pub fn parse_display_rotation(output: &str) -> Option<i64> {
    let orientation_re = Regex::new(r"mCurrentOrientation\s*=\s*(\d)").ok()?;
    if let Some(caps) = orientation_re.captures(output) {
        return caps[1].parse::<i64>().ok();
    }
    let rotation_re = Regex::new(r"(?i)\brotation[\s=:]+(\d)\b").ok()?;
    let caps = rotation_re.captures(output)?;
    caps[1].parse::<i64>().ok()
}

pub fn parse_launchable_apps(output: &str) -> Vec<InstalledApp> {
    let mut seen = HashSet::new();
    let mut apps = Vec::new();
    for line in output.lines() {
        let Some(package_name) = line.trim().strip_prefix(PACKAGE_NAME_PREFIX) else {
            continue;
        };
        let package_name = package_name.trim();
        if package_name.is_empty() || !seen.insert(package_name.to_string()) {
            continue;
        }
        apps.push(InstalledApp {
            package_name: package_name.to_string(),
            app_name: package_name.to_string(),
        });
    }
    apps
}

/// Rows owned by app users (`u0_a123`, ...) and their 9th column, the process name.
pub fn parse_running_processes(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('u'))
        .filter_map(|line| line.split_whitespace().nth(8))
        .map(str::to_string)
        .collect()
}
