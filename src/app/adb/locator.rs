use std::path::{Path, PathBuf};

pub const ANDROID_HOME_ENV: &str = "ANDROID_HOME";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

fn adb_file_name() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

/// Picks the adb executable: explicit path first, then the SDK root, then `adb` on `PATH`.
pub fn resolve_adb_program(config_command_path: &str, android_home: Option<&str>) -> String {
    let normalized = normalize_command_path(config_command_path);
    if !normalized.is_empty() {
        return normalized;
    }
    let sdk_root = android_home
        .map(normalize_command_path)
        .filter(|root| !root.is_empty());
    match sdk_root {
        Some(root) => PathBuf::from(root)
            .join("platform-tools")
            .join(adb_file_name())
            .to_string_lossy()
            .to_string(),
        None => "adb".to_string(),
    }
}

pub fn resolve_adb_program_from_env(config_command_path: &str) -> String {
    let android_home = std::env::var(ANDROID_HOME_ENV).ok();
    resolve_adb_program(config_command_path, android_home.as_deref())
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}
