use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use adb_device_bridge::app::adb::locator::{resolve_adb_program_from_env, validate_adb_program};
use adb_device_bridge::app::config::load_config;
use adb_device_bridge::app::device::new_trace_id;
use adb_device_bridge::app::logging::init_logging;
use adb_device_bridge::{DeviceManager, DeviceRunner};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone)]
struct Args {
    serial: Option<String>,
    out_dir: Option<PathBuf>,
    json: bool,
    with_input: bool,
    with_orientation: bool,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    serial: Option<String>,
    adb_program: Option<String>,
    out_dir: String,
    artifacts: HashMap<String, String>,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|skip
    duration_ms: u128,
    artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SmokeCheck {
    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: "skip",
            duration_ms: 0,
            artifacts: vec![],
            error_code: None,
            error: None,
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let mut serial = std::env::var("ANDROID_SERIAL")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let mut out_dir: Option<PathBuf> = None;
    let mut json = false;
    let mut with_input = false;
    let mut with_orientation = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--serial" => {
                serial = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if serial.is_none() {
                    return Err("--serial requires a value".to_string());
                }
            }
            "--out" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(value));
            }
            "--json" => {
                json = true;
            }
            "--with-input" => {
                with_input = true;
            }
            "--with-orientation" => {
                with_orientation = true;
            }
            "-h" | "--help" => {
                return Err(
                    "Usage: cargo run --bin smoke -- [--serial SERIAL] [--out DIR] [--json] [--with-input] [--with-orientation]\n"
                        .to_string(),
                );
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }

    Ok(Args {
        serial,
        out_dir,
        json,
        with_input,
        with_orientation,
    })
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|err| format!("Failed to create dir {}: {err}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<String, (String, String)> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| ("ERR_IO".to_string(), format!("Failed to serialize: {err}")))?;
    fs::write(path, body)
        .map_err(|err| ("ERR_IO".to_string(), format!("Failed to write {}: {err}", path.display())))?;
    Ok(path.to_string_lossy().to_string())
}

fn run_check<F>(checks: &mut Vec<SmokeCheck>, name: &'static str, f: F) -> Result<(), ()>
where
    F: FnOnce() -> Result<Vec<String>, (String, String)>,
{
    let start = Instant::now();
    match f() {
        Ok(artifacts) => {
            checks.push(SmokeCheck {
                name,
                status: "pass",
                duration_ms: start.elapsed().as_millis(),
                artifacts,
                error_code: None,
                error: None,
            });
            Ok(())
        }
        Err((code, err)) => {
            checks.push(SmokeCheck {
                name,
                status: "fail",
                duration_ms: start.elapsed().as_millis(),
                artifacts: vec![],
                error_code: Some(code),
                error: Some(err),
            });
            Err(())
        }
    }
}

fn finish(summary: SmokeSummary, json: bool) -> ! {
    let output = if json {
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut text = format!(
            "status: {}\ntrace_id: {}\nout: {}\n",
            summary.status, summary.trace_id, summary.out_dir
        );
        for check in &summary.checks {
            text.push_str(&format!("  {:<16} {}\n", check.name, check.status));
        }
        text
    };
    println!("{output}");
    std::process::exit(if summary.status == "pass" { 0 } else { 1 });
}

fn run_device_checks(
    runner: &DeviceRunner,
    args: &Args,
    out_dir: &Path,
    artifacts: &mut HashMap<String, String>,
    checks: &mut Vec<SmokeCheck>,
) -> &'static str {
    let mut status = "pass";
    let app_error = |err: adb_device_bridge::AppError| (err.code.clone(), err.error);

    if run_check(checks, "screen_size", || {
        let size = runner.get_screen_size().map_err(app_error)?;
        let orientation = runner.get_orientation();
        let path = out_dir.join("screen.json");
        let payload = serde_json::json!({ "size": size, "orientation": orientation });
        Ok(vec![write_json(&path, &payload)?])
    })
    .is_err()
    {
        status = "fail";
    }

    if run_check(checks, "features", || {
        let features = runner.list_system_features().map_err(app_error)?;
        Ok(vec![write_json(&out_dir.join("features.json"), &features)?])
    })
    .is_err()
    {
        status = "fail";
    }

    if run_check(checks, "apps", || {
        let apps = runner.list_installed_apps().map_err(app_error)?;
        let processes = runner.list_running_processes().map_err(app_error)?;
        let payload = serde_json::json!({ "installed": apps, "running": processes });
        Ok(vec![write_json(&out_dir.join("apps.json"), &payload)?])
    })
    .is_err()
    {
        status = "fail";
    }

    if run_check(checks, "elements", || {
        let elements = runner.get_elements_on_screen().map_err(app_error)?;
        Ok(vec![write_json(&out_dir.join("elements.json"), &elements)?])
    })
    .is_err()
    {
        status = "fail";
    }

    if run_check(checks, "screenshot", || {
        let bytes = runner.get_screenshot().map_err(app_error)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = out_dir.join(format!("screenshot_{timestamp}.png"));
        fs::write(&path, &bytes)
            .map_err(|err| ("ERR_IO".to_string(), format!("Failed to write screenshot: {err}")))?;
        let path = path.to_string_lossy().to_string();
        artifacts.insert("screenshot".to_string(), path.clone());
        Ok(vec![path])
    })
    .is_err()
    {
        status = "fail";
    }

    if args.with_input {
        if run_check(checks, "input", || {
            runner.press_button("HOME").map_err(app_error)?;
            runner.swipe("up").map_err(app_error)?;
            runner.press_button("HOME").map_err(app_error)?;
            Ok(vec![])
        })
        .is_err()
        {
            status = "fail";
        }
    } else {
        checks.push(SmokeCheck::skipped("input"));
    }

    if args.with_orientation {
        if run_check(checks, "orientation", || {
            let original = runner.get_orientation();
            let flipped = match original {
                adb_device_bridge::Orientation::Portrait => adb_device_bridge::Orientation::Landscape,
                adb_device_bridge::Orientation::Landscape => adb_device_bridge::Orientation::Portrait,
            };
            runner.set_orientation(flipped).map_err(app_error)?;
            let observed = runner.get_orientation();
            runner.set_orientation(original).map_err(app_error)?;
            if observed != flipped {
                return Err((
                    "ERR_ORIENTATION".to_string(),
                    format!("Expected {}, device reports {}", flipped.as_str(), observed.as_str()),
                ));
            }
            Ok(vec![])
        })
        .is_err()
        {
            status = "fail";
        }
    } else {
        checks.push(SmokeCheck::skipped("orientation"));
    }

    status
}

fn main() {
    init_logging();
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let trace_id = new_trace_id();
    let out_dir = args.out_dir.clone().unwrap_or_else(|| {
        let mut p = std::env::temp_dir();
        p.push(format!("adb_device_bridge_smoke_{trace_id}"));
        p
    });
    if let Err(err) = ensure_dir(&out_dir) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let mut artifacts: HashMap<String, String> = HashMap::new();
    let mut checks: Vec<SmokeCheck> = Vec::new();
    let mut summary = SmokeSummary {
        tool: "adb_device_bridge_smoke",
        status: "fail",
        trace_id: trace_id.clone(),
        serial: args.serial.clone(),
        adb_program: None,
        out_dir: out_dir.to_string_lossy().to_string(),
        artifacts: HashMap::new(),
        checks: Vec::new(),
    };

    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            checks.push(SmokeCheck {
                name: "load_config",
                status: "fail",
                duration_ms: 0,
                artifacts: vec![],
                error_code: Some(err.code),
                error: Some(err.error),
            });
            summary.checks = checks;
            finish(summary, args.json);
        }
    };

    let adb_program = resolve_adb_program_from_env(&config.adb.command_path);
    summary.adb_program = Some(adb_program.clone());
    if let Err(err) = validate_adb_program(&adb_program) {
        checks.push(SmokeCheck {
            name: "check_adb",
            status: "fail",
            duration_ms: 0,
            artifacts: vec![],
            error_code: Some("ERR_VALIDATION".to_string()),
            error: Some(err),
        });
        summary.checks = checks;
        finish(summary, args.json);
    }

    let manager = DeviceManager::from_config(config);
    let mut devices = Vec::new();
    let listed = run_check(&mut checks, "list_devices", || {
        devices = manager.list_connected_devices();
        let path = write_json(&out_dir.join("devices.json"), &devices)?;
        if devices.is_empty() {
            return Err((
                "ERR_NO_DEVICE".to_string(),
                "No connected adb devices found.".to_string(),
            ));
        }
        Ok(vec![path])
    });
    if listed.is_err() {
        summary.checks = checks;
        finish(summary, args.json);
    }

    let serial = match args.serial.clone() {
        Some(serial) => serial,
        None if devices.len() == 1 => devices[0].device_id.clone(),
        None => {
            let serials = devices
                .iter()
                .map(|device| device.device_id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            checks.push(SmokeCheck {
                name: "pick_device",
                status: "fail",
                duration_ms: 0,
                artifacts: vec![],
                error_code: Some("ERR_PICK_DEVICE".to_string()),
                error: Some(format!(
                    "Multiple devices found ({serials}). Set ANDROID_SERIAL or pass --serial."
                )),
            });
            summary.checks = checks;
            finish(summary, args.json);
        }
    };

    let runner = manager.runner(&serial);
    let status = run_device_checks(&runner, &args, &out_dir, &mut artifacts, &mut checks);

    summary.status = status;
    summary.serial = Some(serial);
    summary.artifacts = artifacts;
    summary.checks = checks;
    finish(summary, args.json);
}
