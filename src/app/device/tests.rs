use super::*;

use crate::app::adb::runner::CommandOutput;
use crate::app::error::{ERR_ACTIONABLE, ERR_COMMAND_FAILED, ERR_SYSTEM, ERR_VALIDATION};
use crate::app::testing::ScriptedExecutor;

const SERIAL: &str = "emulator-5554";

fn fast_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.orientation.nudge_delay_ms = 0;
    config.orientation.settle_delay_ms = 0;
    config
}

fn runner_with(executor: &Arc<ScriptedExecutor>) -> DeviceRunner {
    DeviceRunner::with_executor(SERIAL, "adb", &fast_config(), executor.clone())
}

fn key(args: &str) -> String {
    format!("-s {SERIAL} {args}")
}

fn script_geometry(executor: &ScriptedExecutor, size: &str, density: &str, user_rotation: &str) {
    executor
        .stdout(&key("shell wm size"), size)
        .stdout(&key("shell wm density"), density)
        .stdout(&key("shell settings get system user_rotation"), user_rotation);
}

fn command_error(stderr: &str) -> Result<CommandOutput, AppError> {
    Ok(CommandOutput::failure(1, stderr))
}

#[test]
fn execute_targets_the_device_serial() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("shell echo hi"), "hi\n");
    let runner = runner_with(&executor);

    assert_eq!(runner.execute(&["shell", "echo", "hi"]).expect("execute"), b"hi\n");
    assert_eq!(executor.calls(), vec![key("shell echo hi")]);
    assert_eq!(runner.serial(), SERIAL);
    assert_eq!(runner.adb_program(), "adb");
}

#[test]
fn subprocess_failure_propagates_unchanged() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.reply(
        &key("shell ps -e"),
        command_error("error: device 'emulator-5554' not found"),
    );
    let runner = runner_with(&executor);

    let err = runner.list_running_processes().unwrap_err();
    assert_eq!(err.code, ERR_COMMAND_FAILED);
    assert_eq!(
        err.error,
        "adb exited with 1: error: device 'emulator-5554' not found"
    );
    assert_eq!(executor.count(&key("shell ps -e")), 1);
}

#[test]
fn native_portrait_in_landscape_swaps_dimensions() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 1080x2340\n", "Physical density: 420\n", "1\n");
    let size = runner_with(&executor).get_screen_size().expect("size");
    assert_eq!((size.width, size.height), (2340, 1080));
    assert_eq!(size.scale, 2.625);
}

#[test]
fn native_portrait_in_portrait_keeps_dimensions() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 1080x2340\n", "Physical density: 420\n", "0\n");
    let size = runner_with(&executor).get_screen_size().expect("size");
    assert_eq!((size.width, size.height), (1080, 2340));
}

#[test]
fn native_landscape_follows_current_orientation() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 2560x1600\n", "Physical density: 320\n", "0\n");
    let size = runner_with(&executor).get_screen_size().expect("size");
    assert_eq!((size.width, size.height), (1600, 2560));
    assert_eq!(size.scale, 2.0);

    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 2560x1600\n", "Physical density: 320\n", "3\n");
    let size = runner_with(&executor).get_screen_size().expect("size");
    assert_eq!((size.width, size.height), (2560, 1600));
}

#[test]
fn unparseable_density_defaults_to_scale_one() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 1080x2340\n", "no density here\n", "0\n");
    let size = runner_with(&executor).get_screen_size().expect("size");
    assert_eq!(size.scale, 1.0);
}

#[test]
fn unparseable_size_is_a_system_error() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("shell wm size"), "garbage\n");
    let err = runner_with(&executor).get_screen_size().unwrap_err();
    assert_eq!(err.code, ERR_SYSTEM);
}

#[test]
fn swipe_up_runs_through_center_column() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 1080x2340\n", "Physical density: 420\n", "0\n");
    executor.stdout(&key("shell input swipe 540 1872 540 468 1000"), "");
    runner_with(&executor).swipe("up").expect("swipe");
    assert_eq!(executor.count(&key("shell input swipe 540 1872 540 468 1000")), 1);
}

#[test]
fn swipe_left_in_landscape_uses_logical_width() {
    let executor = Arc::new(ScriptedExecutor::new());
    script_geometry(&executor, "Physical size: 1080x2340\n", "Physical density: 420\n", "1\n");
    executor.stdout(&key("shell input swipe 1872 540 468 540 1000"), "");
    runner_with(&executor).swipe("left").expect("swipe");
    assert_eq!(executor.count(&key("shell input swipe 1872 540 468 540 1000")), 1);
}

#[test]
fn unsupported_swipe_direction_is_actionable() {
    let executor = Arc::new(ScriptedExecutor::new());
    let err = runner_with(&executor).swipe("sideways").unwrap_err();
    assert_eq!(err.code, ERR_ACTIONABLE);
    assert!(err.error.contains("\"sideways\""));
    assert!(executor.calls().is_empty());
}

#[test]
fn tap_rounds_coordinates() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("shell input tap 101 200"), "");
    runner_with(&executor).tap(100.6, 199.5).expect("tap");
    assert_eq!(executor.calls(), vec![key("shell input tap 101 200")]);
}

#[test]
fn press_button_maps_every_button_to_its_keycode() {
    let expected = [
        ("BACK", "KEYCODE_BACK"),
        ("HOME", "KEYCODE_HOME"),
        ("VOLUME_UP", "KEYCODE_VOLUME_UP"),
        ("VOLUME_DOWN", "KEYCODE_VOLUME_DOWN"),
        ("ENTER", "KEYCODE_ENTER"),
        ("DPAD_CENTER", "KEYCODE_DPAD_CENTER"),
        ("DPAD_UP", "KEYCODE_DPAD_UP"),
        ("DPAD_DOWN", "KEYCODE_DPAD_DOWN"),
        ("DPAD_LEFT", "KEYCODE_DPAD_LEFT"),
        ("DPAD_RIGHT", "KEYCODE_DPAD_RIGHT"),
    ];
    for (button, keycode) in expected {
        let executor = Arc::new(ScriptedExecutor::new());
        let args = key(&format!("shell input keyevent {keycode}"));
        executor.stdout(&args, "");
        runner_with(&executor).press_button(button).expect("press");
        assert_eq!(executor.calls(), vec![args]);
    }
}

#[test]
fn unmapped_button_is_actionable() {
    let executor = Arc::new(ScriptedExecutor::new());
    let err = runner_with(&executor).press_button("POWER").unwrap_err();
    assert_eq!(err.code, ERR_ACTIONABLE);
    assert!(err.error.contains("\"POWER\""));
    assert!(executor.calls().is_empty());
}

#[test]
fn send_keys_escapes_spaces() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("shell input text hello\\ world"), "");
    runner_with(&executor).send_keys("hello world").expect("send keys");
    assert_eq!(executor.calls(), vec![key("shell input text hello\\ world")]);
}

#[test]
fn lists_installed_apps_without_duplicates() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(
        &key("shell cmd package query-activities -a android.intent.action.MAIN -c android.intent.category.LAUNCHER"),
        "  packageName=com.android.settings\n  packageName=com.example.app\n  packageName=com.android.settings\n",
    );
    let apps = runner_with(&executor).list_installed_apps().expect("apps");
    assert_eq!(
        apps,
        vec![
            InstalledApp {
                package_name: "com.android.settings".to_string(),
                app_name: "com.android.settings".to_string(),
            },
            InstalledApp {
                package_name: "com.example.app".to_string(),
                app_name: "com.example.app".to_string(),
            },
        ]
    );
}

#[test]
fn launch_and_terminate_issue_fire_and_forget_commands() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(
            &key("shell monkey -p com.example.app -c android.intent.category.LAUNCHER 1"),
            "Events injected: 1\n",
        )
        .stdout(&key("shell am force-stop com.example.app"), "")
        .stdout(
            &key("shell am start -a android.intent.action.VIEW -d https://example.com"),
            "",
        );
    let runner = runner_with(&executor);
    runner.launch_app("com.example.app").expect("launch");
    runner.terminate_app("com.example.app").expect("terminate");
    runner.open_url("https://example.com").expect("open url");
    assert_eq!(executor.calls().len(), 3);
}

#[test]
fn launch_app_requires_package_name() {
    let executor = Arc::new(ScriptedExecutor::new());
    let err = runner_with(&executor).launch_app("  ").unwrap_err();
    assert_eq!(err.code, ERR_VALIDATION);
    assert!(executor.calls().is_empty());
}

#[test]
fn lists_features_and_processes() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(
            &key("shell pm list features"),
            "feature:android.hardware.touchscreen\nfeature:android.software.webview\n",
        )
        .stdout(
            &key("shell ps -e"),
            "USER PID PPID VSZ RSS WCHAN ADDR S NAME\nsystem 500 1 1 1 0 0 S system_server\nu0_a12 900 1 1 1 0 0 S com.example.app\n",
        );
    let runner = runner_with(&executor);
    assert_eq!(
        runner.list_system_features().expect("features"),
        vec!["android.hardware.touchscreen", "android.software.webview"]
    );
    assert_eq!(
        runner.list_running_processes().expect("processes"),
        vec!["com.example.app"]
    );
}

#[test]
fn orientation_reads_user_rotation() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("shell settings get system user_rotation"), "3\n");
    assert_eq!(runner_with(&executor).get_orientation(), Orientation::Landscape);
    assert_eq!(executor.count(&key("shell dumpsys display")), 0);
}

#[test]
fn orientation_falls_back_to_display_dump() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(&key("shell settings get system user_rotation"), "null\n")
        .stdout(&key("shell dumpsys display"), "  mCurrentOrientation=1\n");
    assert_eq!(runner_with(&executor).get_orientation(), Orientation::Landscape);
}

#[test]
fn orientation_defaults_to_portrait_when_everything_fails() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .reply(
            &key("shell settings get system user_rotation"),
            command_error("settings: not found"),
        )
        .reply(&key("shell dumpsys display"), command_error("dumpsys: not found"));
    assert_eq!(runner_with(&executor).get_orientation(), Orientation::Portrait);
    assert_eq!(executor.calls().len(), 2);
}

#[test]
fn set_orientation_writes_both_channels_then_nudges() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(&key("shell settings put system accelerometer_rotation 0"), "")
        .stdout(&key("shell settings put system accelerometer_rotation 1"), "")
        .stdout(&key("shell settings put system user_rotation 1"), "")
        .stdout(
            &key("shell content insert --uri content://settings/system --bind name:s:user_rotation --bind value:i:1"),
            "",
        );
    runner_with(&executor)
        .set_orientation(Orientation::Landscape)
        .expect("set orientation");
    assert_eq!(
        executor.calls(),
        vec![
            key("shell settings put system accelerometer_rotation 0"),
            key("shell settings put system user_rotation 1"),
            key("shell content insert --uri content://settings/system --bind name:s:user_rotation --bind value:i:1"),
            key("shell settings put system accelerometer_rotation 0"),
            key("shell settings put system accelerometer_rotation 1"),
            key("shell settings put system accelerometer_rotation 0"),
        ]
    );
}

#[test]
fn set_orientation_tolerates_nudge_failures() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(&key("shell settings put system accelerometer_rotation 0"), "")
        .reply(
            &key("shell settings put system accelerometer_rotation 1"),
            command_error("permission denied"),
        )
        .stdout(&key("shell settings put system user_rotation 0"), "")
        .stdout(
            &key("shell content insert --uri content://settings/system --bind name:s:user_rotation --bind value:i:0"),
            "",
        );
    runner_with(&executor)
        .set_orientation(Orientation::Portrait)
        .expect("nudge failures are ignored");
}

#[test]
fn set_orientation_failure_is_one_actionable_error() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor
        .stdout(&key("shell settings put system accelerometer_rotation 0"), "")
        .stdout(&key("shell settings put system user_rotation 1"), "")
        .reply(
            &key("shell content insert --uri content://settings/system --bind name:s:user_rotation --bind value:i:1"),
            command_error("SecurityException"),
        );
    let err = runner_with(&executor)
        .set_orientation(Orientation::Landscape)
        .unwrap_err();
    assert_eq!(err.code, ERR_ACTIONABLE);
    assert!(err.error.contains("landscape"));
    assert!(err.error.contains("SecurityException"));
    assert_eq!(executor.calls().len(), 3);
}

const UI_DUMP_ARGS: &str = "exec-out uiautomator dump /dev/tty";
const NULL_ROOT: &str =
    "ERROR: null root node returned by UiTestAutomationBridge.\n";
const DUMP: &str = "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation=\"0\"><node text=\"OK\" class=\"android.widget.Button\" bounds=\"[10,20][110,220]\" /></hierarchy>";

#[test]
fn ui_dump_retries_transient_null_root() {
    let executor = Arc::new(ScriptedExecutor::new());
    for _ in 0..9 {
        executor.stdout(&key(UI_DUMP_ARGS), NULL_ROOT);
    }
    executor.stdout(&key(UI_DUMP_ARGS), DUMP);

    let elements = runner_with(&executor)
        .get_elements_on_screen()
        .expect("elements");
    assert_eq!(executor.count(&key(UI_DUMP_ARGS)), 10);
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].text.as_deref(), Some("OK"));
    assert_eq!(elements[0].rect.width, 100);
    assert_eq!(elements[0].rect.height, 200);
}

#[test]
fn ui_dump_gives_up_after_ten_attempts() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key(UI_DUMP_ARGS), NULL_ROOT);

    let err = runner_with(&executor).get_elements_on_screen().unwrap_err();
    assert_eq!(err.code, ERR_ACTIONABLE);
    assert!(err.error.contains("Failed to obtain UI dump"));
    assert_eq!(executor.count(&key(UI_DUMP_ARGS)), 10);
}

#[test]
fn other_dump_failures_are_passed_through_on_first_attempt() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key(UI_DUMP_ARGS), "ERROR: could not get idle state.\n");
    let runner = runner_with(&executor);

    let xml = runner.get_ui_dump_xml().expect("passed through");
    assert_eq!(xml, "ERROR: could not get idle state.\n");
    assert_eq!(executor.count(&key(UI_DUMP_ARGS)), 1);

    let err = runner.get_elements_on_screen().unwrap_err();
    assert_eq!(err.code, ERR_SYSTEM);
    assert_eq!(executor.count(&key(UI_DUMP_ARGS)), 2);
}

#[test]
fn ui_dump_is_trimmed_to_prolog() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key(UI_DUMP_ARGS), &format!("WARNING: linker noise\n{DUMP}"));
    let xml = runner_with(&executor).get_ui_dump_xml().expect("xml");
    assert!(xml.starts_with("<?xml"));
}

#[test]
fn screenshot_returns_raw_png_and_data_url() {
    let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
    let executor = Arc::new(ScriptedExecutor::new());
    executor.reply(
        &key("exec-out screencap -p"),
        Ok(CommandOutput::success(png.clone())),
    );
    let runner = runner_with(&executor);
    assert_eq!(runner.get_screenshot().expect("screenshot"), png);
    assert!(runner
        .get_screenshot_data_url()
        .expect("data url")
        .starts_with("data:image/png;base64,"));
}

#[test]
fn screenshot_data_url_rejects_non_png() {
    let executor = Arc::new(ScriptedExecutor::new());
    executor.stdout(&key("exec-out screencap -p"), "not a png");
    let err = runner_with(&executor).get_screenshot_data_url().unwrap_err();
    assert_eq!(err.code, ERR_ACTIONABLE);
}
