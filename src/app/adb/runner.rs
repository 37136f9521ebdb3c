use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::config::AdbSettings;
use crate::app::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Converts a non-zero (or signal) exit into `ERR_COMMAND_FAILED`, keeping stderr verbatim.
    pub fn into_success(self, trace_id: &str) -> Result<Vec<u8>, AppError> {
        if self.exit_code == Some(0) {
            return Ok(self.stdout);
        }
        let exit = self
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        let detail = if stderr.is_empty() {
            String::from_utf8_lossy(&self.stdout).trim().to_string()
        } else {
            stderr.to_string()
        };
        Err(AppError::command_failed(
            format!("adb exited with {exit}: {detail}"),
            trace_id,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl From<&AdbSettings> for ExecLimits {
    fn from(settings: &AdbSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            max_output_bytes: settings.max_output_bytes,
        }
    }
}

/// Runs one external program to completion. Swapped for a scripted fake in tests.
pub trait CommandExecutor: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        limits: ExecLimits,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(
        &self,
        program: &str,
        args: &[String],
        limits: ExecLimits,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        run_command_with_limits(program, args, limits, trace_id)
    }
}

fn drain_pipe<R: Read>(mut reader: R, limit: usize, overflow: &AtomicBool) -> Vec<u8> {
    let mut buffer = Vec::<u8>::new();
    let mut temp = [0u8; 4096];
    loop {
        match reader.read(&mut temp) {
            Ok(0) => break,
            Ok(count) => {
                if buffer.len() + count > limit {
                    // Keep reading so the child never blocks on a full pipe before it is killed.
                    overflow.store(true, Ordering::SeqCst);
                    continue;
                }
                buffer.extend_from_slice(&temp[..count]);
            }
            Err(_) => break,
        }
    }
    buffer
}

pub fn run_command_with_limits(
    program: &str,
    args: &[String],
    limits: ExecLimits,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    debug!(trace_id = %trace_id, program = %program, args = ?args, "spawning command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::dependency(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Drain stdout/stderr in parallel; otherwise, a chatty child process can block once the pipe
    // buffer fills, and we will incorrectly hit the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let stdout_overflow = Arc::new(AtomicBool::new(false));
    let stdout_flag = Arc::clone(&stdout_overflow);
    let max_output = limits.max_output_bytes;
    let stdout_handle = std::thread::spawn(move || drain_pipe(stdout, max_output, &stdout_flag));

    let stderr_handle = std::thread::spawn(move || {
        let ignored = AtomicBool::new(false);
        drain_pipe(stderr, max_output, &ignored)
    });

    let start = Instant::now();
    let exit_code = loop {
        if stdout_overflow.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(AppError::output_limit(
                format!("Command output exceeded {max_output} bytes"),
                trace_id,
            ));
        }
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > limits.timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::timeout(
                        format!("Command timed out after {}s", limits.timeout.as_secs_f64()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle
        .join()
        .map_err(|_| AppError::system("stdout reader panicked", trace_id))?;
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    // The child can exit right after writing past the cap, before the poll loop notices.
    if stdout_overflow.load(Ordering::SeqCst) {
        return Err(AppError::output_limit(
            format!("Command output exceeded {max_output} bytes"),
            trace_id,
        ));
    }

    Ok(CommandOutput {
        stdout: stdout_bytes,
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}
