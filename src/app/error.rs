use serde::Serialize;
use std::fmt;

pub const ERR_ACTIONABLE: &str = "ERR_ACTIONABLE";
pub const ERR_COMMAND_FAILED: &str = "ERR_COMMAND_FAILED";
pub const ERR_TIMEOUT: &str = "ERR_TIMEOUT";
pub const ERR_OUTPUT_LIMIT: &str = "ERR_OUTPUT_LIMIT";
pub const ERR_DEPENDENCY: &str = "ERR_DEPENDENCY";
pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    /// An anticipated failure the caller can fix; the message is meant to be shown as-is.
    pub fn actionable(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_ACTIONABLE, message, trace_id)
    }

    pub fn command_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_COMMAND_FAILED, message, trace_id)
    }

    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_TIMEOUT, message, trace_id)
    }

    pub fn output_limit(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_OUTPUT_LIMIT, message, trace_id)
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    pub fn dependency(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEPENDENCY, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    pub fn is_actionable(&self) -> bool {
        self.code == ERR_ACTIONABLE
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
