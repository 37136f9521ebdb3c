use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::app::adb::runner::{CommandExecutor, CommandOutput, ExecLimits};
use crate::app::error::AppError;

type Reply = Result<CommandOutput, AppError>;

/// Replies keyed by the space-joined argument vector. The last queued reply for a key repeats.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, args: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(args.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn stdout(&self, args: &str, stdout: &str) -> &Self {
        self.reply(args, Ok(CommandOutput::success(stdout)))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, args: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == args).count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(
        &self,
        _program: &str,
        args: &[String],
        _limits: ExecLimits,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let key = args.join(" ");
        self.calls.lock().expect("calls lock").push(key.clone());
        let mut replies = self.replies.lock().expect("replies lock");
        let Some(queue) = replies.get_mut(&key) else {
            return Err(AppError::command_failed(
                format!("adb exited with 1: no scripted reply for `{key}`"),
                trace_id,
            ));
        };
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        reply.unwrap_or_else(|| {
            Err(AppError::command_failed(
                format!("adb exited with 1: no scripted reply for `{key}`"),
                trace_id,
            ))
        })
    }
}
