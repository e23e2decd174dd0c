//! Check command execution
//!
//! The engine never runs a plugin on its own thread. Jobs are handed to the
//! [`Dispatcher`], which runs them through an executor chosen per plugin by
//! the [`ExecutorRegistry`], commits the result to the spool and signals
//! the main loop over a channel.

pub mod builtin;
pub mod dispatch;
pub mod macros;
pub mod process;


pub use builtin::BuiltinExecutor;
pub use dispatch::{CheckJob, Completion, Dispatcher};
pub use macros::{expand_command, MacroContext};
pub use process::ShellExecutor;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What a finished (or killed) check command produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub return_code: i32,
    /// Standard output, truncated to a bounded size
    pub output: String,
    /// False when the command was killed or terminated by a signal
    pub exited_ok: bool,
    /// The timeout fired before the command finished
    pub early_timeout: bool,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
}

impl ExecutionOutcome {
    /// A completed in-process run
    pub fn completed(
        return_code: i32,
        output: impl Into<String>,
        start_time: DateTime<Utc>,
        finish_time: DateTime<Utc>,
    ) -> Self {
        Self {
            return_code,
            output: output.into(),
            exited_ok: true,
            early_timeout: false,
            start_time,
            finish_time,
        }
    }

    pub fn execution_time(&self) -> f64 {
        let micros = (self.finish_time - self.start_time)
            .num_microseconds()
            .unwrap_or(0);
        (micros as f64 / 1_000_000.0).max(0.0)
    }
}

/// Runs a fully expanded check command line
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &str, timeout: Duration) -> Result<ExecutionOutcome>;
}

/// Name of the plugin a command line invokes: its first word, without any
/// directory prefix.
pub fn plugin_name(command: &str) -> &str {
    let first = command.split_whitespace().next().unwrap_or("");
    first.rsplit('/').next().unwrap_or(first)
}

/// Chooses between in-process plugins and the shell
#[derive(Clone)]
pub struct ExecutorRegistry {
    builtin: Arc<BuiltinExecutor>,
    shell: Arc<dyn CommandExecutor>,
}

/// Builtins preloaded with `check_dummy`, everything else through the shell
impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new(BuiltinExecutor::with_defaults())
    }
}

impl ExecutorRegistry {
    pub fn new(builtin: BuiltinExecutor) -> Self {
        Self {
            builtin: Arc::new(builtin),
            shell: Arc::new(ShellExecutor),
        }
    }

    /// Replace the external process executor
    pub fn with_shell(mut self, shell: Arc<dyn CommandExecutor>) -> Self {
        self.shell = shell;
        self
    }

    pub fn select(&self, command: &str) -> Arc<dyn CommandExecutor> {
        if self.builtin.handles(plugin_name(command)) {
            self.builtin.clone()
        } else {
            self.shell.clone()
        }
    }

    pub fn execute(&self, command: &str, timeout: Duration) -> Result<ExecutionOutcome> {
        self.select(command).execute(command, timeout)
    }
}
