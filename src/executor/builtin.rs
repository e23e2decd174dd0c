//! In-process check plugins

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{plugin_name, CommandExecutor, ExecutionOutcome};

/// Signature of an in-process plugin: receives the arguments after the
/// plugin name and returns `(return_code, output)`.
pub type BuiltinPlugin = Arc<dyn Fn(&[&str]) -> (i32, String) + Send + Sync>;

/// Return code for a command naming no registered plugin
const PLUGIN_NOT_FOUND: i32 = 127;

/// Plugins that run as closures instead of child processes
#[derive(Clone, Default)]
pub struct BuiltinExecutor {
    plugins: HashMap<String, BuiltinPlugin>,
}

impl fmt::Debug for BuiltinExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("BuiltinExecutor")
            .field("plugins", &names)
            .finish()
    }
}

impl BuiltinExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor preloaded with the trivial `check_dummy <code> [text]` plugin
    pub fn with_defaults() -> Self {
        let mut executor = Self::new();
        executor.register("check_dummy", |args| {
            let code = args.first().and_then(|c| c.parse().ok()).unwrap_or(3);
            let text = args[1.min(args.len())..].join(" ");
            (code, text)
        });
        executor
    }

    pub fn register<F>(&mut self, name: impl Into<String>, plugin: F)
    where
        F: Fn(&[&str]) -> (i32, String) + Send + Sync + 'static,
    {
        self.plugins.insert(name.into(), Arc::new(plugin));
    }

    pub fn handles(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }
}

impl CommandExecutor for BuiltinExecutor {
    /// In-process plugins are not interruptible, so the timeout is only
    /// reported after the fact.
    fn execute(&self, command: &str, timeout: Duration) -> Result<ExecutionOutcome> {
        let start_time = Utc::now();
        let name = plugin_name(command);
        let args: Vec<&str> = command.split_whitespace().skip(1).collect();

        let Some(plugin) = self.plugins.get(name) else {
            return Ok(ExecutionOutcome::completed(
                PLUGIN_NOT_FOUND,
                format!("No builtin plugin named '{name}'"),
                start_time,
                Utc::now(),
            ));
        };

        let (return_code, output) = plugin(&args);
        let mut outcome = ExecutionOutcome::completed(return_code, output, start_time, Utc::now());
        if outcome.execution_time() > timeout.as_secs_f64() {
            outcome.early_timeout = true;
            outcome.exited_ok = false;
        }
        Ok(outcome)
    }
}
