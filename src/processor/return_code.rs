//! How a check process ended, and the texts recorded for abnormal endings

use crate::models::CheckResult;

/// Highest return code of the 0..=3 plugin convention
const MAX_PLUGIN_CODE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckExit {
    /// Return code within the plugin convention
    Normal(i32),
    TimedOut,
    /// Killed by a signal or otherwise did not exit on its own
    Abnormal,
    OutOfBounds(i32),
}

impl CheckExit {
    pub fn of(result: &CheckResult) -> Self {
        if result.early_timeout {
            CheckExit::TimedOut
        } else if !result.exited_ok {
            CheckExit::Abnormal
        } else if (0..=MAX_PLUGIN_CODE).contains(&result.return_code) {
            CheckExit::Normal(result.return_code)
        } else {
            CheckExit::OutOfBounds(result.return_code)
        }
    }
}

/// Hint for the shell's "cannot execute" and "not found" codes
pub fn return_code_advice(code: i32) -> &'static str {
    match code {
        126 => " - plugin may not be executable",
        127 => " - plugin may be missing",
        _ => "",
    }
}

/// Output recorded in place of the plugin's for an out-of-range code
pub fn out_of_bounds_output(code: i32, output: &str) -> String {
    if output.is_empty() {
        format!("(Return code of {} is out of bounds{})", code, return_code_advice(code))
    } else {
        format!(
            "(Return code of {} is out of bounds{} : {})",
            code,
            return_code_advice(code),
            output
        )
    }
}

pub fn timed_out_output(kind: &str, execution_time: f64) -> String {
    format!("({} check timed out after {:.2} seconds)", kind, execution_time)
}

pub fn abnormal_exit_output(kind: &str) -> String {
    format!("({} check did not exit properly)", kind)
}
