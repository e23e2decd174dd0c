//! `key=value` check result file format
//!
//! A file starts with an optional `file_time=<secs>` header and holds one or
//! more records separated by blank lines. Lines starting with `#` are
//! comments. Timestamps are written as `<secs>.<usecs>`; the `output` value
//! and the entity names escape backslashes and newlines.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Write;
use tracing::warn;

use crate::error::VigilError;
use crate::models::{CheckOptions, CheckResult, CheckType};

/// Escape a plugin output for a single `output=` line
pub fn escape_output(output: &str) -> String {
    let mut escaped = String::with_capacity(output.len());
    for ch in output.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn unescape_output(escaped: &str) -> String {
    let mut output = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('\\') => output.push('\\'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    format!("{}.{:06}", t.timestamp(), t.timestamp_subsec_micros())
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = match value.split_once('.') {
        Some((secs, frac)) => {
            // Normalise the fraction to microseconds
            let digits: String = frac.chars().take(6).collect();
            let micros: u32 = if digits.is_empty() {
                0
            } else {
                format!("{digits:0<6}").parse().ok()?
            };
            (secs.parse::<i64>().ok()?, micros)
        }
        None => (value.parse::<i64>().ok()?, 0),
    };
    Utc.timestamp_opt(secs, micros * 1000).single()
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Serialise one result as a complete file
pub fn write_result_file(result: &CheckResult, file_time: DateTime<Utc>) -> String {
    let mut out = String::new();
    let kind = if result.is_service_check() {
        "Service"
    } else {
        "Host"
    };
    let _ = writeln!(out, "### Check Result File ###");
    let _ = writeln!(out, "file_time={}", file_time.timestamp());
    let _ = writeln!(out);
    let _ = writeln!(out, "### {kind} Check Result ###");
    let _ = writeln!(out, "# Time: {}", file_time.to_rfc2822());
    let _ = writeln!(out, "host_name={}", escape_output(&result.host_name));
    if let Some(description) = &result.service_description {
        let _ = writeln!(out, "service_description={}", escape_output(description));
    }
    let _ = writeln!(out, "check_type={}", result.check_type.code());
    let _ = writeln!(out, "check_options={}", result.check_options.bits());
    let _ = writeln!(out, "scheduled_check={}", flag(result.scheduled_check));
    let _ = writeln!(out, "reschedule_check={}", flag(result.reschedule_check));
    let _ = writeln!(out, "latency={:.6}", result.latency);
    let _ = writeln!(out, "start_time={}", format_timestamp(result.start_time));
    let _ = writeln!(out, "finish_time={}", format_timestamp(result.finish_time));
    let _ = writeln!(out, "early_timeout={}", flag(result.early_timeout));
    let _ = writeln!(out, "exited_ok={}", flag(result.exited_ok));
    let _ = writeln!(out, "return_code={}", result.return_code);
    let _ = writeln!(out, "output={}", escape_output(&result.output));
    let _ = writeln!(out);
    out
}

/// Fields collected for one record before it is validated
#[derive(Default)]
struct RecordBuilder {
    host_name: Option<String>,
    service_description: Option<String>,
    check_type: CheckType,
    check_options: CheckOptions,
    scheduled_check: bool,
    reschedule_check: bool,
    latency: f64,
    start_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    early_timeout: bool,
    /// Absent means the plugin exited normally
    exited_ok: Option<bool>,
    return_code: i32,
    output: Option<String>,
    touched: bool,
}

impl RecordBuilder {
    fn set(&mut self, key: &str, value: &str) {
        self.touched = true;
        match key {
            "host_name" => self.host_name = Some(unescape_output(value)),
            "service_description" => self.service_description = Some(unescape_output(value)),
            "check_type" => self.check_type = CheckType::from_code(value.parse().unwrap_or(0)),
            "check_options" => {
                self.check_options = CheckOptions::from_bits(value.parse().unwrap_or(0))
            }
            "scheduled_check" => self.scheduled_check = parse_flag(value),
            "reschedule_check" => self.reschedule_check = parse_flag(value),
            "latency" => self.latency = value.parse().unwrap_or(0.0),
            "start_time" => self.start_time = parse_timestamp(value),
            "finish_time" => self.finish_time = parse_timestamp(value),
            "early_timeout" => self.early_timeout = parse_flag(value),
            "exited_ok" => self.exited_ok = Some(parse_flag(value)),
            "return_code" => self.return_code = value.parse().unwrap_or(0),
            "output" => self.output = Some(unescape_output(value)),
            _ => {}
        }
    }

    fn finish(self, fallback_time: DateTime<Utc>) -> Result<CheckResult, VigilError> {
        let host_name = self
            .host_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| VigilError::MalformedResult("missing host_name".to_string()))?;
        let output = self.output.ok_or_else(|| {
            VigilError::MalformedResult(format!("missing output for {host_name}"))
        })?;
        let start_time = self.start_time.unwrap_or(fallback_time);
        let finish_time = self.finish_time.unwrap_or(start_time);
        Ok(CheckResult {
            host_name,
            service_description: self.service_description,
            check_type: self.check_type,
            check_options: self.check_options,
            scheduled_check: self.scheduled_check,
            reschedule_check: self.reschedule_check,
            latency: self.latency.max(0.0),
            start_time,
            finish_time,
            early_timeout: self.early_timeout,
            exited_ok: self.exited_ok.unwrap_or(true),
            return_code: self.return_code,
            output,
            output_file: None,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim() != "0" && !value.trim().is_empty()
}

/// Outcome of parsing one result file
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub results: Vec<CheckResult>,
    /// The `file_time` header was older than the allowed age
    pub expired: bool,
}

/// Parse a result file. Records missing a host name or output are logged
/// and skipped. With `max_age_secs > 0`, a file whose `file_time` is older
/// than that is reported as expired and yields no results.
pub fn parse_result_file(content: &str, now: DateTime<Utc>, max_age_secs: u64) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let mut current = RecordBuilder::default();

    let flush = |record: RecordBuilder, parsed: &mut ParsedFile| {
        if !record.touched {
            return;
        }
        match record.finish(now) {
            Ok(result) => parsed.results.push(result),
            Err(e) => warn!("Skipping check result record: {}", e),
        }
    };

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            flush(std::mem::take(&mut current), &mut parsed);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key == "file_time" {
            if max_age_secs > 0 {
                if let Ok(secs) = value.trim().parse::<i64>() {
                    if now.timestamp() - secs > max_age_secs as i64 {
                        parsed.expired = true;
                        parsed.results.clear();
                        return parsed;
                    }
                }
            }
            continue;
        }
        current.set(key, value);
    }
    flush(current, &mut parsed);
    parsed
}
