//! Plugin output parsing
//!
//! Plugins print one line of short output, optionally followed by `|` and
//! performance data. Further lines are long output until a line carrying
//! `|`; from there on everything is performance data.

/// Plugin output split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub short: String,
    pub long: Option<String>,
    pub perf: Option<String>,
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == text.len() {
        Some(text)
    } else {
        Some(trimmed.to_string())
    }
}

fn append(buffer: &mut String, separator: char, text: &str) {
    if !buffer.is_empty() {
        buffer.push(separator);
    }
    buffer.push_str(text);
}

/// Split raw (already unescaped) plugin output
pub fn parse_check_output(raw: &str) -> ParsedOutput {
    let mut lines = raw.split('\n');
    let first = lines.next().unwrap_or_default();

    let mut perf = String::new();
    let short = match first.split_once('|') {
        Some((short, first_perf)) => {
            perf.push_str(first_perf.trim());
            short.trim().to_string()
        }
        None => first.trim().to_string(),
    };

    let mut long = String::new();
    let mut in_perf_data = false;
    let mut long_lines = 0;
    for line in lines {
        if in_perf_data {
            append(&mut perf, ' ', line);
        } else if let Some((text, rest)) = line.split_once('|') {
            in_perf_data = true;
            if long_lines > 0 {
                long.push('\n');
            }
            long.push_str(text);
            append(&mut perf, ' ', rest);
        } else {
            if long_lines > 0 {
                long.push('\n');
            }
            long.push_str(line);
            long_lines += 1;
        }
    }

    ParsedOutput {
        short,
        long: non_empty(long),
        perf: non_empty(perf),
    }
}

/// Short output as stored on an entity. Semicolons would break the
/// `;`-separated alert log lines.
pub fn sanitize_short_output(short: &str) -> String {
    short.replace(';', ":")
}
