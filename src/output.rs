//! Terminal output for events and grouped results

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};

use logwindow_logs::StreamGroups;

/// Render one event line, optionally prefixed with its RFC 3339 time
pub fn format_line(message: &str, time: Option<DateTime<Utc>>, timestamps: bool) -> String {
    match time {
        Some(time) if timestamps => format!(
            "{} {}",
            time.to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        ),
        _ => message.to_string(),
    }
}

/// Stream name header; goes to stderr so stdout carries only events
pub fn print_header(stream_name: &str) {
    eprintln!("==> {} <==", stream_name);
}

/// Print every group: header, then one line per value, then a blank line
pub fn print_groups<T, F>(groups: &StreamGroups<T>, render: F)
where
    F: Fn(&T) -> String,
{
    for (stream_name, values) in groups.iter() {
        print_header(stream_name);
        for value in values {
            println!("{}", render(value));
        }
        println!();
    }
}

/// Render a plain value
pub fn plain<T: Display>(value: &T) -> String {
    value.to_string()
}
