//! 日期显示格式

use chrono::{DateTime, Datelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `3/7`
    MonthDay,
    /// `Mar 7, 2025`
    Long,
}

pub fn format_date(date: DateTime<Utc>, format: DateFormat) -> String {
    match format {
        DateFormat::MonthDay => format!("{}/{}", date.month(), date.day()),
        DateFormat::Long => date.format("%b %-d, %Y").to_string(),
    }
}
