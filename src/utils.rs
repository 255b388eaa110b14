use chrono::{Datelike, NaiveDate};

/// Grouping key for a calendar month, e.g. "2024-03". Keys sort
/// chronologically as plain strings.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Human-facing month label, e.g. "Mar 2024".
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Grouping key for an ISO-8601 week, e.g. "2024-W05". Uses the ISO
/// week-year, which can differ from the calendar year at year boundaries.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

/// Human-facing week label, e.g. "W05 2024".
pub fn iso_week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("W{:02} {}", week.week(), week.year())
}

/// Calendar quarter (1-4) for a date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Every calendar day from `start` to `end` inclusive. Empty when
/// `end < start`.
pub fn calendar_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if end < start {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}
