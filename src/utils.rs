use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Sign and significant digits of a price cell, e.g. `" -1,200.50"` gives
/// `(true, "1200")`. Parsing stops at the first character that is not a
/// digit once separators are removed; no digits at all reads as zero.
fn leading_integer(raw: &str) -> (bool, String) {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim_start();

    let (negative, rest) = match cleaned.chars().next() {
        Some('-') => (true, &cleaned[1..]),
        Some('+') => (false, &cleaned[1..]),
        _ => (false, cleaned),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        (false, String::new())
    } else {
        (negative, digits.to_string())
    }
}

pub fn to_number(raw: &str) -> i64 {
    let (negative, digits) = leading_integer(raw);
    if digits.is_empty() {
        return 0;
    }
    let value = digits.parse::<i64>().unwrap_or(i64::MAX);
    if negative { -value } else { value }
}

/// Renders a price cell with `,` thousands grouping and no decimals.
/// Works on the digit string directly so arbitrarily long inputs never
/// overflow, and formatting its own output returns it unchanged.
pub fn format_number(raw: &str) -> String {
    let (negative, digits) = leading_integer(raw);
    if digits.is_empty() {
        return "0".to_string();
    }

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_optional_number(raw: Option<&str>) -> String {
    format_number(raw.unwrap_or(""))
}

/// Short date used in the header line, e.g. `3/18/25`.
pub fn format_short_date(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%-m/%-d/%y").to_string()
}

/// Full timestamp used in status messages, e.g. `3/18/2025, 9:05:12 AM`.
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}
