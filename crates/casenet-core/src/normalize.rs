//! Field and date normalization for upstream extracts.

use chrono::NaiveDate;

/// Values that upstream tooling writes for a missing cell.
const EMPTY_SENTINELS: &[&str] = &["nan", "NaN", "None", "null", "NULL", "<NA>"];

/// Date formats seen in the extracts, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y", "%Y.%m.%d",
];

/// Trim a raw cell and coerce empty sentinels to the empty string.
pub fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if EMPTY_SENTINELS.contains(&trimmed) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a node identifier: clean it, then strip the stray quoting the
/// spreadsheet exports put around numeric identifiers.
pub fn normalize_id(raw: &str) -> String {
    let cleaned = clean_field(raw);
    cleaned
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
        .to_string()
}

/// Parse a date in any of the known formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean_field(raw);
    if cleaned.is_empty() {
        return None;
    }
    // Timestamps exported as "YYYY-MM-DD HH:MM:SS" keep only the date part.
    let date_part = cleaned.split_whitespace().next().unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
