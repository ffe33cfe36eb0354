//!
//! src/input.rs  Andrew Belles  Oct 16th, 2026
//!
//! Turns free-text user entry into a release id
//!

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::ValidationError;

pub const INVALID_RELEASE_MSG: &str =
    "Please enter a valid Release ID or a URL like https://www.discogs.com/release/12345/...";

fn release_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)/releases?/(\d+)").expect("static regex"))
}

/// Accepts a bare id or any url containing /release/{id} or /releases/{id}
pub fn parse_release_id(input: &str) -> Result<u64, ValidationError> {
    let trimmed = input.trim();

    let digits = if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Some(trimmed)
    } else {
        release_path_re()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    };

    match digits.and_then(|d| d.parse::<u64>().ok()) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ValidationError(INVALID_RELEASE_MSG.to_string()))
    }
}
