//! Field validators — pure functions over raw user input.
//!
//! Format failures are re-promptable; range failures on age and cesarean are
//! disqualifiers and carry the offending value so it can be recorded before
//! the flow ends.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::CountAnswer;

/// Latin letters, spaces, hyphens, apostrophes; must start with a letter.
static FULL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z\s\-']+$").expect("full name regex"));

/// International number: `+`, a nonzero leading digit, 8–15 digits total.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("phone regex"));

/// Outcome of validating a typed age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeValidation {
    Valid(u16),
    /// Not a plain number — re-prompt.
    BadFormat,
    /// Under 18 — re-prompt, the applicant may have mistyped.
    TooYoung(u16),
    /// Over 39 — disqualifies.
    TooOld(u16),
}

/// Outcome of a cesarean-count button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CesareanValidation {
    Valid(CountAnswer),
    /// Two or more — disqualifies.
    TooMany(CountAnswer),
}

/// Normalize a transport-provided contact phone to a leading `+`.
/// Contact shares are trusted; no further validation.
pub fn normalize_contact_phone(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('+') {
        raw.to_string()
    } else {
        format!("+{raw}")
    }
}

/// Validate a typed callback number. Returns the trimmed number when valid.
pub fn validate_phone(text: &str) -> Option<String> {
    let text = text.trim();
    PHONE_RE.is_match(text).then(|| text.to_string())
}

/// Validate a full name: Latin script only, at least two words.
pub fn validate_full_name(text: &str) -> Option<String> {
    let text = text.trim();
    if !FULL_NAME_RE.is_match(text) {
        return None;
    }
    if text.split_whitespace().count() < 2 {
        return None;
    }
    Some(text.to_string())
}

/// Validate a typed age.
pub fn validate_age(text: &str) -> AgeValidation {
    let Some(age) = parse_number(text) else {
        return AgeValidation::BadFormat;
    };
    if age < 18 {
        AgeValidation::TooYoung(age)
    } else if age > 39 {
        AgeValidation::TooOld(age)
    } else {
        AgeValidation::Valid(age)
    }
}

/// Validate a height in centimeters, 140–200 inclusive.
/// Format and range failures are not distinguished.
pub fn validate_height(text: &str) -> Option<u16> {
    parse_number(text).filter(|h| (140..=200).contains(h))
}

/// Validate a weight in kilograms, 40–150 inclusive.
pub fn validate_weight(text: &str) -> Option<u16> {
    parse_number(text).filter(|w| (40..=150).contains(w))
}

/// Parse a children-count button value. `None` for values outside the
/// button set (a forged or stale callback).
pub fn parse_children(value: &str) -> Option<CountAnswer> {
    match value {
        "more" => Some(CountAnswer::MoreThan(5)),
        _ => match value.parse::<u8>() {
            Ok(n) if n <= 5 => Some(CountAnswer::Exact(n)),
            _ => None,
        },
    }
}

/// Validate a cesarean-count button value. Any count of two or more
/// disqualifies; `None` for non-numeric values outside the button set.
pub fn validate_cesarean(value: &str) -> Option<CesareanValidation> {
    let answer = match value {
        "more" => CountAnswer::MoreThan(2),
        _ => CountAnswer::Exact(value.parse::<u8>().ok()?),
    };
    Some(match answer {
        CountAnswer::Exact(n) if n < 2 => CesareanValidation::Valid(answer),
        _ => CesareanValidation::TooMany(answer),
    })
}

/// Digits-only positive number. Rejects signs, spaces, and decimals.
fn parse_number(text: &str) -> Option<u16> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
