//! Phone-number harvest from free text read off chat screenshots.

use crate::error::UnitError;
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;

/// The single output column of a phone-number extraction.
pub const PHONE_COLUMN: &str = "Extracted Phone Numbers";

/// Shortest digit run still treated as a phone number.
const MIN_DIGITS: usize = 8;

static RE_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?\d[\d\s\(\)-]{8,}\d").unwrap());

/// Every phone-like run in `text`, reduced to digits, in order of appearance.
/// Duplicates are kept.
pub fn harvest(text: &str) -> Vec<String> {
    RE_PHONE
        .find_iter(text)
        .map(|m| crate::sanitize::digits_only(m.as_str()))
        .filter(|digits| digits.len() >= MIN_DIGITS)
        .collect()
}

/// [`crate::pipeline::llm::ReplyParser`] for the phone path: one record per
/// number. A reply with no numbers is a successful, empty unit.
pub fn parse_phone_reply(unit: usize, text: &str) -> Result<Vec<Record>, UnitError> {
    if text.trim().is_empty() {
        return Err(UnitError::EmptyResponse { unit });
    }
    Ok(harvest(text)
        .into_iter()
        .map(|number| [(PHONE_COLUMN, number)].into_iter().collect::<Record>())
        .collect())
}
