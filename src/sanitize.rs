//! Per-column cleanup of extracted values.
//!
//! Each rule is a regex replacement that removes characters and never adds
//! any, so applying a rule to already-clean data is a no-op.

use crate::record::Table;
use once_cell::sync::Lazy;
use regex::Regex;

/// Columns that hold identifiers or phone numbers on the AI path. Their
/// values are coerced to strings and reduced to digits.
pub const AI_NUMERIC_COLUMNS: [&str; 4] = ["Mobile", "Phone No", "ID", "AI"];

static RE_NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").unwrap());
static RE_EMAIL_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\s]").unwrap());

/// Keep only ASCII decimal digits.
pub fn digits_only(value: &str) -> String {
    RE_NON_DIGIT.replace_all(value, "").into_owned()
}

/// Remove underscores and whitespace.
pub fn clean_email(value: &str) -> String {
    RE_EMAIL_JUNK.replace_all(value, "").into_owned()
}

/// Layout A rules: `ID` to digits, `Email` without `_`/whitespace.
pub fn sanitize_contact_list(table: &mut Table) {
    table.map_column("ID", digits_only);
    table.map_column("Email", clean_email);
}

/// Layout B rules: `Phone No` to digits.
pub fn sanitize_crm_export(table: &mut Table) {
    table.map_column("Phone No", digits_only);
}

/// AI-path rules: every column in [`AI_NUMERIC_COLUMNS`] to digits.
pub fn sanitize_ai_table(table: &mut Table) {
    for column in AI_NUMERIC_COLUMNS {
        table.map_column(column, digits_only);
    }
}
