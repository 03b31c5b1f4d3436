//! Prompts sent alongside each unit image.
//!
//! [`crate::config::ExtractionConfig::prompt`] overrides the two table
//! prompts; the phone-number prompt is fixed because the harvest runs a
//! regex over free text rather than parsing JSON.

/// Prompt for a screenshot or photo of a spreadsheet.
pub const TABLE_IMAGE_PROMPT: &str = r#"Analyze the following image of a spreadsheet. Extract all the tabular data and return it as a valid JSON array of objects.

Rules:
- Each object is one row of the table.
- Use the actual column headers visible in the image as the object keys.
- Fill missing values with empty strings.
- Do not skip any rows or columns.
- Return ONLY the JSON array, with no commentary."#;

/// Prompt for one rasterised PDF page. A page without a table must yield
/// `[]` so it contributes nothing instead of failing.
pub const PDF_PAGE_PROMPT: &str = r#"Analyze the image of this document page. Extract all tabular data and return it as a valid JSON array of objects.

Rules:
- Each object is one row of a table on the page.
- Use the table's column headers as the object keys.
- Fill missing values with empty strings.
- If there is no table on this page, return an empty array [].
- Return ONLY the JSON array, with no commentary."#;

/// Prompt for chat screenshots whose text is scanned for phone numbers.
pub const PHONE_TEXT_PROMPT: &str = "Extract all text from the following image.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_prompts_ask_for_json_arrays() {
        for prompt in [TABLE_IMAGE_PROMPT, PDF_PAGE_PROMPT] {
            assert!(prompt.contains("JSON array of objects"));
            assert!(prompt.contains("empty strings"));
        }
        assert!(PDF_PAGE_PROMPT.contains("return an empty array []"));
    }
}
