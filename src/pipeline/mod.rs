//! Pipeline stages for the AI extraction paths (images, PDFs, screenshots).
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ assemble / phones
//! (path/URL) (pdfium)  (base64)  (vision)  (rows)
//! ```
//!
//! 1. [`input`]  — load a local file or download a URL into an [`input::Upload`]
//!    and validate it for the entry point
//! 2. [`render`] — rasterise PDF pages; runs in `spawn_blocking`
//! 3. [`encode`] — PNG/base64 wrap for the multimodal request
//! 4. [`llm`]    — one timed call per unit through a [`llm::VisionClient`]
//! 5. [`phones`] — phone-number harvest for the screenshot path; the table
//!    paths parse replies with [`crate::assemble::parse_records`]

pub mod encode;
pub mod input;
pub mod llm;
pub mod phones;
pub mod render;
