//! # edgequake-table2xlsx
//!
//! Pull tabular data out of spreadsheets, screenshots and PDFs and hand it
//! back as a clean `.xlsx` file.
//!
//! Two kinds of input are handled:
//!
//! * **Raw CRM workbooks** in one of two fixed shapes ([`SheetLayout`]),
//!   decoded positionally with no AI involved.
//! * **Images and PDFs**, sent unit by unit (one image or one rendered page)
//!   to a vision model that answers with a JSON array of rows. Chat
//!   screenshots can also be scanned for phone numbers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ xlsx ──▶ sheet (calamine) ──▶ layout decode ──┐
//!  │                                                 │
//!  ├─ image ─────────────┐                           ├─▶ normalise + sanitise ──▶ artifact (.xlsx)
//!  ├─ pdf ──▶ render ────┼─▶ encode ──▶ vision AI ──┘
//!  └─ chat ──────────────┘        (assemble / phones)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_table2xlsx::{
//!     extract_pdf_to_artifact, input, resolve_client, ArtifactStore, ExtractionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected; GEMINI_API_KEY selects gemini-2.5-flash.
//!     let config = ExtractionConfig::default();
//!     let client = resolve_client(&config)?;
//!
//!     let upload = input::load("invoices.pdf", config.download_timeout_secs).await?;
//!     let (output, handle) = extract_pdf_to_artifact(&upload, &client, &config).await?;
//!     eprintln!("{} rows, handle {}", output.table.len(), handle);
//!
//!     let store = ArtifactStore::from_config(&config).await?;
//!     std::fs::write("invoices.xlsx", store.take(Some(&handle)).await?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `table2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod assemble;
pub mod config;
pub mod error;
pub mod extract;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod sanitize;
pub mod sheet;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ArtifactHandle, ArtifactStore};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, LayoutBounds, SheetLayout};
pub use error::{Table2XlsxError, UnitError};
pub use extract::{
    extract_images, extract_images_to_artifact, extract_pdf, extract_pdf_to_artifact,
    extract_phone_numbers, extract_phone_numbers_to_artifact, extract_sheet,
    extract_sheet_to_artifact, prepare_images, prepare_pdf, resolve_client, resolve_provider,
};
pub use output::{ExtractionOutput, ExtractionStats, UnitResult};
pub use pipeline::input::{self, Upload};
pub use pipeline::llm::{LlmVisionClient, UnitInput, VisionClient, VisionReply};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{Record, Table};
pub use stream::{extract_stream, extract_stream_with, UnitStream};
