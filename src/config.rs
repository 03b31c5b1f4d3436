//! Configuration types for table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The spreadsheet layouts are described
//! by [`SheetLayout`], and their fixed row/column offsets by [`LayoutBounds`].

use crate::error::Table2XlsxError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

/// Fixed offsets of the CRM export sheet.
pub mod layout_bounds {
    use std::ops::Range;

    /// Rows holding the repeating 9-cell blocks in column 0.
    pub const BLOCK_ROWS: Range<usize> = 0..1535;
    /// Tokens per repeating block.
    pub const BLOCK_STRIDE: usize = 9;
    /// Rows holding the tabular region.
    pub const STRUCTURED_ROWS: Range<usize> = 1535..1668;
    /// Columns of the tabular region that map onto the 8 headers.
    pub const STRUCTURED_COLS: Range<usize> = 2..10;
    /// Sentinel that marks a non-data row in the contact list.
    pub const PREVIEW_SENTINEL: &str = "Preview";
}

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_table2xlsx::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(150)
///     .call_delay_ms(500)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps either dimension, scaling the other proportionally, so a large
    /// page format at high DPI cannot exhaust memory or exceed upload limits.
    pub max_rendered_pixels: u32,

    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per unit. Default: 8192.
    ///
    /// A dense spreadsheet screenshot serialised as JSON easily runs past
    /// 4 000 tokens; truncation mid-array makes the whole unit unparseable.
    pub max_tokens: usize,

    /// Pause between consecutive AI calls in milliseconds. Default: 1000.
    ///
    /// Calls are strictly sequential; this delay keeps a batch under
    /// per-minute request quotas of free-tier keys.
    pub call_delay_ms: u64,

    /// Per-AI-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom table-extraction prompt. If None, uses the built-in prompts.
    pub prompt: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory receiving generated artifacts. Default: `temp_downloads`.
    pub staging_dir: PathBuf,

    /// Artifacts older than this are evicted by the sweep. Default: 3600.
    pub artifact_ttl_secs: u64,

    /// Explicit pdfium shared library. If None, `PDFIUM_LIB_PATH` and then
    /// the system library search path are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Offsets used by the CRM export decoder.
    pub layout_bounds: LayoutBounds,

    /// Optional per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            call_delay_ms: 1000,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            prompt: None,
            password: None,
            staging_dir: PathBuf::from("temp_downloads"),
            artifact_ttl_secs: 3600,
            pdfium_lib_path: None,
            layout_bounds: LayoutBounds::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("call_delay_ms", &self.call_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("staging_dir", &self.staging_dir)
            .field("artifact_ttl_secs", &self.artifact_ttl_secs)
            .field("layout_bounds", &self.layout_bounds)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn call_delay_ms(mut self, ms: u64) -> Self {
        self.config.call_delay_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn artifact_ttl_secs(mut self, secs: u64) -> Self {
        self.config.artifact_ttl_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn layout_bounds(mut self, bounds: LayoutBounds) -> Self {
        self.config.layout_bounds = bounds;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Table2XlsxError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Table2XlsxError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(Table2XlsxError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.artifact_ttl_secs == 0 {
            return Err(Table2XlsxError::InvalidConfig(
                "Artifact TTL must be ≥ 1 second".into(),
            ));
        }
        c.layout_bounds.validate()?;
        Ok(self.config)
    }
}

// ── Layouts ──────────────────────────────────────────────────────────────

/// The two recognised raw spreadsheet shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetLayout {
    /// One contact per row, read from `Sheet1`.
    ContactList,
    /// Repeating 9-cell blocks followed by a tabular region, read from `Sheet2`.
    CrmExport,
}

impl SheetLayout {
    /// Worksheet the layout is read from.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            SheetLayout::ContactList => "Sheet1",
            SheetLayout::CrmExport => "Sheet2",
        }
    }

    /// Declared output header for the layout.
    pub fn headers(&self) -> [&'static str; 8] {
        match self {
            SheetLayout::ContactList => [
                "Name",
                "Email",
                "ID",
                "Assigned To",
                "Status",
                "Date",
                "Source",
                "Type",
            ],
            SheetLayout::CrmExport => [
                "Client Name",
                "Email",
                "Phone No",
                "Owned By",
                "Status",
                "Created At",
                "Source",
                "Contact Type",
            ],
        }
    }
}

impl fmt::Display for SheetLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetLayout::ContactList => f.write_str("contact list"),
            SheetLayout::CrmExport => f.write_str("CRM export"),
        }
    }
}

/// Row/column offsets of the CRM export sheet.
///
/// Defaults come from [`layout_bounds`]. Ranges are half-open and are clamped
/// to the grid when applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBounds {
    pub block_rows: Range<usize>,
    pub block_stride: usize,
    pub structured_rows: Range<usize>,
    pub structured_cols: Range<usize>,
}

impl Default for LayoutBounds {
    fn default() -> Self {
        Self {
            block_rows: layout_bounds::BLOCK_ROWS,
            block_stride: layout_bounds::BLOCK_STRIDE,
            structured_rows: layout_bounds::STRUCTURED_ROWS,
            structured_cols: layout_bounds::STRUCTURED_COLS,
        }
    }
}

impl LayoutBounds {
    /// Minimum number of grid columns the tabular region needs.
    pub fn structured_min_width(&self) -> usize {
        self.structured_cols.end
    }

    pub(crate) fn validate(&self) -> Result<(), Table2XlsxError> {
        // Chunk positions 0 and 2..=8 are read.
        if self.block_stride < 9 {
            return Err(Table2XlsxError::InvalidConfig(format!(
                "block stride must be ≥ 9, got {}",
                self.block_stride
            )));
        }
        if self.structured_cols.len() != 8 {
            return Err(Table2XlsxError::InvalidConfig(format!(
                "structured region must span exactly 8 columns, got {:?}",
                self.structured_cols
            )));
        }
        Ok(())
    }
}
