//! Extraction entry points: one operation per inbound kind.
//!
//! | Input | Operation | AI |
//! |-------|-----------|----|
//! | contact list / CRM export `.xlsx` | [`extract_sheet`] | no |
//! | spreadsheet screenshots | [`extract_images`] | one call per image |
//! | PDF | [`extract_pdf`] | one call per page |
//! | chat screenshots | [`extract_phone_numbers`] | one call per image |
//!
//! Every operation returns an [`ExtractionOutput`] whose table is never
//! empty: a run that collects nothing fails with
//! [`Table2XlsxError::NoData`]. The `*_to_artifact` variants also write the
//! table to the staging directory and return its download handle.

use crate::artifact::{ArtifactHandle, ArtifactStore};
use crate::assemble::{self, Assembler};
use crate::config::{ExtractionConfig, SheetLayout};
use crate::error::Table2XlsxError;
use crate::layout;
use crate::output::{ExtractionOutput, ExtractionStats, UnitResult};
use crate::pipeline::input::{self, Upload};
use crate::pipeline::llm::{self, LlmVisionClient, ReplyParser, UnitInput, VisionClient};
use crate::pipeline::{encode, phones, render};
use crate::prompts::{PDF_PAGE_PROMPT, PHONE_TEXT_PROMPT, TABLE_IMAGE_PROMPT};
use crate::sheet;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// Model used when none is configured; the extraction prompts were tuned on it.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const NO_AI_DATA: &str = "the AI could not extract any data";
const NO_PDF_DATA: &str = "the AI could not extract any data from the PDF";
const NO_PHONE_NUMBERS: &str = "could not extract any phone numbers from the uploaded images";

// ── Spreadsheets ─────────────────────────────────────────────────────────

/// Decode a contact-list or CRM-export workbook. No AI involved.
pub async fn extract_sheet(
    upload: &Upload,
    layout: SheetLayout,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Table2XlsxError> {
    let start = Instant::now();
    input::validate_sheet(upload)?;
    info!("Extracting {} from '{}'", layout, upload.name);

    let bytes = upload.bytes.clone();
    let name = upload.name.clone();
    let bounds = config.layout_bounds.clone();
    let table = tokio::task::spawn_blocking(move || {
        let grid = sheet::read_grid(&bytes, &name, layout.sheet_name())?;
        layout::decode(&grid, layout, &bounds)
    })
    .await
    .map_err(|e| Table2XlsxError::Internal(format!("Sheet task panicked: {e}")))??;

    let stats = ExtractionStats {
        total_records: table.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    Ok(ExtractionOutput {
        table,
        units: Vec::new(),
        stats,
    })
}

// ── AI paths ─────────────────────────────────────────────────────────────

/// Extract tables from spreadsheet screenshots, one AI call per image.
pub async fn extract_images<C: VisionClient>(
    uploads: &[Upload],
    client: &C,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Table2XlsxError> {
    if uploads.is_empty() {
        return Err(Table2XlsxError::NoInput {
            what: "images".into(),
        });
    }
    info!("Extracting tables from {} images", uploads.len());

    let prompt = config.prompt.as_deref().unwrap_or(TABLE_IMAGE_PROMPT);
    run_batch(
        client,
        prepare_images(uploads),
        prompt,
        assemble::parse_records,
        config,
        NO_AI_DATA,
    )
    .await
}

/// Extract tables from every page of a PDF, one AI call per page.
pub async fn extract_pdf<C: VisionClient>(
    upload: &Upload,
    client: &C,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Table2XlsxError> {
    let units = prepare_pdf(upload, config).await?;
    let prompt = config.prompt.as_deref().unwrap_or(PDF_PAGE_PROMPT);
    run_batch(
        client,
        units,
        prompt,
        assemble::parse_records,
        config,
        NO_PDF_DATA,
    )
    .await
}

/// Harvest phone numbers from chat screenshots.
pub async fn extract_phone_numbers<C: VisionClient>(
    uploads: &[Upload],
    client: &C,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Table2XlsxError> {
    if uploads.is_empty() {
        return Err(Table2XlsxError::NoInput {
            what: "chat screenshots".into(),
        });
    }
    info!("Harvesting phone numbers from {} images", uploads.len());

    run_batch(
        client,
        prepare_images(uploads),
        PHONE_TEXT_PROMPT,
        phones::parse_phone_reply,
        config,
        NO_PHONE_NUMBERS,
    )
    .await
}

/// Wrap uploaded images as units, 1-based in upload order.
pub fn prepare_images(uploads: &[Upload]) -> Vec<UnitInput> {
    uploads
        .iter()
        .enumerate()
        .map(|(i, upload)| UnitInput {
            unit: i + 1,
            label: upload.name.clone(),
            image: encode::encode_upload(i + 1, upload),
        })
        .collect()
}

/// Validate and rasterise a PDF; each page becomes one unit.
pub async fn prepare_pdf(
    upload: &Upload,
    config: &ExtractionConfig,
) -> Result<Vec<UnitInput>, Table2XlsxError> {
    input::validate_pdf(upload)?;

    let render_start = Instant::now();
    let rendered = render::render_pages(upload, config).await?;
    info!(
        "Rendered {} pages of '{}' in {}ms",
        rendered.len(),
        upload.name,
        render_start.elapsed().as_millis()
    );

    Ok(rendered
        .into_iter()
        .map(|(page, image)| UnitInput {
            unit: page,
            label: format!("page {page}"),
            image: image.and_then(|img| encode::encode_page(page, &img)),
        })
        .collect())
}

/// Send units one at a time, pausing `call_delay_ms` between AI calls, and
/// assemble whatever parsed.
async fn run_batch<C: VisionClient>(
    client: &C,
    units: Vec<UnitInput>,
    prompt: &str,
    parse: ReplyParser,
    config: &ExtractionConfig,
    no_data_context: &str,
) -> Result<ExtractionOutput, Table2XlsxError> {
    let start = Instant::now();
    let total = units.len();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let mut assembler = Assembler::new();
    let mut calls = 0usize;
    for UnitInput { unit, label, image } in units {
        if let Some(cb) = cb {
            cb.on_unit_start(unit, total);
        }

        let result = match image {
            Err(e) => UnitResult::failure(unit, label, e),
            Ok(image) => {
                if calls > 0 && config.call_delay_ms > 0 {
                    sleep(Duration::from_millis(config.call_delay_ms)).await;
                }
                calls += 1;
                llm::process_unit(client, unit, &label, prompt, image, parse, config).await
            }
        };

        if let Some(cb) = cb {
            match &result.error {
                None => cb.on_unit_complete(unit, total, result.records.len()),
                Some(e) => cb.on_unit_error(unit, total, &e.to_string()),
            }
        }
        debug!(
            "Unit {}/{}: {} records in {}ms",
            unit,
            total,
            result.records.len(),
            result.duration_ms
        );
        assembler.push(result);
    }

    let succeeded = assembler.units().iter().filter(|u| u.is_ok()).count();
    if let Some(cb) = cb {
        cb.on_batch_complete(total, succeeded);
    }

    let (table, units) = assembler.finish(no_data_context)?;
    let stats = ExtractionStats::from_units(&units, &table, start.elapsed().as_millis() as u64);
    info!(
        "Extraction complete: {}/{} units, {} records, {}ms",
        stats.processed_units, stats.total_units, stats.total_records, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        table,
        units,
        stats,
    })
}

// ── Artifact variants ────────────────────────────────────────────────────

async fn persist(
    output: ExtractionOutput,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, ArtifactHandle), Table2XlsxError> {
    let store = ArtifactStore::from_config(config).await?;
    let handle = store.write_table(&output.table).await?;
    Ok((output, handle))
}

/// [`extract_sheet`], then write the table as a downloadable artifact.
pub async fn extract_sheet_to_artifact(
    upload: &Upload,
    layout: SheetLayout,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, ArtifactHandle), Table2XlsxError> {
    persist(extract_sheet(upload, layout, config).await?, config).await
}

/// [`extract_images`], then write the table as a downloadable artifact.
pub async fn extract_images_to_artifact<C: VisionClient>(
    uploads: &[Upload],
    client: &C,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, ArtifactHandle), Table2XlsxError> {
    persist(extract_images(uploads, client, config).await?, config).await
}

/// [`extract_pdf`], then write the table as a downloadable artifact.
pub async fn extract_pdf_to_artifact<C: VisionClient>(
    upload: &Upload,
    client: &C,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, ArtifactHandle), Table2XlsxError> {
    persist(extract_pdf(upload, client, config).await?, config).await
}

/// [`extract_phone_numbers`], then write the table as a downloadable artifact.
pub async fn extract_phone_numbers_to_artifact<C: VisionClient>(
    uploads: &[Upload],
    client: &C,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, ArtifactHandle), Table2XlsxError> {
    persist(extract_phone_numbers(uploads, client, config).await?, config).await
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Build the production vision client from the configured provider chain.
pub fn resolve_client(config: &ExtractionConfig) -> Result<LlmVisionClient, Table2XlsxError> {
    Ok(LlmVisionClient::new(resolve_provider(config)?, config))
}

/// Resolve the LLM provider, most specific first:
///
/// 1. `config.provider`, used as-is;
/// 2. `config.provider_name` with `config.model` (or that provider's default);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set;
/// 4. Gemini, when `GEMINI_API_KEY` is set;
/// 5. whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Table2XlsxError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Table2XlsxError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY), or pass --provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(llm_provider)
}

/// A vision-capable default model for a named provider.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4.1-mini",
        "anthropic" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        _ => DEFAULT_MODEL,
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Table2XlsxError> {
    debug!("Creating provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Table2XlsxError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_workbook;
    use crate::error::UnitError;
    use crate::pipeline::llm::VisionReply;
    use crate::progress::ExtractionProgressCallback;
    use edgequake_llm::ImageData;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    /// Replies in order; `None` simulates a transport failure.
    struct Scripted {
        replies: Mutex<VecDeque<Option<&'static str>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[Option<&'static str>]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().copied().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl VisionClient for Scripted {
        async fn describe(
            &self,
            unit: usize,
            prompt: &str,
            _image: ImageData,
        ) -> Result<VisionReply, UnitError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front().flatten() {
                Some(text) => Ok(VisionReply::text(text)),
                None => Err(UnitError::LlmFailed {
                    unit,
                    detail: "HTTP 503".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct Counts {
        complete: Mutex<Vec<usize>>,
        errors: Mutex<Vec<usize>>,
        finished: Mutex<Option<(usize, usize)>>,
    }

    impl ExtractionProgressCallback for Counts {
        fn on_unit_complete(&self, unit: usize, _total: usize, _records: usize) {
            self.complete.lock().unwrap().push(unit);
        }
        fn on_unit_error(&self, unit: usize, _total: usize, _error: &str) {
            self.errors.lock().unwrap().push(unit);
        }
        fn on_batch_complete(&self, total: usize, success: usize) {
            *self.finished.lock().unwrap() = Some((total, success));
        }
    }

    fn image(name: &str) -> Upload {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest");
        Upload::new(name, bytes)
    }

    fn fast_config() -> ExtractionConfig {
        ExtractionConfig::builder().call_delay_ms(0).build().unwrap()
    }

    #[tokio::test]
    async fn images_survive_a_bad_unit() {
        let client = Scripted::new(&[
            Some(r#"[{"Customer": "Ada", "Mobile": 5550100}]"#),
            Some("Sorry, the image is blurry."),
            Some("```json\n[{\"Customer\": \"Cy\", \"AI\": \"#7\"}]\n```"),
        ]);
        let uploads = [image("a.png"), image("b.png"), image("c.png")];
        let out = extract_images(&uploads, &client, &fast_config()).await.unwrap();

        assert_eq!(out.table.len(), 2);
        assert_eq!(out.table.headers(), &["Customer", "Mobile", "AI"]);
        assert_eq!(out.table.records()[0].get("Mobile"), Some("5550100"));
        assert_eq!(out.table.records()[1].get("AI"), Some("7"));
        assert_eq!(out.stats.failed_units, 1);
        assert!(client.prompts.lock().unwrap().iter().all(|p| p == TABLE_IMAGE_PROMPT));
    }

    #[tokio::test]
    async fn unreadable_image_skips_the_call() {
        let client = Scripted::new(&[Some(r#"[{"A": "1"}]"#)]);
        let uploads = [Upload::new("notes.png", b"plain text".to_vec()), image("b.png")];
        let counts = Arc::new(Counts::default());
        let config = ExtractionConfig::builder()
            .call_delay_ms(0)
            .progress_callback(counts.clone())
            .build()
            .unwrap();

        let out = extract_images(&uploads, &client, &config).await.unwrap();
        assert_eq!(out.table.len(), 1);
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
        assert_eq!(*counts.errors.lock().unwrap(), vec![1]);
        assert_eq!(*counts.complete.lock().unwrap(), vec![2]);
        assert_eq!(*counts.finished.lock().unwrap(), Some((2, 1)));
    }

    #[tokio::test]
    async fn every_unit_failing_is_no_data() {
        let client = Scripted::new(&[None, Some("[]")]);
        let uploads = [image("a.png"), image("b.png")];
        let err = extract_images(&uploads, &client, &fast_config())
            .await
            .unwrap_err();
        assert!(err.is_no_data(), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let client = Scripted::new(&[]);
        let err = extract_images(&[], &client, &fast_config()).await.unwrap_err();
        assert!(matches!(err, Table2XlsxError::NoInput { .. }));
    }

    #[tokio::test]
    async fn phone_numbers_use_text_prompt() {
        let client = Scripted::new(&[
            Some("Ravi +91 98765 43210\nMeera 98450-12345"),
            Some("no numbers in this chat"),
        ]);
        let uploads = [image("chat1.png"), image("chat2.png")];
        let out = extract_phone_numbers(&uploads, &client, &fast_config())
            .await
            .unwrap();

        assert_eq!(out.table.headers(), &[phones::PHONE_COLUMN]);
        let numbers: Vec<&str> = out
            .table
            .records()
            .iter()
            .filter_map(|r| r.get(phones::PHONE_COLUMN))
            .collect();
        assert_eq!(numbers, vec!["919876543210", "9845012345"]);
        assert_eq!(client.prompts.lock().unwrap()[0], PHONE_TEXT_PROMPT);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_the_delay() {
        let client = Scripted::new(&[Some("[]"), Some("[]"), Some(r#"[{"A": "1"}]"#)]);
        let uploads = [image("a.png"), image("b.png"), image("c.png")];
        let config = ExtractionConfig::builder().call_delay_ms(1000).build().unwrap();

        let started = tokio::time::Instant::now();
        extract_images(&uploads, &client, &config).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn sheet_wrong_extension_is_rejected() {
        let upload = Upload::new("leads.csv", b"PK\x03\x04".to_vec());
        let err = extract_sheet(&upload, SheetLayout::ContactList, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Table2XlsxError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn contact_list_sheet_end_to_end() {
        let rows: Vec<Vec<String>> = [
            vec!["Preview", "x"],
            vec!["Ada", "ada_l@example.com", "ID-0042", "Sam", "Open", "2024-01-02", "Web", "Lead"],
            vec![],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect();
        let bytes = write_workbook("Sheet1", &rows).unwrap();

        let out = extract_sheet(
            &Upload::new("contacts.xlsx", bytes),
            SheetLayout::ContactList,
            &fast_config(),
        )
        .await
        .unwrap();
        assert_eq!(out.table.len(), 1);
        let rec = &out.table.records()[0];
        assert_eq!(rec.get("Email"), Some("adal@example.com"));
        assert_eq!(rec.get("ID"), Some("0042"));
        assert_eq!(out.stats.total_records, 1);
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model_for("gemini"), DEFAULT_MODEL);
        assert_eq!(default_model_for("mistral"), "pixtral-12b-2409");
    }
}
