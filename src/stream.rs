//! Streaming extraction: yield each unit's outcome as soon as it is known.
//!
//! The eager entry points in [`crate::extract`] return only after the whole
//! batch. [`extract_stream`] hands back a `Stream` instead, so a caller can
//! show rows page by page. Units still go out one at a time, in order, with
//! the same inter-call delay and per-call timeout; nothing is assembled, so
//! an all-failed batch is simply a stream of failed [`UnitResult`]s.
//!
//! Build the units with [`crate::extract::prepare_images`] or
//! [`crate::extract::prepare_pdf`].

use crate::assemble;
use crate::config::ExtractionConfig;
use crate::output::UnitResult;
use crate::pipeline::llm::{self, ReplyParser, UnitInput, VisionClient};
use crate::prompts::TABLE_IMAGE_PROMPT;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of unit outcomes, in unit order.
pub type UnitStream = Pin<Box<dyn Stream<Item = UnitResult> + Send>>;

/// Stream table rows unit by unit, using the configured table prompt.
pub fn extract_stream<C: VisionClient + 'static>(
    units: Vec<UnitInput>,
    client: Arc<C>,
    config: &ExtractionConfig,
) -> UnitStream {
    let prompt = config
        .prompt
        .clone()
        .unwrap_or_else(|| TABLE_IMAGE_PROMPT.to_string());
    extract_stream_with(units, client, prompt, assemble::parse_records, config)
}

/// Like [`extract_stream`] with an explicit prompt and reply parser, e.g.
/// [`crate::pipeline::phones::parse_phone_reply`].
pub fn extract_stream_with<C: VisionClient + 'static>(
    units: Vec<UnitInput>,
    client: Arc<C>,
    prompt: impl Into<String>,
    parse: ReplyParser,
    config: &ExtractionConfig,
) -> UnitStream {
    let total = units.len();
    let prompt = prompt.into();
    let config = config.clone();
    info!("Starting streaming extraction of {} units", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // Counts calls actually sent; the delay only separates real calls.
    let calls = Arc::new(AtomicUsize::new(0));

    let s = stream::iter(units).then(move |input| {
        let client = Arc::clone(&client);
        let prompt = prompt.clone();
        let cfg = config.clone();
        let calls = Arc::clone(&calls);
        async move {
            let UnitInput { unit, label, image } = input;
            if let Some(ref cb) = cfg.progress_callback {
                cb.on_unit_start(unit, total);
            }

            let result = match image {
                Err(e) => UnitResult::failure(unit, label, e),
                Ok(image) => {
                    if calls.fetch_add(1, Ordering::SeqCst) > 0 && cfg.call_delay_ms > 0 {
                        sleep(Duration::from_millis(cfg.call_delay_ms)).await;
                    }
                    llm::process_unit(&*client, unit, &label, &prompt, image, parse, &cfg).await
                }
            };

            if let Some(ref cb) = cfg.progress_callback {
                match &result.error {
                    None => cb.on_unit_complete(unit, total, result.records.len()),
                    Some(e) => cb.on_unit_error(unit, total, &e.to_string()),
                }
            }
            result
        }
    });

    Box::pin(s)
}
