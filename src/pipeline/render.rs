//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium is a blocking C library, so binding, loading and rendering all
//! happen inside one `spawn_blocking` task.
//!
//! Pages are scaled to the configured DPI (a PDF point is 1/72 inch) and the
//! longest edge is then capped at `max_rendered_pixels`, so a poster-sized
//! page cannot blow up memory.

use crate::config::ExtractionConfig;
use crate::error::{Table2XlsxError, UnitError};
use crate::pipeline::input::Upload;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// One page's rasterisation outcome. `page` is 1-based.
pub type RenderedPage = (usize, Result<DynamicImage, UnitError>);

/// Rasterise every page of `upload`.
///
/// A page that fails to render is returned as an error for that page only.
/// Binding or document-level failures are fatal.
pub async fn render_pages(
    upload: &Upload,
    config: &ExtractionConfig,
) -> Result<Vec<RenderedPage>, Table2XlsxError> {
    let bytes = upload.bytes.clone();
    let name = upload.name.clone();
    let scale = scale_for_dpi(config.dpi);
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_path.as_deref())?;
        render_pages_blocking(
            &pdfium,
            &bytes,
            &name,
            scale,
            max_pixels,
            password.as_deref(),
        )
    })
    .await
    .map_err(|e| Table2XlsxError::Internal(format!("Render task panicked: {e}")))?
}

/// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, Table2XlsxError> {
    let from_env = std::env::var_os(PDFIUM_LIB_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let bindings = match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                Table2XlsxError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display()))
            })?
        }
        None => Pdfium::bind_to_system_library().map_err(|e| {
            Table2XlsxError::PdfiumBindingFailed(format!(
                "no system pdfium library ({e:?}); set {PDFIUM_LIB_ENV}"
            ))
        })?,
    };

    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    pdfium: &Pdfium,
    bytes: &[u8],
    name: &str,
    scale: f32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<RenderedPage>, Table2XlsxError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let detail = format!("{e:?}");
            let detail = if detail.contains("Password") {
                format!("password required or incorrect ({detail})")
            } else {
                detail
            };
            Table2XlsxError::CorruptPdf {
                name: name.to_string(),
                detail,
            }
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total);
    for idx in 0..total {
        let page_num = idx + 1;
        let rendered =
            render_page(&pages, idx, &render_config).map_err(|e| UnitError::RenderFailed {
                unit: page_num,
                detail: format!("{e:?}"),
            });

        match &rendered {
            Ok(image) => debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            ),
            Err(e) => warn!("{}", e),
        }
        results.push((page_num, rendered));
    }

    Ok(results)
}

fn render_page(
    pages: &PdfPages,
    idx: usize,
    render_config: &PdfRenderConfig,
) -> Result<DynamicImage, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let bitmap = page.render_with_config(render_config)?;
    Ok(bitmap.as_image())
}

/// Render scale for a DPI; PDF user space is 72 units per inch.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpi_scale() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert!((scale_for_dpi(200) - 2.777_778).abs() < 1e-4);
    }

    #[test]
    fn explicit_missing_library_fails_to_bind() {
        match bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))) {
            Err(Table2XlsxError::PdfiumBindingFailed(msg)) => assert!(msg.contains("/nonexistent")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("bound a library that does not exist"),
        }
    }
}
