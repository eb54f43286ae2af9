//! PDF rasterisation: render document pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium keeps thread-local state and is not safe to drive from async
//! contexts. `tokio::task::spawn_blocking` moves rendering onto the blocking
//! pool so Tokio workers keep serving the queue while a job rasterises.
//!
//! ## Why bytes, not paths?
//!
//! Every document the worker touches comes out of [`crate::jobs::storage`]
//! as a byte buffer. pdfium loads from a slice just as well, so nothing is
//! written to disk on the way to the model.
//!
//! ## Binding
//!
//! The library is bound at runtime: `PDFIUM_LIB_PATH` (a file or the
//! directory holding it) wins, otherwise the system library is used.

use crate::error::AssignmentError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment variable pointing at the pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterise the first `max_pages` pages of a PDF held in memory.
pub async fn render_pdf_bytes(
    bytes: Vec<u8>,
    dpi: u32,
    max_pixels: u32,
    max_pages: usize,
) -> Result<Vec<DynamicImage>, AssignmentError> {
    tokio::task::spawn_blocking(move || render_blocking(&bytes, dpi, max_pixels, max_pages))
        .await
        .map_err(|e| AssignmentError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind pdfium from `PDFIUM_LIB_PATH` or the system library.
pub fn bind_pdfium() -> Result<Pdfium, AssignmentError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(raw) => {
            let path = PathBuf::from(raw);
            let path = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AssignmentError::Internal(format!("pdfium library unavailable: {:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_blocking(
    bytes: &[u8],
    dpi: u32,
    max_pixels: u32,
    max_pages: usize,
) -> Result<Vec<DynamicImage>, AssignmentError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| AssignmentError::malformed(format!("document could not be opened: {:?}", e)))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("Source PDF loaded: {} pages", total);
    if total > max_pages {
        warn!(
            "Only the first {} of {} pages are sent to the model",
            max_pages, total
        );
    }

    // Letter width at the requested DPI, capped on both edges.
    let target_width = ((8.5 * dpi as f32) as u32).min(max_pixels) as i32;
    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total.min(max_pages));
    for (idx, page) in pages.iter().enumerate().take(max_pages) {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            AssignmentError::upstream("render", format!("page {}: {:?}", idx + 1, e))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    if images.is_empty() {
        return Err(AssignmentError::malformed("document has no pages"));
    }
    Ok(images)
}
