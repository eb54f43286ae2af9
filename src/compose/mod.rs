//! Markdown-to-PDF composition engine.
//!
//! ```text
//! generated text
//!  │
//!  ├─ inline    **bold** / *italic* / _italic_ → spans
//!  ├─ wrap      spans → lines that fit the content width
//!  ├─ paginate  lines → pages (page breaks, overflow, chrome)
//!  │   └─ toc   ToC segments: dot leaders, fixed number column
//!  ├─ pdf       pages → PDF bytes (base-14 fonts, lopdf)
//!  └─ merge     [cover?, outline?, references?, body] → one PDF
//! ```
//!
//! Everything here is synchronous and CPU-only; the worker runs it inside
//! `spawn_blocking`.

pub mod blocks;
pub mod canvas;
pub mod cover;
pub mod fonts;
pub mod inline;
pub mod merge;
pub mod paginate;
pub mod pdf;
pub mod toc;
pub mod wrap;

pub use canvas::Document;
pub use cover::{CoverDetails, Submitter};
pub use fonts::{FontRegistry, FontRole};
pub use inline::Span;
pub use merge::{assemble, merge, normalize_cover, page_count, Fragments};
pub use paginate::{paginate, split_segments, SegmentMode};

use crate::config::PageLayout;
use crate::error::AssignmentError;

/// Which generated fragment a text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Body,
    Outline,
    References,
}

impl FragmentKind {
    pub fn segment_mode(self) -> SegmentMode {
        match self {
            FragmentKind::Body => SegmentMode::Detect,
            FragmentKind::Outline => SegmentMode::Toc,
            FragmentKind::References => SegmentMode::Special,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FragmentKind::Body => "body",
            FragmentKind::Outline => "outline",
            FragmentKind::References => "references",
        }
    }
}

/// Paginate generated text and write it as a standalone PDF fragment.
pub fn compose_fragment(
    kind: FragmentKind,
    text: &str,
    layout: &PageLayout,
    header_title: Option<&str>,
) -> Result<Vec<u8>, AssignmentError> {
    let fonts = FontRegistry::standard();
    let banner = match kind {
        FragmentKind::Body => header_title,
        FragmentKind::Outline | FragmentKind::References => None,
    };
    let doc = paginate(text, &fonts, layout, banner, kind.segment_mode());
    pdf::write_pdf(&doc, &fonts)
}

/// Render a cover page from details, drawing `logo` when it decodes.
pub fn compose_cover(
    details: &CoverDetails,
    logo: Option<&[u8]>,
    layout: &PageLayout,
) -> Result<Vec<u8>, AssignmentError> {
    let fonts = FontRegistry::standard();
    let logo = logo.and_then(cover::decode_logo);
    let doc = cover::render_cover(details, logo, &fonts, layout);
    pdf::write_pdf(&doc, &fonts)
}
