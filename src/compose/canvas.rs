//! In-memory page model produced by the layout code and consumed by the PDF
//! writer.
//!
//! Layout never talks to lopdf directly. It records [`DrawOp`]s on a
//! [`Page`]; [`crate::compose::pdf::write_pdf`] turns a [`Document`] into
//! bytes. This keeps pagination testable without parsing PDF output.

use super::fonts::FontRole;
use std::sync::Arc;

/// RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::grey(0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn grey(v: f32) -> Self {
        Self { r: v, g: v, b: v }
    }
}

/// Decoded RGB8 raster, used for the cover logo.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Packed RGB triples, row-major, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

/// One drawing instruction in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        role: FontRole,
        color: Color,
        text: String,
    },
    Rule {
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
        color: Color,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Color>,
        stroke: Option<(Color, f32)>,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: Arc<RasterImage>,
    },
}

/// A laid-out page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based number within its fragment.
    pub number: u32,
    /// Header banner suppressed (ToC and reference pages).
    pub is_special: bool,
    pub width: f32,
    pub height: f32,
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn new(number: u32, is_special: bool, width: f32, height: f32) -> Self {
        Self {
            number,
            is_special,
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, role: FontRole, color: Color) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            size,
            role,
            color,
            text: text.into(),
        });
    }

    pub fn rule(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Color) {
        self.ops.push(DrawOp::Rule {
            from,
            to,
            thickness,
            color,
        });
    }

    pub fn rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Color>,
        stroke: Option<(Color, f32)>,
    ) {
        self.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        });
    }

    pub fn image(&mut self, image: Arc<RasterImage>, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::Image {
            x,
            y,
            width,
            height,
            image,
        });
    }

    /// All text runs on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Text ops with their positions; handy for layout assertions.
    pub fn text_ops(&self) -> impl Iterator<Item = (&str, f32, f32, f32)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text {
                text, x, y, size, ..
            } => Some((text.as_str(), *x, *y, *size)),
            _ => None,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Rule { .. }))
            .count()
    }
}

/// The pages of one fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every text run of the document joined by single spaces.
    pub fn all_text(&self) -> String {
        self.pages
            .iter()
            .flat_map(|p| p.texts())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
