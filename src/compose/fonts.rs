//! Font registry and text measurement.
//!
//! Every fragment is drawn with the PDF base-14 fonts, so no font program is
//! embedded and measurement only needs the standard AFM advance widths. The
//! tables below cover printable ASCII (32–126); any other character is
//! measured with the face's fallback width. The writer encodes text as
//! WinAnsi, see [`crate::compose::pdf`].
//!
//! Components never pass font handles around: they name a [`FontRole`] and
//! resolve it through the single [`FontRegistry`] of the document.

use serde::{Deserialize, Serialize};

/// Logical font roles used by the layout code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FontRole {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    /// Document title (serif bold).
    Title,
    /// Serif body face, used for filled-in values on the cover page.
    Serif,
}

impl FontRole {
    pub const ALL: [FontRole; 6] = [
        FontRole::Regular,
        FontRole::Bold,
        FontRole::Italic,
        FontRole::BoldItalic,
        FontRole::Title,
        FontRole::Serif,
    ];

    /// Resolve the face for a styled run drawn on top of `self`.
    ///
    /// Plain runs keep the block's base role (a plain run inside a heading
    /// stays in the heading face); any explicit style overrides it.
    pub fn styled(self, bold: bool, italic: bool) -> FontRole {
        match (bold, italic) {
            (true, true) => FontRole::BoldItalic,
            (true, false) => FontRole::Bold,
            (false, true) => FontRole::Italic,
            (false, false) => self,
        }
    }

    fn index(self) -> usize {
        match self {
            FontRole::Regular => 0,
            FontRole::Bold => 1,
            FontRole::Italic => 2,
            FontRole::BoldItalic => 3,
            FontRole::Title => 4,
            FontRole::Serif => 5,
        }
    }
}

/// One base-14 face and its metrics.
#[derive(Debug)]
pub struct FontFace {
    /// PostScript name written as `/BaseFont`.
    pub base_font: &'static str,
    /// Resource name used in content streams (`/F1`, `/F2`, …).
    pub resource: &'static str,
    widths: &'static [u16; 95],
    fallback: u16,
}

impl FontFace {
    /// Advance width of one character in 1/1000 em.
    pub fn advance(&self, ch: char) -> u16 {
        let code = ch as u32;
        if (32..=126).contains(&code) {
            self.widths[(code - 32) as usize]
        } else {
            self.fallback
        }
    }
}

/// The fonts of one document, keyed by [`FontRole`].
#[derive(Debug)]
pub struct FontRegistry {
    faces: [FontFace; 6],
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FontRegistry {
    /// Helvetica family for text, Times for the title and cover values.
    pub fn standard() -> Self {
        Self {
            faces: [
                FontFace {
                    base_font: "Helvetica",
                    resource: "F1",
                    widths: &HELVETICA,
                    fallback: 556,
                },
                FontFace {
                    base_font: "Helvetica-Bold",
                    resource: "F2",
                    widths: &HELVETICA_BOLD,
                    fallback: 556,
                },
                FontFace {
                    base_font: "Helvetica-Oblique",
                    resource: "F3",
                    widths: &HELVETICA,
                    fallback: 556,
                },
                FontFace {
                    base_font: "Helvetica-BoldOblique",
                    resource: "F4",
                    widths: &HELVETICA_BOLD,
                    fallback: 556,
                },
                FontFace {
                    base_font: "Times-Bold",
                    resource: "F5",
                    widths: &TIMES_BOLD,
                    fallback: 500,
                },
                FontFace {
                    base_font: "Times-Roman",
                    resource: "F6",
                    widths: &TIMES_ROMAN,
                    fallback: 500,
                },
            ],
        }
    }

    pub fn face(&self, role: FontRole) -> &FontFace {
        &self.faces[role.index()]
    }

    /// Rendered width of `text` at `size` points.
    pub fn width_of(&self, role: FontRole, text: &str, size: f32) -> f32 {
        let face = self.face(role);
        let units: u32 = text.chars().map(|c| face.advance(c) as u32).sum();
        units as f32 * size / 1000.0
    }
}

// ── AFM advance widths, characters 32..=126 ──────────────────────────────

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    333, 333, 570, 570, 570, 500, 930,
    722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944,
    722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
    333, 278, 333, 581, 500, 333,
    500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833,
    556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
    394, 220, 394, 520,
];

#[rustfmt::skip]
static TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];
